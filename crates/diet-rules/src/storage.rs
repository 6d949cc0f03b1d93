//! Persistent storage port
//!
//! Mirrors the browser extension storage model: two areas of JSON key/value
//! items, whole-value writes, and change notifications tagged with the area
//! they happened in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

/// Key of the rule list, stored in [`StorageArea::Sync`].
pub const BLOCK_RULES_KEY: &str = "blockRules";
/// Key of the settings object, stored in [`StorageArea::Local`].
pub const SETTINGS_KEY: &str = "settings";
/// Key of the stats object, stored in [`StorageArea::Sync`].
pub const STATS_KEY: &str = "stats";

/// JSON items keyed by name.
pub type StorageItems = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    /// Synced across the user's browsers.
    Sync,
    /// Local to this browser.
    Local,
}

impl StorageArea {
    pub fn name(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

/// A single key changing in one area.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<Value>,
}

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Key/value storage split into areas.
pub trait Storage {
    /// Read the given keys. Missing keys are absent from the result.
    fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StorageItems, StorageError>;

    /// Write every item, replacing existing values.
    fn set(&self, area: StorageArea, items: StorageItems) -> Result<(), StorageError>;
}

impl<T: Storage + ?Sized> Storage for &T {
    fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StorageItems, StorageError> {
        (**self).get(area, keys)
    }

    fn set(&self, area: StorageArea, items: StorageItems) -> Result<(), StorageError> {
        (**self).set(area, items)
    }
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StorageItems, StorageError> {
        (**self).get(area, keys)
    }

    fn set(&self, area: StorageArea, items: StorageItems) -> Result<(), StorageError> {
        (**self).set(area, items)
    }
}

/// Build a single-item map.
pub fn single_item(key: &str, value: Value) -> StorageItems {
    let mut items = StorageItems::new();
    items.insert(key.to_string(), value);
    items
}

// =============================================================================
// In-memory backend
// =============================================================================

/// In-memory storage that records every write as a [`StorageChange`].
///
/// Reads and writes can be made to fail to exercise error paths.
#[derive(Default)]
pub struct MemoryStorage {
    areas: Mutex<HashMap<StorageArea, StorageItems>>,
    changes: Mutex<Vec<StorageChange>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with items in one area. Not recorded as changes.
    pub fn with_items(area: StorageArea, items: StorageItems) -> Self {
        let storage = Self::default();
        lock(&storage.areas).insert(area, items);
        storage
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Drain the changes recorded since the last call.
    pub fn take_changes(&self) -> Vec<StorageChange> {
        std::mem::take(&mut *lock(&self.changes))
    }

    /// Current contents of an area.
    pub fn snapshot(&self, area: StorageArea) -> StorageItems {
        lock(&self.areas).get(&area).cloned().unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StorageItems, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{} read refused", area.name())));
        }
        let areas = lock(&self.areas);
        let mut out = StorageItems::new();
        if let Some(items) = areas.get(&area) {
            for key in keys {
                if let Some(value) = items.get(*key) {
                    out.insert(key.to_string(), value.clone());
                }
            }
        }
        Ok(out)
    }

    fn set(&self, area: StorageArea, items: StorageItems) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{} write refused", area.name())));
        }
        let mut areas = lock(&self.areas);
        let mut changes = lock(&self.changes);
        let stored = areas.entry(area).or_default();
        for (key, value) in items {
            changes.push(StorageChange {
                area,
                key: key.clone(),
                new_value: Some(value.clone()),
            });
            stored.insert(key, value);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
