//! JSON file backend for the storage port.
//!
//! The file holds one object per area: `{"sync": {...}, "local": {...}}`.
//! A missing file reads as empty storage.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use diet_rules::storage::{Storage, StorageArea, StorageError, StorageItems};

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StorageError::Corrupt(format!(
                "'{}' is not a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(StorageError::Corrupt(format!("'{}': {e}", self.path.display()))),
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StorageItems, StorageError> {
        let all = self.read_all()?;
        let mut out = StorageItems::new();
        if let Some(Value::Object(items)) = all.get(area.name()) {
            for key in keys {
                if let Some(value) = items.get(*key) {
                    out.insert(key.to_string(), value.clone());
                }
            }
        }
        Ok(out)
    }

    fn set(&self, area: StorageArea, items: StorageItems) -> Result<(), StorageError> {
        let mut all = self.read_all()?;
        let entry = all
            .entry(area.name().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(stored) = entry {
            stored.extend(items);
        }

        let text = serde_json::to_string_pretty(&Value::Object(all))
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        // Write beside the target and rename so a failed write keeps the old file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
