//! Rule and stats stores
//!
//! [`RuleStore`] owns the rule list and settings. Every change is written to
//! storage first and committed in memory only once the write succeeded, so a
//! failed write never leaves the store ahead of what is persisted. Each
//! commit rebuilds the [`RuleMatcher`] snapshot handed to scanners and
//! notifies subscribers.

use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;

use diet_core::hash::{rule_fingerprint, stable_hash};
use diet_core::matcher::RuleMatcher;
use diet_core::scan::ScanReport;
use diet_core::types::{BlockRule, Settings, SettingsPatch, Stats};

use crate::authoring::pathname_rule_for_url;
use crate::identity::{Clock, IdGenerator};
use crate::optimizer::dedupe_block_rules;
use crate::parser::{rules_from_value, RuleParseError};
use crate::settings::{resolve_settings, resolve_stats, sanitized_custom_block_url};
use crate::storage::{
    single_item, Storage, StorageArea, StorageChange, StorageError, BLOCK_RULES_KEY, SETTINGS_KEY,
    STATS_KEY,
};

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Stored rules are unreadable: {0}")]
    Rules(#[from] RuleParseError),
    #[error("Store has not been loaded")]
    NotReady,
}

/// What changed in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    RulesChanged,
    SettingsChanged,
    StatsChanged,
}

/// Handle returned by `subscribe`.
pub type ListenerId = u64;

type Listener = Box<dyn FnMut(StoreEvent)>;

#[derive(Default)]
struct Listeners {
    next_id: ListenerId,
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    fn add(&mut self, listener: Listener) -> ListenerId {
        self.next_id += 1;
        self.entries.push((self.next_id, listener));
        self.next_id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    fn emit(&mut self, event: StoreEvent) {
        for (_, listener) in self.entries.iter_mut() {
            listener(event);
        }
    }
}

// =============================================================================
// Rule Store
// =============================================================================

/// Rules and settings, persisted through a [`Storage`] port.
pub struct RuleStore<S, C> {
    storage: S,
    clock: C,
    ids: IdGenerator,
    rules: Vec<BlockRule>,
    settings: Settings,
    matcher: Arc<RuleMatcher>,
    listeners: Listeners,
    ready: bool,
}

impl<S: Storage, C: Clock> RuleStore<S, C> {
    /// An empty, unloaded store. Mutations fail with [`StoreError::NotReady`] until [`load`](Self::load).
    pub fn new(storage: S, clock: C) -> Self {
        Self {
            storage,
            clock,
            ids: IdGenerator::new(),
            rules: Vec::new(),
            settings: Settings::default(),
            matcher: Arc::new(RuleMatcher::default()),
            listeners: Listeners::default(),
            ready: false,
        }
    }

    /// Create and load a store.
    pub fn open(storage: S, clock: C) -> Result<Self, StoreError> {
        let mut store = Self::new(storage, clock);
        store.load()?;
        Ok(store)
    }

    /// Read rules and settings from storage.
    ///
    /// Rules missing an id or creation time are backfilled and written back.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let synced = self
            .storage
            .get(StorageArea::Sync, &[BLOCK_RULES_KEY])
            .map_err(|e| {
                error!("error loading block rules: {e}");
                e
            })?;
        let local = self
            .storage
            .get(StorageArea::Local, &[SETTINGS_KEY])
            .map_err(|e| {
                error!("error loading settings: {e}");
                e
            })?;

        let parsed = rules_from_value(synced.get(BLOCK_RULES_KEY).unwrap_or(&Value::Null))?;
        let mut rules = parsed.rules;
        let backfilled = self.backfill(&mut rules);
        let needs_write = backfilled > 0 || parsed.legacy_expanded > 0 || !parsed.skipped.is_empty();
        if needs_write {
            warn!(
                "rewriting stored rules: {backfilled} backfilled, {} grouped entries expanded, {} skipped",
                parsed.legacy_expanded,
                parsed.skipped.len()
            );
            self.persist_rules(&rules)?;
        }

        self.ready = true;
        info!("loaded {} block rules", rules.len());
        self.commit_settings(resolve_settings(local.get(SETTINGS_KEY)));
        self.commit_rules(rules);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn rules(&self) -> &[BlockRule] {
        &self.rules
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_paused(&self) -> bool {
        self.settings.is_paused
    }

    /// The current matcher snapshot. Never mutated; replaced on every change.
    pub fn matcher(&self) -> Arc<RuleMatcher> {
        Arc::clone(&self.matcher)
    }

    /// Sorted, unique hostnames that have at least one rule.
    pub fn get_hostnames(&self) -> Vec<String> {
        let mut hostnames: Vec<String> = self.rules.iter().map(|r| r.hostname.clone()).collect();
        hostnames.sort();
        hostnames.dedup();
        hostnames
    }

    pub fn get_rule_by_id(&self, id: &str) -> Option<&BlockRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Add one rule. Returns the stored rule, which is the existing one if an
    /// equal rule was already present.
    pub fn add_block_rule(&mut self, rule: BlockRule) -> Result<BlockRule, StoreError> {
        self.ensure_ready()?;
        info!("adding block rule {rule}");

        let mut rule = rule;
        self.backfill(std::slice::from_mut(&mut rule));
        let fingerprint = rule_fingerprint(&rule);
        self.add_block_rules(vec![rule.clone()])?;
        Ok(self
            .rules
            .iter()
            .find(|stored| rule_fingerprint(stored) == fingerprint)
            .cloned()
            .unwrap_or(rule))
    }

    /// Add several rules at once with a single write. Returns how many were new.
    pub fn add_block_rules(&mut self, rules: Vec<BlockRule>) -> Result<usize, StoreError> {
        self.ensure_ready()?;

        let mut next = self.rules.clone();
        dedupe_block_rules(&mut next);
        let existing = next.len();

        let mut incoming = rules;
        self.backfill(&mut incoming);
        next.extend(incoming);
        let stats = dedupe_block_rules(&mut next);

        let added = next.len() - existing;
        if added == 0 {
            debug!("no new block rules ({} duplicates)", stats.deduped);
            return Ok(0);
        }

        self.persist_rules(&next)?;
        self.commit_rules(next);
        Ok(added)
    }

    /// Add a `pathname` rule derived from a link.
    pub fn add_block_link_rule(&mut self, hostname: &str, url: &str) -> Result<BlockRule, StoreError> {
        self.add_block_rule(pathname_rule_for_url(hostname, url))
    }

    /// Add a `host` rule.
    pub fn add_block_host_rule(&mut self, hostname: &str) -> Result<BlockRule, StoreError> {
        self.add_block_rule(BlockRule::host(hostname))
    }

    /// Remove the rule with `id`. Returns whether a rule was removed.
    pub fn remove_block_rule_by_id(&mut self, id: &str) -> Result<bool, StoreError> {
        self.ensure_ready()?;

        let next: Vec<BlockRule> = self.rules.iter().filter(|r| r.id != id).cloned().collect();
        if next.len() == self.rules.len() {
            debug!("no block rule with id {id}");
            return Ok(false);
        }

        info!("removing block rule {id}");
        self.persist_rules(&next)?;
        self.commit_rules(next);
        Ok(true)
    }

    /// Merge a partial update into the settings. Returns whether anything was written.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<bool, StoreError> {
        self.ensure_ready()?;

        let next = self.settings.merged(patch);
        if stable_hash(&next)? == stable_hash(&self.settings)? {
            debug!("settings unchanged");
            return Ok(false);
        }

        self.storage
            .set(StorageArea::Local, single_item(SETTINGS_KEY, serde_json::to_value(&next)?))?;
        debug!("settings updated {next:?}");
        self.commit_settings(next);
        Ok(true)
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<bool, StoreError> {
        self.update_settings(&SettingsPatch {
            is_paused: Some(paused),
            ..SettingsPatch::default()
        })
    }

    /// The custom block page as an absolute URL, or `""`.
    pub fn sanitized_custom_block_url(&self) -> String {
        sanitized_custom_block_url(&self.settings.custom_block_url)
    }

    /// Register a change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(StoreEvent) + 'static) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Apply a change notification from storage. Returns whether it was relevant.
    ///
    /// Rules are only read from the sync area and settings only from the
    /// local area; changes to the same key in the other area are ignored.
    pub fn apply_change(&mut self, change: &StorageChange) -> Result<bool, StoreError> {
        let new_value = change.new_value.as_ref().unwrap_or(&Value::Null);
        match (change.area, change.key.as_str()) {
            (StorageArea::Sync, BLOCK_RULES_KEY) => {
                let mut rules = rules_from_value(new_value)?.rules;
                if self.backfill(&mut rules) > 0 {
                    warn!("block rules changed without ids; assigned in memory");
                }
                info!("block rules changed: {} rules", rules.len());
                self.commit_rules(rules);
                Ok(true)
            }
            (StorageArea::Local, SETTINGS_KEY) => {
                let settings = resolve_settings(Some(new_value));
                debug!("settings changed {settings:?}");
                self.commit_settings(settings);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn ensure_ready(&self) -> Result<(), StoreError> {
        if self.ready {
            Ok(())
        } else {
            Err(StoreError::NotReady)
        }
    }

    fn backfill(&mut self, rules: &mut [BlockRule]) -> usize {
        let now = self.clock.now();
        let mut count = 0;
        for rule in rules.iter_mut() {
            if self.ids.backfill(rule, now) {
                count += 1;
            }
        }
        count
    }

    fn persist_rules(&self, rules: &[BlockRule]) -> Result<(), StoreError> {
        let value = serde_json::to_value(rules)?;
        self.storage
            .set(StorageArea::Sync, single_item(BLOCK_RULES_KEY, value))
            .map_err(|e| {
                error!("error saving block rules: {e}");
                StoreError::from(e)
            })
    }

    fn commit_rules(&mut self, rules: Vec<BlockRule>) {
        self.rules = rules;
        self.rebuild_matcher();
        self.listeners.emit(StoreEvent::RulesChanged);
    }

    fn commit_settings(&mut self, settings: Settings) {
        let pause_changed = settings.is_paused != self.settings.is_paused;
        self.settings = settings;
        if pause_changed {
            self.rebuild_matcher();
        }
        self.listeners.emit(StoreEvent::SettingsChanged);
    }

    fn rebuild_matcher(&mut self) {
        self.matcher = Arc::new(RuleMatcher::new(self.rules.clone(), self.settings.is_paused));
    }
}

// =============================================================================
// Stats Store
// =============================================================================

/// Increment-only blocked element counters.
pub struct StatsStore<S> {
    storage: S,
    stats: Stats,
    listeners: Listeners,
    ready: bool,
}

impl<S: Storage> StatsStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            stats: Stats::default(),
            listeners: Listeners::default(),
            ready: false,
        }
    }

    pub fn open(storage: S) -> Result<Self, StoreError> {
        let mut store = Self::new(storage);
        store.load()?;
        Ok(store)
    }

    pub fn load(&mut self) -> Result<(), StoreError> {
        let items = self.storage.get(StorageArea::Sync, &[STATS_KEY]).map_err(|e| {
            error!("error loading stats: {e}");
            e
        })?;
        self.stats = resolve_stats(items.get(STATS_KEY));
        self.ready = true;
        debug!("stats init {:?}", self.stats);
        self.listeners.emit(StoreEvent::StatsChanged);
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Add to the counters. Returns whether anything was written.
    pub fn increment(&mut self, links: u64, items: u64) -> Result<bool, StoreError> {
        if !self.ready {
            return Err(StoreError::NotReady);
        }

        let next = self.stats.incremented(links, items);
        if stable_hash(&next)? == stable_hash(&self.stats)? {
            return Ok(false);
        }

        self.storage
            .set(StorageArea::Sync, single_item(STATS_KEY, serde_json::to_value(next)?))?;
        debug!("stats updated {next:?}");
        self.stats = next;
        self.listeners.emit(StoreEvent::StatsChanged);
        Ok(true)
    }

    /// Count everything a scan blocked.
    pub fn record_scan<N: PartialEq>(&mut self, report: &ScanReport<N>) -> Result<bool, StoreError> {
        self.increment(report.num_blocked_links(), report.num_blocked_items())
    }

    pub fn subscribe(&mut self, listener: impl FnMut(StoreEvent) + 'static) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Apply a change notification from storage. Returns whether it was relevant.
    pub fn apply_change(&mut self, change: &StorageChange) -> bool {
        if change.area != StorageArea::Sync || change.key != STATS_KEY {
            return false;
        }
        self.stats = resolve_stats(change.new_value.as_ref());
        debug!("stats update {:?}", self.stats);
        self.listeners.emit(StoreEvent::StatsChanged);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FixedClock;
    use crate::storage::MemoryStorage;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use url::Url;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn open(storage: &MemoryStorage) -> RuleStore<&MemoryStorage, FixedClock> {
        RuleStore::open(storage, clock()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_load_backfills_and_persists() {
        let storage = MemoryStorage::with_items(
            StorageArea::Sync,
            single_item(
                BLOCK_RULES_KEY,
                json!([
                    {"type": "host", "hostname": "digg.com"},
                    {"id": "x", "createdAt": "2023-05-05T00:00:00.000Z", "type": "item", "hostname": "postmates.com", "item": "soda"}
                ]),
            ),
        );
        let store = open(&storage);

        assert_eq!(store.rules().len(), 2);
        assert!(store.rules().iter().all(BlockRule::is_assigned));
        assert_eq!(store.rules()[0].created_at, "2024-01-01T00:00:00.000Z");
        assert_eq!(store.rules()[1].id, "x");

        let persisted = storage.snapshot(StorageArea::Sync)[BLOCK_RULES_KEY].clone();
        assert_eq!(persisted[0]["id"], json!(store.rules()[0].id));
    }

    #[test]
    fn test_load_without_backfill_does_not_write() {
        let storage = MemoryStorage::new();
        let store = open(&storage);
        assert!(store.is_ready());
        assert!(store.rules().is_empty());
        assert!(storage.take_changes().is_empty());
    }

    #[test]
    fn test_load_failure_is_an_error() {
        let storage = MemoryStorage::new();
        storage.set_fail_reads(true);
        let mut store = RuleStore::new(&storage, clock());
        assert!(matches!(store.load(), Err(StoreError::Storage(_))));
        assert!(!store.is_ready());
        assert!(matches!(
            store.add_block_host_rule("digg.com"),
            Err(StoreError::NotReady)
        ));
    }

    #[test]
    fn test_add_rules_dedupes_and_rebuilds_matcher() {
        let storage = MemoryStorage::new();
        let mut store = open(&storage);
        let before = store.matcher();

        let stored = store.add_block_link_rule("postmates.com", "https://postmates.com/store/mcdonalds-1/abc").unwrap();
        assert!(stored.is_assigned());
        let again = store.add_block_rule(BlockRule::pathname("postmates.com", "/store/mcdonalds-1/abc")).unwrap();
        assert_eq!(again.id, stored.id);
        assert_eq!(store.rules().len(), 1);

        assert!(!before.is_url_blocked(&url("https://postmates.com/store/mcdonalds-1/abc")));
        assert!(store.matcher().is_url_blocked(&url("https://postmates.com/store/mcdonalds-1/abc")));

        let added = store
            .add_block_rules(vec![BlockRule::host("digg.com"), BlockRule::host("digg.com"), BlockRule::item("a.com", "x")])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.get_hostnames(), vec!["a.com", "digg.com", "postmates.com"]);
    }

    #[test]
    fn test_add_block_rule_returns_stored_rule() {
        let storage = MemoryStorage::new();
        let mut store = open(&storage);

        let added = store.add_block_rule(BlockRule::item("postmates.com", "soda")).unwrap();
        assert!(added.is_assigned());
        assert_eq!(store.get_rule_by_id(&added.id), Some(&added));

        let mut preassigned = BlockRule::host("digg.com");
        preassigned.id = "fixed-id".to_string();
        preassigned.created_at = "2023-05-05T00:00:00.000Z".to_string();
        let stored = store.add_block_rule(preassigned.clone()).unwrap();
        assert_eq!(stored, preassigned);
        assert_eq!(store.get_rule_by_id("fixed-id"), Some(&preassigned));
    }

    #[test]
    fn test_failed_write_leaves_state_untouched() {
        let storage = MemoryStorage::new();
        let mut store = open(&storage);
        store.add_block_host_rule("digg.com").unwrap();

        storage.set_fail_writes(true);
        assert!(matches!(
            store.add_block_host_rule("reddit.com"),
            Err(StoreError::Storage(_))
        ));
        assert_eq!(store.get_hostnames(), vec!["digg.com"]);
        assert!(!store.matcher().is_host_blocked(&url("https://reddit.com/")));

        let id = store.rules()[0].id.clone();
        assert!(store.remove_block_rule_by_id(&id).is_err());
        assert_eq!(store.rules().len(), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let storage = MemoryStorage::new();
        let mut store = open(&storage);
        let rule = store.add_block_host_rule("digg.com").unwrap();
        store.add_block_host_rule("reddit.com").unwrap();

        assert!(store.remove_block_rule_by_id(&rule.id).unwrap());
        assert!(!store.remove_block_rule_by_id(&rule.id).unwrap());
        assert_eq!(store.get_hostnames(), vec!["reddit.com"]);
        assert!(store.get_rule_by_id(&rule.id).is_none());
    }

    #[test]
    fn test_settings_updates_are_suppressed_when_unchanged() {
        let storage = MemoryStorage::new();
        let mut store = open(&storage);
        store.add_block_host_rule("digg.com").unwrap();
        storage.take_changes();

        assert!(store.set_paused(true).unwrap());
        assert!(!store.set_paused(true).unwrap());
        assert_eq!(storage.take_changes().len(), 1);
        assert!(!store.matcher().is_host_blocked(&url("https://digg.com/")));

        assert!(store.set_paused(false).unwrap());
        assert!(store.matcher().is_host_blocked(&url("https://digg.com/")));

        store
            .update_settings(&SettingsPatch {
                custom_block_url: Some("http://www.focus.example/page/".into()),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(store.sanitized_custom_block_url(), "https://focus.example/page");
    }

    #[test]
    fn test_listeners() {
        let storage = MemoryStorage::new();
        let mut store = open(&storage);
        let events = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&events);
        let id = store.subscribe(move |event| sink.borrow_mut().push(event));
        store.add_block_host_rule("digg.com").unwrap();
        store.set_paused(true).unwrap();
        assert_eq!(*events.borrow(), vec![StoreEvent::RulesChanged, StoreEvent::SettingsChanged]);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set_paused(false).unwrap();
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn test_changes_propagate_between_stores() {
        let storage = MemoryStorage::new();
        let mut writer = open(&storage);
        let mut reader = open(&storage);

        writer.add_block_host_rule("digg.com").unwrap();
        writer.set_paused(true).unwrap();
        for change in storage.take_changes() {
            assert!(reader.apply_change(&change).unwrap());
        }
        assert_eq!(reader.rules(), writer.rules());
        assert!(reader.is_paused());
    }

    #[test]
    fn test_changes_from_other_area_are_ignored() {
        let storage = MemoryStorage::new();
        let mut store = open(&storage);
        let change = StorageChange {
            area: StorageArea::Local,
            key: BLOCK_RULES_KEY.to_string(),
            new_value: Some(json!([{"type": "host", "hostname": "digg.com"}])),
        };
        assert!(!store.apply_change(&change).unwrap());
        assert!(store.rules().is_empty());

        let removal = StorageChange {
            area: StorageArea::Sync,
            key: BLOCK_RULES_KEY.to_string(),
            new_value: None,
        };
        assert!(store.apply_change(&removal).unwrap());
    }

    #[test]
    fn test_stats_store() {
        let storage = MemoryStorage::new();
        let mut stats = StatsStore::open(&storage).unwrap();

        assert!(!stats.increment(0, 0).unwrap());
        assert!(stats.increment(2, 1).unwrap());
        assert!(stats.increment(1, 0).unwrap());
        assert_eq!(stats.stats().num_blocked_links_total, 3);
        assert_eq!(
            storage.snapshot(StorageArea::Sync)[STATS_KEY],
            json!({"numBlockedLinksTotal": 3, "numBlockedItemsTotal": 1})
        );

        let mut other = StatsStore::open(&storage).unwrap();
        assert_eq!(other.stats(), stats.stats());
        let change = StorageChange {
            area: StorageArea::Sync,
            key: STATS_KEY.to_string(),
            new_value: Some(json!({"numBlockedLinksTotal": 10})),
        };
        assert!(other.apply_change(&change));
        assert_eq!(other.stats().num_blocked_links_total, 10);
        assert_eq!(other.stats().num_blocked_items_total, 0);
    }

    #[test]
    fn test_stats_store_requires_load() {
        let storage = MemoryStorage::new();
        let mut stats = StatsStore::new(&storage);
        assert!(matches!(stats.increment(1, 0), Err(StoreError::NotReady)));
    }
}
