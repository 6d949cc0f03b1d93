//! Internet Diet Rule Management
//!
//! Owns the persisted side of the engine: the rule list, settings and stats,
//! kept behind a [`storage::Storage`] port so the same store runs against
//! browser storage, a JSON file or memory.

pub mod authoring;
pub mod defaults;
pub mod identity;
pub mod optimizer;
pub mod parser;
pub mod settings;
pub mod storage;
pub mod store;

pub use authoring::pathname_rule_for_url;
pub use defaults::{default_block_rules, resolve_block_rules};
pub use identity::{Clock, SystemClock};
pub use optimizer::{dedupe_block_rules, OptimizeStats};
pub use parser::{parse_block_rules, RuleParseError};
pub use storage::{MemoryStorage, Storage, StorageArea, StorageChange, StorageError};
pub use store::{RuleStore, StatsStore, StoreError, StoreEvent};
