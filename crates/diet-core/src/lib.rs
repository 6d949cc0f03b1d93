//! Internet Diet Core Library
//!
//! Decides which parts of an arbitrary web page should be suppressed for a
//! set of user block rules, and which element/link pair best represents the
//! thing a user pointed at when authoring a new rule.
//!
//! # Architecture
//!
//! Everything here is synchronous and free of browser dependencies. Rules are
//! evaluated by an immutable [`RuleMatcher`] snapshot; documents are reached
//! through the [`TreeQuery`] trait so the same selection and scanning code
//! runs against live DOM elements and against parsed HTML.
//!
//! # Modules
//!
//! - `types`: Block rules, settings and stats as persisted
//! - `url`: URL canonicalization and comparison helpers
//! - `candidate`: Identifier extraction from normalized URLs
//! - `hash`: Stable hashing of canonical JSON
//! - `matcher`: Rule predicates
//! - `tree`: Document access trait
//! - `selector`: Best link block candidate selection
//! - `scan`: Page scanning
//! - `schedule`: Throttle and debounce for scan/selection triggers
//! - `memo`: Bounded LRU memoization
//! - `html`: `scraper`-backed tree (feature `html`)

pub mod candidate;
pub mod hash;
pub mod matcher;
pub mod memo;
pub mod scan;
pub mod schedule;
pub mod selector;
pub mod tree;
pub mod types;
pub mod url;

#[cfg(feature = "html")]
pub mod html;

// Re-export commonly used types
pub use candidate::get_candidate_id_for_url;
pub use hash::{rule_fingerprint, stable_hash, stable_hash_omit};
pub use matcher::RuleMatcher;
pub use scan::{scan_page, ScanReport};
pub use selector::{get_best_link_block_candidate, LinkBlockCandidate, SelectorOptions};
pub use tree::TreeQuery;
pub use types::{BlockEffect, BlockRule, RuleKind, Settings, SettingsPatch, Stats};
pub use crate::url::normalize_url;
