//! Rule ids and creation timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use diet_core::hash::{hash_str, rule_fingerprint, to_hex};
use diet_core::types::BlockRule;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// `createdAt` rendering: RFC 3339, millisecond precision, `Z` suffix.
pub fn format_created_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generates rule ids unique within a process.
///
/// An id hashes the creation time, a per-generator sequence number and the
/// rule's fingerprint, so two rules created in the same millisecond differ.
#[derive(Debug, Default)]
pub struct IdGenerator {
    seq: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, at: DateTime<Utc>, rule: &BlockRule) -> String {
        self.seq += 1;
        let seed = format!(
            "{}:{}:{:016x}",
            at.timestamp_millis(),
            self.seq,
            rule_fingerprint(rule)
        );
        to_hex(hash_str(&seed))
    }

    /// Fill in a missing `id` and/or `createdAt`. Returns whether anything changed.
    pub fn backfill(&mut self, rule: &mut BlockRule, at: DateTime<Utc>) -> bool {
        if rule.is_assigned() {
            return false;
        }
        if rule.id.is_empty() {
            rule.id = self.next_id(at, rule);
        }
        if rule.created_at.is_empty() {
            rule.created_at = format_created_at(at);
        }
        true
    }
}
