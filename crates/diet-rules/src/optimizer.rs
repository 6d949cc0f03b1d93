use std::collections::HashSet;

use diet_core::hash::rule_fingerprint;
use diet_core::types::BlockRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

/// Drop rules equal to an earlier rule, ignoring `id` and `createdAt`.
///
/// The first occurrence survives with its identity; relative order is kept.
pub fn dedupe_block_rules(rules: &mut Vec<BlockRule>) -> OptimizeStats {
    let before = rules.len();

    let mut seen: HashSet<u64> = HashSet::new();
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(rule_fingerprint(rule)) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    OptimizeStats {
        before,
        after: rules.len(),
        deduped,
    }
}

/// Owned variant of [`dedupe_block_rules`].
pub fn deduped(mut rules: Vec<BlockRule>) -> Vec<BlockRule> {
    dedupe_block_rules(&mut rules);
    rules
}
