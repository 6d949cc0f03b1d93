//! Rules installed for a new user.

use diet_core::types::BlockRule;

use crate::identity::{Clock, IdGenerator};

const DEFAULT_HOST: &str = "postmates.com";

const DEFAULT_PATHNAMES: [&str; 7] = [
    "mcdonalds",
    "burger-king",
    "7-eleven",
    "dunkin",
    "99-cent-supreme-pizza",
    "marthas-breakfast-sandwiches-1117-broadway",
    "LPAvJw9xUn-qcF9uAhfUcA",
];

const DEFAULT_ITEMS: [&str; 3] = ["coke", "soda", "pepsi"];

/// The default rule set, without ids or timestamps.
pub fn default_block_rules() -> Vec<BlockRule> {
    DEFAULT_PATHNAMES
        .iter()
        .map(|pathname| BlockRule::pathname(DEFAULT_HOST, *pathname))
        .chain(DEFAULT_ITEMS.iter().map(|item| BlockRule::item(DEFAULT_HOST, *item)))
        .collect()
}

/// Give every rule that lacks one an id and a creation time.
pub fn resolve_block_rules<C: Clock + ?Sized>(rules: Vec<BlockRule>, clock: &C) -> Vec<BlockRule> {
    let now = clock.now();
    let mut ids = IdGenerator::new();
    rules
        .into_iter()
        .map(|mut rule| {
            ids.backfill(&mut rule, now);
            rule
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    #[test]
    fn test_defaults() {
        let rules = default_block_rules();
        assert_eq!(rules.len(), 10);
        assert!(rules.iter().all(|r| r.hostname == "postmates.com"));
        assert!(rules.contains(&BlockRule::pathname("postmates.com", "LPAvJw9xUn-qcF9uAhfUcA")));
        assert!(rules.contains(&BlockRule::item("postmates.com", "pepsi")));
    }

    #[test]
    fn test_resolve_assigns_unique_identity() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let rules = resolve_block_rules(default_block_rules(), &clock);
        assert!(rules.iter().all(BlockRule::is_assigned));
        assert!(rules.iter().all(|r| r.created_at == "2024-01-01T00:00:00.000Z"));
        let ids: HashSet<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), rules.len());
    }
}
