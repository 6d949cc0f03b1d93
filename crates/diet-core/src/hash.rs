//! Stable object hashing
//!
//! Values are serialized to canonical JSON (object keys sorted at every level,
//! no whitespace) and hashed with xxHash64. Two values that differ only in key
//! order hash identically, which is what rule dedupe and write suppression
//! rely on.

use std::hash::Hasher;

use serde::Serialize;
use serde_json::{Map, Value};
use twox_hash::XxHash64;

use crate::types::{BlockRule, RuleKind};

/// Seed for every stable hash. Changing it invalidates persisted comparisons.
const STABLE_SEED: u64 = 0x1d1e_7000;

/// Fields that identify a stored rule but never take part in its equality.
pub const VOLATILE_RULE_FIELDS: [&str; 2] = ["id", "createdAt"];

/// Hash any serializable value through its canonical JSON form.
pub fn stable_hash<T: Serialize + ?Sized>(value: &T) -> Result<u64, serde_json::Error> {
    stable_hash_omit(value, &[])
}

/// Like [`stable_hash`] but ignores the named top-level object keys.
pub fn stable_hash_omit<T: Serialize + ?Sized>(
    value: &T,
    omit: &[&str],
) -> Result<u64, serde_json::Error> {
    let mut value = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut value {
        for key in omit {
            map.remove(*key);
        }
    }
    Ok(hash_value(&value))
}

/// Hash an already-built JSON value.
pub fn hash_value(value: &Value) -> u64 {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    hash_str(&canonical)
}

/// xxHash64 of a string with the stable seed.
#[inline]
pub fn hash_str(s: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(STABLE_SEED);
    hasher.write(s.as_bytes());
    hasher.finish()
}

/// Fixed-width lowercase hex rendering of a hash.
#[inline]
pub fn to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Equality key of a rule: its canonical form without `id` and `createdAt`.
pub fn rule_fingerprint(rule: &BlockRule) -> u64 {
    let mut map = Map::new();
    map.insert("hostname".into(), Value::String(rule.hostname.clone()));
    map.insert("type".into(), Value::String(rule.kind.name().into()));
    match &rule.kind {
        RuleKind::Host => {}
        RuleKind::Pathname { pathname } => {
            map.insert("pathname".into(), Value::String(pathname.clone()));
        }
        RuleKind::Url { url } => {
            map.insert("url".into(), Value::String(url.clone()));
        }
        RuleKind::Item { item } => {
            map.insert("item".into(), Value::String(item.clone()));
        }
    }
    hash_value(&Value::Object(map))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a = json!({"a": 1, "b": {"x": [1, 2], "y": null}});
        let b = json!({"b": {"y": null, "x": [1, 2]}, "a": 1});
        assert_eq!(hash_value(&a), hash_value(&b));
        assert_ne!(hash_value(&a), hash_value(&json!({"a": 2, "b": {"x": [1, 2], "y": null}})));
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(hash_value(&json!([1, 2])), hash_value(&json!([2, 1])));
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_str("postmates.com"), hash_str("postmates.com"));
        assert_eq!(to_hex(0xab).len(), 16);
    }

    #[test]
    fn test_fingerprint_ignores_identity() {
        let a = BlockRule::pathname("postmates.com", "dunkin").with_identity("1", "2020-01-01T00:00:00.000Z");
        let b = BlockRule::pathname("postmates.com", "dunkin").with_identity("2", "2024-06-01T00:00:00.000Z");
        assert_eq!(rule_fingerprint(&a), rule_fingerprint(&b));
        assert_ne!(
            rule_fingerprint(&a),
            rule_fingerprint(&BlockRule::item("postmates.com", "dunkin"))
        );
    }

    #[test]
    fn test_fingerprint_matches_serialized_form() {
        let rule = BlockRule::url("discord.com", "discord.com/channels/1").with_identity("x", "y");
        assert_eq!(
            rule_fingerprint(&rule),
            stable_hash_omit(&rule, &VOLATILE_RULE_FIELDS).unwrap()
        );
        assert_eq!(
            rule_fingerprint(&BlockRule::host("digg.com")),
            stable_hash(&BlockRule::host("digg.com")).unwrap()
        );
    }
}
