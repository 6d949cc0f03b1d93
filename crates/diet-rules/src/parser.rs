//! Rule list import
//!
//! Accepts the persisted rule array, an object wrapping it under
//! `blockRules`, and the older grouped shape where one entry carries
//! `blockedPathnameWords` and `blockedItems` lists for a host. Entries that
//! cannot be read are skipped and reported rather than failing the import.

use log::warn;
use serde_json::Value;

use diet_core::types::BlockRule;

use crate::storage::BLOCK_RULES_KEY;

const LEGACY_PATHNAME_WORDS: &str = "blockedPathnameWords";
const LEGACY_ITEMS: &str = "blockedItems";

/// Error type for rule list import.
#[derive(Debug, thiserror::Error)]
pub enum RuleParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected an array of block rules, found {0}")]
    NotAnArray(&'static str),
}

/// An entry that was not imported.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRule {
    pub index: usize,
    pub reason: String,
}

/// Result of an import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRules {
    /// Imported rules in input order. Identity fields may be empty.
    pub rules: Vec<BlockRule>,
    pub skipped: Vec<SkippedRule>,
    /// Number of grouped entries that were expanded into individual rules.
    pub legacy_expanded: usize,
}

/// Parse a JSON rule list.
pub fn parse_block_rules(text: &str) -> Result<ParsedRules, RuleParseError> {
    let value: Value = serde_json::from_str(text)?;
    rules_from_value(&value)
}

/// Read rules from an already-parsed value. `null` reads as an empty list.
pub fn rules_from_value(value: &Value) -> Result<ParsedRules, RuleParseError> {
    let entries = match value {
        Value::Null => return Ok(ParsedRules::default()),
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get(BLOCK_RULES_KEY) {
            Some(inner) => return rules_from_value(inner),
            None => return Err(RuleParseError::NotAnArray("object")),
        },
        other => return Err(RuleParseError::NotAnArray(type_name(other))),
    };

    let mut parsed = ParsedRules::default();
    for (index, entry) in entries.iter().enumerate() {
        if let Err(reason) = parse_entry(entry, &mut parsed) {
            warn!("skipping block rule #{index}: {reason}");
            parsed.skipped.push(SkippedRule { index, reason });
        }
    }
    Ok(parsed)
}

fn parse_entry(entry: &Value, parsed: &mut ParsedRules) -> Result<(), String> {
    let Value::Object(map) = entry else {
        return Err(format!("expected an object, found {}", type_name(entry)));
    };

    if map.contains_key(LEGACY_PATHNAME_WORDS) || map.contains_key(LEGACY_ITEMS) {
        let hostname = map
            .get("hostname")
            .and_then(Value::as_str)
            .ok_or("grouped entry has no hostname")?;
        let words = string_list(map.get(LEGACY_PATHNAME_WORDS))?;
        let items = string_list(map.get(LEGACY_ITEMS))?;

        parsed
            .rules
            .extend(words.into_iter().map(|word| BlockRule::pathname(hostname, word)));
        parsed
            .rules
            .extend(items.into_iter().map(|item| BlockRule::item(hostname, item)));
        parsed.legacy_expanded += 1;
        return Ok(());
    }

    let rule: BlockRule = serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;
    parsed.rules.push(rule);
    Ok(())
}

fn string_list(value: Option<&Value>) -> Result<Vec<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("expected a string, found {}", type_name(v)))
            })
            .collect(),
        Some(other) => Err(format!("expected a list, found {}", type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diet_core::types::RuleKind;

    #[test]
    fn test_parse_current_shape() {
        let parsed = parse_block_rules(
            r#"[
                {"id": "1", "createdAt": "2024-01-01T00:00:00.000Z", "type": "pathname", "hostname": "postmates.com", "pathname": "mcdonalds"},
                {"type": "host", "hostname": "digg.com"}
            ]"#,
        )
        .unwrap();
        assert_eq!(parsed.rules.len(), 2);
        assert!(parsed.rules[0].is_assigned());
        assert!(!parsed.rules[1].is_assigned());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_parse_grouped_shape() {
        let parsed = parse_block_rules(
            r#"[
                {"hostname": "postmates.com", "type": "pathname",
                 "blockedPathnameWords": ["mcdonalds", "burger-king"],
                 "blockedItems": ["coke"]},
                {"hostname": "discord.com", "type": "url", "url": "https://discord.com/channels/1/2"}
            ]"#,
        )
        .unwrap();
        assert_eq!(parsed.legacy_expanded, 1);
        let kinds: Vec<RuleKind> = parsed.rules.iter().map(|r| r.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                RuleKind::Pathname { pathname: "mcdonalds".into() },
                RuleKind::Pathname { pathname: "burger-king".into() },
                RuleKind::Item { item: "coke".into() },
                RuleKind::Url { url: "https://discord.com/channels/1/2".into() },
            ]
        );
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let parsed = parse_block_rules(
            r#"[
                {"type": "regex", "hostname": "a.com"},
                42,
                {"type": "item", "hostname": "a.com", "item": "soda"},
                {"blockedItems": ["x"]},
                {"hostname": "b.com", "blockedItems": [1]}
            ]"#,
        )
        .unwrap();
        assert_eq!(parsed.rules, vec![BlockRule::item("a.com", "soda")]);
        let indexes: Vec<usize> = parsed.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_wrapped_and_empty_inputs() {
        let parsed = parse_block_rules(r#"{"blockRules": [{"type": "host", "hostname": "digg.com"}]}"#).unwrap();
        assert_eq!(parsed.rules, vec![BlockRule::host("digg.com")]);
        assert_eq!(rules_from_value(&Value::Null).unwrap(), ParsedRules::default());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(parse_block_rules("{not json"), Err(RuleParseError::Json(_))));
        assert!(matches!(parse_block_rules("\"rules\""), Err(RuleParseError::NotAnArray("string"))));
        assert!(matches!(parse_block_rules("{}"), Err(RuleParseError::NotAnArray("object"))));
    }
}
