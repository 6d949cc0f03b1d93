//! Reading settings and stats from stored values.

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use diet_core::types::{Settings, Stats};
use diet_core::url::normalize_url;

/// Settings from a stored value, with defaults for anything missing.
///
/// A value that cannot be read at all resolves to the defaults.
pub fn resolve_settings(value: Option<&Value>) -> Settings {
    resolve_or_default(value, "settings")
}

/// Stats from a stored value, with zero for anything missing.
pub fn resolve_stats(value: Option<&Value>) -> Stats {
    resolve_or_default(value, "stats")
}

fn resolve_or_default<T: DeserializeOwned + Default>(value: Option<&Value>, what: &str) -> T {
    match value {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("ignoring unreadable {what}: {e}");
            T::default()
        }),
    }
}

/// The custom block page as an absolute https URL, or `""` if it is unusable.
pub fn sanitized_custom_block_url(url: &str) -> String {
    let normalized = normalize_url(url);
    if normalized.is_empty() {
        return String::new();
    }
    let absolute = if normalized.contains("://") {
        normalized
    } else {
        format!("https://{normalized}")
    };
    match Url::parse(&absolute) {
        Ok(parsed) if parsed.scheme() == "https" => parsed.to_string(),
        _ => String::new(),
    }
}
