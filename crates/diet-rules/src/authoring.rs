//! Deriving new rules from what the user picked on a page.

use url::Url;

use diet_core::types::BlockRule;
use diet_core::url::normalize_url;

/// The path a link rule should match for `url`.
///
/// Absolute http(s) URLs give their normalized path (no trailing slash or
/// index document), falling back to the raw path for the site root. Anything
/// that does not parse falls back to its normalized form, then to the input.
pub fn pathname_for_url(url: &str) -> String {
    let normalized = normalize_url(url);

    if let Ok(parsed) = Url::parse(url) {
        if matches!(parsed.scheme(), "http" | "https") && !normalized.is_empty() {
            if let Ok(canonical) = Url::parse(&format!("https://{normalized}")) {
                if canonical.path() != "/" {
                    return canonical.path().to_string();
                }
            }
        }
        return parsed.path().to_string();
    }

    if normalized.is_empty() {
        url.to_string()
    } else {
        normalized
    }
}

/// A `pathname` rule on `hostname` for the link at `url`.
pub fn pathname_rule_for_url(hostname: &str, url: &str) -> BlockRule {
    BlockRule::pathname(hostname, pathname_for_url(url))
}

/// A `url` rule on `hostname` for the normalized form of `url`, if it has one.
pub fn url_rule_for_link(hostname: &str, url: &str) -> Option<BlockRule> {
    let normalized = normalize_url(url);
    (!normalized.is_empty()).then(|| BlockRule::url(hostname, normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathname_from_absolute_url() {
        assert_eq!(
            pathname_for_url("https://postmates.com/store/mcdonalds-main-st/abc123?ref=feed#top"),
            "/store/mcdonalds-main-st/abc123"
        );
        assert_eq!(pathname_for_url("https://postmates.com/store/dunkin/"), "/store/dunkin");
        assert_eq!(pathname_for_url("https://postmates.com/menu/index.html"), "/menu");
        assert_eq!(pathname_for_url("https://postmates.com/"), "/");
    }

    #[test]
    fn test_pathname_fallbacks() {
        // Not absolute: normalized form, then raw input.
        assert_eq!(pathname_for_url("postmates.com/store/x/"), "postmates.com/store/x");
        assert_eq!(pathname_for_url("/store/x"), "/store/x");
        assert_eq!(pathname_for_url(""), "");
    }

    #[test]
    fn test_rule_builders() {
        assert_eq!(
            pathname_rule_for_url("postmates.com", "https://postmates.com/store/dunkin/abc"),
            BlockRule::pathname("postmates.com", "/store/dunkin/abc")
        );
        assert_eq!(
            url_rule_for_link("twitter.com", "https://www.twitter.com/someone/"),
            Some(BlockRule::url("twitter.com", "twitter.com/someone"))
        );
        assert_eq!(url_rule_for_link("twitter.com", "#"), None);
    }
}
