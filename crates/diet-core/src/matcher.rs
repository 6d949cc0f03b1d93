//! Rule Matching Engine
//!
//! A [`RuleMatcher`] is an immutable snapshot of the rule set plus the pause
//! flag. Everything a predicate needs is precomputed at construction: item
//! patterns are compiled once and url rules are normalized once. A rule change
//! builds a new matcher; nothing here is ever mutated in place.

use log::{debug, warn};
use regex::Regex;
use url::Url;

use crate::types::{BlockRule, RuleKind};
use crate::url::{effective_host, normalize_url};

/// Item rules only apply when the keyword is at least this fraction of the text.
pub const ITEM_LENGTH_RATIO: f64 = 8.0;

// =============================================================================
// Compiled rules
// =============================================================================

enum Compiled {
    Host,
    Pathname(String),
    Url {
        raw: String,
        normalized: String,
    },
    Item {
        pattern: Option<Regex>,
        chars: usize,
    },
}

struct CompiledRule {
    /// Effective form of the rule's hostname.
    hostname: String,
    compiled: Compiled,
}

impl CompiledRule {
    fn new(rule: &BlockRule) -> Self {
        let compiled = match &rule.kind {
            RuleKind::Host => Compiled::Host,
            RuleKind::Pathname { pathname } => Compiled::Pathname(pathname.clone()),
            RuleKind::Url { url } => Compiled::Url {
                raw: url.clone(),
                normalized: normalize_url(url),
            },
            RuleKind::Item { item } => Compiled::Item {
                pattern: item_pattern(item),
                chars: item.chars().count(),
            },
        };
        Self {
            hostname: effective_host(&rule.hostname),
            compiled,
        }
    }
}

/// Whole-word, case-insensitive, optionally pluralized literal keyword.
fn item_pattern(item: &str) -> Option<Regex> {
    match Regex::new(&format!(r"(?i)\b{}s?\b", regex::escape(item))) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("item rule {item:?} has no usable pattern: {e}");
            None
        }
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// Pure block predicates over a rule snapshot.
pub struct RuleMatcher {
    rules: Vec<BlockRule>,
    compiled: Vec<CompiledRule>,
    paused: bool,
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self::new(Vec::new(), false)
    }
}

impl RuleMatcher {
    /// Build a matcher over `rules`.
    pub fn new(rules: Vec<BlockRule>, paused: bool) -> Self {
        let compiled = rules.iter().map(CompiledRule::new).collect();
        Self {
            rules,
            compiled,
            paused,
        }
    }

    /// The rules this matcher was built from.
    pub fn rules(&self) -> &[BlockRule] {
        &self.rules
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A copy of this matcher with a different pause flag.
    pub fn with_paused(&self, paused: bool) -> Self {
        Self::new(self.rules.clone(), paused)
    }

    /// Rules whose hostname is the URL's host. Hosts compare in their
    /// effective form, so `www.` on either side is ignored.
    fn rules_for_host<'s>(&'s self, url: &Url) -> impl Iterator<Item = &'s CompiledRule> + 's {
        let host = effective_host(url.host_str().unwrap_or(""));
        self.compiled
            .iter()
            .filter(move |rule| !host.is_empty() && rule.hostname == host)
    }

    /// Whether a `host` rule covers the URL's host.
    pub fn is_host_blocked(&self, url: &Url) -> bool {
        if self.paused {
            return false;
        }
        self.rules_for_host(url)
            .any(|rule| matches!(rule.compiled, Compiled::Host))
    }

    /// Whether any rule at all targets the URL's host.
    pub fn is_blocking_enabled_for_host(&self, url: &Url) -> bool {
        if self.paused {
            return false;
        }
        self.rules_for_host(url).next().is_some()
    }

    /// Whether a host, pathname or url rule blocks the URL.
    pub fn is_url_blocked(&self, url: &Url) -> bool {
        if self.paused {
            return false;
        }

        // Normalized lazily, only once a url rule is reached.
        let mut normalized: Option<String> = None;

        for rule in self.rules_for_host(url) {
            match &rule.compiled {
                Compiled::Host => {
                    debug!("blocking host {url}");
                    return true;
                }
                Compiled::Pathname(pathname) => {
                    if url.path().contains(pathname.as_str()) {
                        debug!("blocking pathname {}", url.path());
                        return true;
                    }
                }
                Compiled::Url { raw, normalized: rule_url } => {
                    let normalized = normalized.get_or_insert_with(|| normalize_url(url.as_str()));
                    if normalized.is_empty() {
                        continue;
                    }
                    let prefix_match = !rule_url.is_empty() && normalized.starts_with(rule_url.as_str());
                    let raw_match = !raw.is_empty() && normalized.starts_with(raw.as_str());
                    if prefix_match || raw_match {
                        debug!("blocking url {url} (normalized {normalized})");
                        return true;
                    }
                }
                Compiled::Item { .. } => {}
            }
        }

        false
    }

    /// [`is_url_blocked`](Self::is_url_blocked) for unparsed input. Malformed URLs are not blocked.
    pub fn is_url_blocked_as_string(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.is_url_blocked(&parsed),
            Err(_) => false,
        }
    }

    /// Whether an item rule for the URL's host matches `text`.
    pub fn is_item_blocked(&self, url: &Url, text: Option<&str>) -> bool {
        if self.paused {
            return false;
        }

        let text = text.unwrap_or("").to_lowercase();
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let text_chars = text.chars().count() as f64;

        self.rules_for_host(url).any(|rule| match &rule.compiled {
            Compiled::Item {
                pattern: Some(pattern),
                chars,
            } => {
                let blocked =
                    *chars as f64 >= text_chars / ITEM_LENGTH_RATIO && pattern.is_match(text);
                if blocked {
                    debug!("blocking item (rule: {}) {text}", pattern.as_str());
                }
                blocked
            }
            _ => false,
        })
    }
}
