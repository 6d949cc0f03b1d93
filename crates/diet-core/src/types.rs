//! Core type definitions for Internet Diet
//!
//! These types map directly to the persisted JSON shapes, which must stay
//! readable by older and newer versions of the extension alike.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Block Rules
// =============================================================================

/// A user- or default-defined block rule.
///
/// `id` and `created_at` are assigned once when the rule is stored and are
/// never part of rule equality (see [`crate::hash::rule_fingerprint`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, rename = "createdAt", skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    /// Exact hostname the rule applies to.
    pub hostname: String,
    #[serde(flatten)]
    pub kind: RuleKind,
}

/// What a rule blocks on its host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleKind {
    /// Every URL on the host.
    Host,
    /// URLs whose path contains the substring.
    Pathname { pathname: String },
    /// URLs whose normalized form extends the normalized rule URL.
    Url { url: String },
    /// Text items matching the keyword as a whole word.
    Item { item: String },
}

impl RuleKind {
    /// The `type` discriminator as persisted.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Host => "host",
            RuleKind::Pathname { .. } => "pathname",
            RuleKind::Url { .. } => "url",
            RuleKind::Item { .. } => "item",
        }
    }
}

impl BlockRule {
    /// A rule that has not been assigned an id or creation time yet.
    pub fn new(hostname: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: String::new(),
            created_at: String::new(),
            hostname: hostname.into(),
            kind,
        }
    }

    pub fn host(hostname: impl Into<String>) -> Self {
        Self::new(hostname, RuleKind::Host)
    }

    pub fn pathname(hostname: impl Into<String>, pathname: impl Into<String>) -> Self {
        Self::new(hostname, RuleKind::Pathname { pathname: pathname.into() })
    }

    pub fn url(hostname: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(hostname, RuleKind::Url { url: url.into() })
    }

    pub fn item(hostname: impl Into<String>, item: impl Into<String>) -> Self {
        Self::new(hostname, RuleKind::Item { item: item.into() })
    }

    /// Whether both `id` and `createdAt` are present.
    pub fn is_assigned(&self) -> bool {
        !self.id.is_empty() && !self.created_at.is_empty()
    }

    /// Attach identity fields, keeping any that are already set.
    pub fn with_identity(mut self, id: impl Into<String>, created_at: impl Into<String>) -> Self {
        if self.id.is_empty() {
            self.id = id.into();
        }
        if self.created_at.is_empty() {
            self.created_at = created_at.into();
        }
        self
    }
}

impl fmt::Display for BlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RuleKind::Host => write!(f, "host {}", self.hostname),
            RuleKind::Pathname { pathname } => write!(f, "pathname {} {}", self.hostname, pathname),
            RuleKind::Url { url } => write!(f, "url {} {}", self.hostname, url),
            RuleKind::Item { item } => write!(f, "item {} {}", self.hostname, item),
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// How blocked elements are suppressed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockEffect {
    #[default]
    Blur,
    Hide,
}

/// User settings. Missing keys take their defaults when read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Global override that disables every block decision.
    pub is_paused: bool,
    /// Page shown instead of a blocked host, empty for the built-in page.
    pub custom_block_url: String,
    pub block_effect: BlockEffect,
}

/// A partial settings update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_block_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_effect: Option<BlockEffect>,
}

impl Settings {
    /// Apply a partial update on top of these settings.
    pub fn merged(&self, patch: &SettingsPatch) -> Settings {
        Settings {
            is_paused: patch.is_paused.unwrap_or(self.is_paused),
            custom_block_url: patch
                .custom_block_url
                .clone()
                .unwrap_or_else(|| self.custom_block_url.clone()),
            block_effect: patch.block_effect.unwrap_or(self.block_effect),
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Running totals of blocked elements. Only ever incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub num_blocked_links_total: u64,
    pub num_blocked_items_total: u64,
}

impl Stats {
    pub fn incremented(&self, links: u64, items: u64) -> Stats {
        Stats {
            num_blocked_links_total: self.num_blocked_links_total.saturating_add(links),
            num_blocked_items_total: self.num_blocked_items_total.saturating_add(items),
        }
    }
}
