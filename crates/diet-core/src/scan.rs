//! Page scanning
//!
//! One pass over a subtree that reports every element the current rules
//! would suppress. Blocked links and blocked text items are both widened to
//! their closest list item or `div` so the whole listing disappears, not just
//! the anchor. The totals feed the stats counters.

use url::Url;

use crate::matcher::RuleMatcher;
use crate::tree::TreeQuery;

/// A link blocked by a host, pathname or url rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedLink<N> {
    /// Element to suppress.
    pub container: N,
    pub link: N,
    pub href: String,
}

/// A text element blocked by an item rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedItem<N> {
    /// Element to suppress.
    pub container: N,
    pub element: N,
    pub text: String,
}

/// Result of scanning one subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport<N> {
    pub links: Vec<BlockedLink<N>>,
    pub items: Vec<BlockedItem<N>>,
}

impl<N> Default for ScanReport<N> {
    fn default() -> Self {
        Self {
            links: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl<N: PartialEq> ScanReport<N> {
    pub fn num_blocked_links(&self) -> u64 {
        self.links.len() as u64
    }

    pub fn num_blocked_items(&self) -> u64 {
        self.items.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.items.is_empty()
    }

    /// Whether `node` is already suppressed by this report.
    pub fn is_suppressed(&self, node: &N) -> bool {
        self.links.iter().any(|link| &link.container == node)
            || self.items.iter().any(|item| &item.container == node)
    }

    /// Every element to suppress, links first, without duplicates.
    pub fn containers(&self) -> Vec<&N> {
        let mut out: Vec<&N> = Vec::new();
        let all = self
            .links
            .iter()
            .map(|link| &link.container)
            .chain(self.items.iter().map(|item| &item.container));
        for container in all {
            if !out.contains(&container) {
                out.push(container);
            }
        }
        out
    }
}

/// The element to suppress for a blocked node: closest `li`, else closest `div`, else the node.
pub fn closest_block_container<T: TreeQuery>(tree: &T, node: &T::Node) -> T::Node {
    tree.closest(node, "li")
        .or_else(|| tree.closest(node, "div"))
        .unwrap_or_else(|| node.clone())
}

/// Scan `root` for links and text items blocked on `page`.
pub fn scan_page<T: TreeQuery>(
    tree: &T,
    root: &T::Node,
    page: &Url,
    matcher: &RuleMatcher,
) -> ScanReport<T::Node> {
    let mut report = ScanReport::default();
    if !matcher.is_blocking_enabled_for_host(page) {
        return report;
    }

    for link in tree.anchors_within(root) {
        let Some(href) = tree.href(&link) else {
            continue;
        };
        if !matcher.is_url_blocked_as_string(&href) {
            continue;
        }
        let container = closest_block_container(tree, &link);
        if !report.is_suppressed(&container) {
            report.links.push(BlockedLink {
                container,
                link,
                href,
            });
        }
    }

    for element in tree.text_leaves_within(root) {
        let Some(text) = tree.own_text(&element) else {
            continue;
        };
        let container = closest_block_container(tree, &element);
        if report.is_suppressed(&container) {
            continue;
        }
        if matcher.is_item_blocked(page, Some(&text)) {
            report.items.push(BlockedItem {
                container,
                element,
                text: text.trim().to_string(),
            });
        }
    }

    report
}
