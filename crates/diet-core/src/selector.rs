//! Best link block candidate selection
//!
//! Given the element a user pointed at, find the highest ancestor that still
//! represents a single blockable thing: one unique outgoing link, one unique
//! embedded id, or one detailed URL plus links to its parent URLs.
//!
//! The walk goes up one level at a time. Each level collects the anchors in
//! its subtree and sanitizes their hrefs against the current host. A level is
//! a valid candidate when it has exactly one unique URL, or exactly one unique
//! candidate id, or when every shorter URL is a prefix of the longest one. The
//! walk stops at the first level with several unrelated links, or at `<body>`.

use std::collections::HashMap;

use log::debug;
use url::Url;

use crate::candidate::get_candidate_id_for_url;
use crate::tree::TreeQuery;
use crate::url::{hosts_related, normalize_url, strip_fragment};

/// Retailer sub-paths that never identify the listing they appear in.
const NON_IDENTIFYING_RETAILER_PATHS: [&str; 5] = [
    "/customer-reviews",
    "/product-reviews",
    "/storefront",
    "/goldbox",
    "/bestsellers",
];

const RETAILER_HOST_MARKER: &str = "amazon";

/// Inputs for a selection walk.
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    /// Hostname of the page being browsed.
    pub hostname: String,
    /// Full URL of the page, used to recognize in-page `#` links.
    pub document_url: String,
    /// Log per-level statistics at `debug` level.
    pub trace: bool,
}

impl SelectorOptions {
    pub fn new(hostname: impl Into<String>, document_url: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            document_url: document_url.into(),
            trace: false,
        }
    }

    /// Options for a page URL, taking the hostname from it.
    pub fn for_page(page: &Url) -> Self {
        Self::new(page.host_str().unwrap_or_default(), page.as_str())
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// An element and the link inside it that a new rule should be derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkBlockCandidate<N> {
    pub link: N,
    pub element: N,
}

/// The normalized form of `href` if it can identify something on `hostname`.
///
/// Returns `None` for missing hrefs, in-page `#` links, `javascript:` links,
/// links to unrelated hosts, hrefs that do not normalize, and retailer
/// sub-pages that are shared between many listings.
pub fn sanitized_url_for_host(href: &str, options: &SelectorOptions) -> Option<String> {
    if href.is_empty() {
        return None;
    }

    let document_url =
        strip_fragment(&options.document_url).unwrap_or_else(|| options.document_url.clone());
    if !document_url.is_empty() && href.starts_with(&format!("{document_url}#")) {
        return None;
    }

    if href.starts_with("javascript:") {
        return None;
    }

    let link_host = Url::parse(href).ok()?.host_str()?.to_string();
    if !hosts_related(&options.hostname, &link_host) {
        return None;
    }

    let normalized = normalize_url(href);
    if normalized.is_empty() {
        return None;
    }

    if options.hostname.contains(RETAILER_HOST_MARKER)
        && NON_IDENTIFYING_RETAILER_PATHS
            .iter()
            .any(|path| normalized.contains(path))
    {
        return None;
    }

    Some(normalized)
}

/// Insertion-ordered map where a repeated key keeps its first position but
/// takes the latest value.
struct LastWins<N> {
    entries: Vec<(String, N)>,
    index: HashMap<String, usize>,
}

impl<N> LastWins<N> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, key: String, value: N) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Walk up from `start` and return the highest element that represents a
/// single blockable link, or `None` if no level qualifies.
pub fn get_best_link_block_candidate<T: TreeQuery>(
    tree: &T,
    start: &T::Node,
    options: &SelectorOptions,
) -> Option<LinkBlockCandidate<T::Node>> {
    let mut best: Option<LinkBlockCandidate<T::Node>> = None;
    let mut current = start.clone();

    loop {
        let mut unique_urls = LastWins::new();
        for anchor in tree.anchors_within(&current) {
            let sanitized = tree
                .href(&anchor)
                .and_then(|href| sanitized_url_for_host(&href, options));
            if let Some(url) = sanitized {
                unique_urls.insert(url, anchor);
            }
        }

        let mut unique_ids = LastWins::new();
        for (url, link) in &unique_urls.entries {
            let id = get_candidate_id_for_url(url).unwrap_or_else(|| url.clone());
            unique_ids.insert(id, link.clone());
        }

        let num_unique_urls = unique_urls.len();
        let num_unique_ids = unique_ids.len();

        let mut prefix_link: Option<T::Node> = None;
        if num_unique_urls > 1 {
            let mut by_length: Vec<&(String, T::Node)> = unique_urls.entries.iter().collect();
            by_length.sort_by_key(|(url, _)| url.len());
            let last = by_length.len() - 1;
            let (longest, link) = by_length[last];
            if by_length[..last]
                .iter()
                .all(|(url, _)| longest.starts_with(url.as_str()))
            {
                prefix_link = Some(link.clone());
            }
        }

        if options.trace {
            let urls: Vec<&str> = unique_urls.entries.iter().map(|(url, _)| url.as_str()).collect();
            debug!(
                "selector level <{}>: num_unique_urls={num_unique_urls} num_unique_ids={num_unique_ids} prefix={} urls={urls:?}",
                tree.tag_name(&current),
                prefix_link.is_some(),
            );
        }

        if num_unique_urls > 1 && num_unique_ids > 1 && prefix_link.is_none() {
            if options.trace {
                debug!("selector stopped: several unrelated links");
            }
            break;
        }

        let link = if num_unique_urls == 1 {
            unique_urls.entries.first().map(|(_, link)| link.clone())
        } else if num_unique_ids == 1 {
            unique_ids.entries.first().map(|(_, link)| link.clone())
        } else {
            prefix_link
        };
        if let Some(link) = link {
            best = Some(LinkBlockCandidate {
                link,
                element: current.clone(),
            });
        }

        match tree.parent_of(&current) {
            Some(parent) if !tree.is_body(&parent) => current = parent,
            _ => {
                if options.trace {
                    debug!("selector stopped: reached the top of the document");
                }
                break;
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(hostname: &str) -> SelectorOptions {
        SelectorOptions::new(hostname, format!("https://{hostname}/__test__"))
    }

    #[test]
    fn test_sanitize_rejects_non_identifying_links() {
        let opts = options("www.amazon.com");
        assert_eq!(sanitized_url_for_host("", &opts), None);
        assert_eq!(sanitized_url_for_host("https://www.amazon.com/__test__#reviews", &opts), None);
        assert_eq!(sanitized_url_for_host("javascript:void(0)", &opts), None);
        assert_eq!(sanitized_url_for_host("https://ebay.com/itm/1", &opts), None);
        assert_eq!(sanitized_url_for_host("not a url", &opts), None);
        assert_eq!(
            sanitized_url_for_host("https://www.amazon.com/product-reviews/B071D4RJWC", &opts),
            None
        );
        assert_eq!(sanitized_url_for_host("https://www.amazon.com/gp/goldbox", &opts), None);
    }

    #[test]
    fn test_sanitize_accepts_related_hosts() {
        let opts = options("www.amazon.com");
        assert_eq!(
            sanitized_url_for_host("https://www.amazon.com/dp/B071D4RJWC?ref=x", &opts).as_deref(),
            Some("amazon.com/dp/B071D4RJWC")
        );
        // Sibling subdomains are unrelated.
        assert_eq!(sanitized_url_for_host("https://smile.amazon.com/dp/B071D4RJWC", &opts), None);

        let opts = options("amazon.com");
        assert_eq!(
            sanitized_url_for_host("https://smile.amazon.com/dp/B071D4RJWC", &opts).as_deref(),
            Some("smile.amazon.com/dp/B071D4RJWC")
        );
    }

    #[test]
    fn test_retailer_paths_only_apply_to_retailer_hosts() {
        let opts = options("shop.com");
        assert_eq!(
            sanitized_url_for_host("https://shop.com/storefront/1", &opts).as_deref(),
            Some("shop.com/storefront/1")
        );
    }

    #[test]
    fn test_last_wins_keeps_first_position() {
        let mut map = LastWins::new();
        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 2);
        map.insert("a".to_string(), 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map.entries, vec![("a".to_string(), 3), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_options_for_page() {
        let page = Url::parse("https://postmates.com/feed#top").unwrap();
        let opts = SelectorOptions::for_page(&page).with_trace(true);
        assert_eq!(opts.hostname, "postmates.com");
        assert!(opts.trace);
    }
}
