//! Candidate id extraction
//!
//! Listing URLs embed their identifier in different shapes: UUIDs, 24-char
//! document ids, opaque alphanumeric SKUs, slugs with numeric suffixes. The
//! cascade below runs from most to least specific so descriptive words in a
//! URL are not mistaken for ids.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::memo::Memo;

/// Capacity of the process-wide candidate id cache.
pub const CANDIDATE_ID_CACHE_CAPACITY: usize = 4096;

struct IdPattern {
    re: Regex,
    /// A match is discarded if any of these match it.
    not: Vec<Regex>,
}

impl IdPattern {
    fn new(re: &str, not: &[&str]) -> Self {
        Self {
            re: Regex::new(re).expect("id pattern"),
            not: not
                .iter()
                .map(|pattern| Regex::new(pattern).expect("id exclusion pattern"))
                .collect(),
        }
    }

    fn matches<'u>(&self, url: &'u str) -> Vec<&'u str> {
        self.re
            .find_iter(url)
            .map(|m| m.as_str())
            .filter(|id| !self.not.iter().any(|not| not.is_match(id)))
            .collect()
    }
}

const PURELY_ALPHABETIC: &str = r"(?i)^[a-z]*$";
const TWO_WORD_SLUG: &str = r"(?i)^[a-z]+[-_][a-z]+$";

static ID_PATTERNS: Lazy<Vec<IdPattern>> = Lazy::new(|| {
    vec![
        // uuid
        IdPattern::new(
            r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-5][0-9a-f]{3}-[089ab][0-9a-f]{3}-[0-9a-f]{12}\b",
            &[],
        ),
        // document database object id
        IdPattern::new(r"(?i)\b[a-f\d]{24}\b", &[]),
        // opaque sku
        IdPattern::new(r"(?i)\b[a-z0-9]{10,}\b", &[PURELY_ALPHABETIC]),
        IdPattern::new(r"(?i)\b[a-z0-9_-]{10,}\b", &[PURELY_ALPHABETIC, TWO_WORD_SLUG]),
        IdPattern::new(r"(?i)\b[a-z0-9_-]{8,}\b", &[PURELY_ALPHABETIC, TWO_WORD_SLUG]),
    ]
});

static CANDIDATE_IDS: Lazy<Memo<Option<String>>> =
    Lazy::new(|| Memo::new(CANDIDATE_ID_CACHE_CAPACITY, compute_candidate_id));

/// All surviving matches of the first pattern in the cascade that yields any.
pub fn candidate_ids_for_url(url: &str) -> Vec<&str> {
    ID_PATTERNS
        .iter()
        .map(|pattern| pattern.matches(url))
        .find(|ids| !ids.is_empty())
        .unwrap_or_default()
}

/// The most specific identifier embedded in a normalized URL.
///
/// Returns the last match of the first pattern that matches, or `None`.
///
/// ```
/// use diet_core::candidate::get_candidate_id_for_url;
///
/// assert_eq!(
///     get_candidate_id_for_url("amazon.com/gp/product/B01ITIOG5Y/ref=pd_alm_fs").as_deref(),
///     Some("B01ITIOG5Y"),
/// );
/// assert_eq!(get_candidate_id_for_url("consumer-reviews"), None);
/// ```
pub fn get_candidate_id_for_url(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    CANDIDATE_IDS.get(url)
}

fn compute_candidate_id(url: &str) -> Option<String> {
    candidate_ids_for_url(url).last().map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(url: &str) -> Option<String> {
        get_candidate_id_for_url(url)
    }

    #[test]
    fn test_amazon_product_links_share_id() {
        let urls = [
            "amazon.com/gp/product/B01ITIOG5Y/ref=pd_alm_fs_merch_1_1_fs_dsk_sf_mw_img_Fr22804",
            "amazon.com/gp/product/B01ITIOG5Y/ref=pd_alm_fs_merch_1_1_fs_dsk_sf_mw_tcl_Fr22804",
            "amazon.com/gp/product-reviews/B01ITIOG5Y/ref=fs_dsk_sf_mw_rcl_Fr22804",
        ];
        for url in urls {
            assert_eq!(id(url).as_deref(), Some("B01ITIOG5Y"), "{url}");
        }
    }

    #[test]
    fn test_amazon_dp_and_reviews_share_id() {
        assert_eq!(
            id("amazon.com/MS-Chocolate-Candy-Sharing-10-7-Ounce/dp/B071D4RJWC").as_deref(),
            Some("B071D4RJWC")
        );
        assert_eq!(
            id("amazon.com/gp/customer-reviews/product/B071D4RJWC").as_deref(),
            Some("B071D4RJWC")
        );
    }

    #[test]
    fn test_uuid_wins_over_later_patterns() {
        assert_eq!(
            id("/store/starbucks-395-flatbush-ave-extension/uACJvRi0Qv2zMRdH4mt6_Q/01e381f0-adb1-5fb9-b65b-8414428a5811/6013c77c-1e89-58ea-8466-be46930e1b91").as_deref(),
            Some("6013c77c-1e89-58ea-8466-be46930e1b91")
        );
    }

    #[test]
    fn test_object_id() {
        assert_eq!(
            id("/objectid/5bf142459b72e12b2b1b2cd0/foo/bar").as_deref(),
            Some("5bf142459b72e12b2b1b2cd0")
        );
    }

    #[test]
    fn test_delivery_slugs() {
        assert_eq!(
            id("/store/stop-1-deli/e8UstpdqRqSITq9weojBiA").as_deref(),
            Some("e8UstpdqRqSITq9weojBiA")
        );
        assert_eq!(id("/store/items/item_51472338984").as_deref(), Some("item_51472338984"));
        assert_eq!(
            id("/menu/omaha-burgers-606-5th-ave-brooklyn/1447522").as_deref(),
            Some("omaha-burgers-606-5th-ave-brooklyn")
        );
        assert_eq!(
            id("/store/7th-avenue-donuts-park-slope/IVK5FvWYQrKsPjcc6xyJ-A").as_deref(),
            Some("IVK5FvWYQrKsPjcc6xyJ")
        );
    }

    #[test]
    fn test_short_mixed_ids() {
        // Too short for the ten-character patterns.
        assert_eq!(id("shop.com/item/ab12-cd34").as_deref(), Some("ab12-cd34"));
        assert_eq!(id("shop.com/p/x7k2m9q4").as_deref(), Some("x7k2m9q4"));
    }

    #[test]
    fn test_negatives() {
        for url in ["consumer-reviews", "12345", "123456", "1234567", "burger-king", "tacos-bar", ""] {
            assert_eq!(id(url), None, "{url}");
        }
    }

    #[test]
    fn test_candidate_ids_lists_all_matches() {
        let ids = candidate_ids_for_url("shop.com/a/B01ITIOG5Y/B071D4RJWC");
        assert_eq!(ids, vec!["B01ITIOG5Y", "B071D4RJWC"]);
    }
}
