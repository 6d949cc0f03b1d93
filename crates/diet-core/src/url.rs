//! URL canonicalization
//!
//! `normalize_url` turns any absolute-ish URL string into the comparable form
//! used throughout the engine: no scheme marker, lowercase host without `www.`,
//! no credentials, fragment or query, no trailing index document and no
//! trailing slash. `https` is forced internally so `http` and `https` links to
//! the same resource normalize identically.
//!
//! Normalization never fails: invalid, relative or empty input yields `""`,
//! which callers must treat as "no canonical form", never as a comparison value.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::memo::Memo;

/// Capacity of the process-wide normalization cache.
pub const URL_CACHE_CAPACITY: usize = 4096;

static NORMALIZER: Lazy<UrlNormalizer> =
    Lazy::new(|| UrlNormalizer::with_capacity(URL_CACHE_CAPACITY));

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+://").expect("scheme prefix pattern"));

static RELATIVE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.*/").expect("relative path pattern"));

static WWW_REMAINDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z\-\d]{1,63}\.[a-z.\-\d]{2,63}$").expect("www remainder pattern")
});

static DIRECTORY_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^index(\.[a-z]+)?$").expect("directory index pattern"));

// =============================================================================
// Normalizer
// =============================================================================

/// URL normalizer with its own bounded memo cache.
///
/// Most callers want the shared instance behind [`normalize_url`]; separate
/// instances exist for callers that need an isolated cache.
pub struct UrlNormalizer {
    memo: Memo<String>,
}

impl UrlNormalizer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            memo: Memo::new(capacity, normalize_uncached),
        }
    }

    /// Normalize `input`, returning `""` when it has no canonical form.
    pub fn normalize(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }
        self.memo.get(input)
    }

    /// Number of memoized entries.
    pub fn cached(&self) -> usize {
        self.memo.len()
    }
}

/// Normalize a URL through the shared memoized normalizer.
///
/// ```
/// use diet_core::url::normalize_url;
///
/// assert_eq!(normalize_url("https://www.test.com/foo/bar/?a=1#top"), "test.com/foo/bar");
/// assert_eq!(normalize_url("/relative/path"), "");
/// ```
pub fn normalize_url(input: &str) -> String {
    NORMALIZER.normalize(input)
}

/// Like [`normalize_url`] but for optional inputs.
pub fn normalize_url_opt(input: Option<&str>) -> String {
    input.map(normalize_url).unwrap_or_default()
}

fn normalize_uncached(input: &str) -> String {
    normalize_inner(input).unwrap_or_default()
}

fn normalize_inner(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() || has_unsupported_scheme(input) {
        return None;
    }

    let has_relative_protocol = input.starts_with("//");
    if !has_relative_protocol && RELATIVE_PATH.is_match(input) {
        return None;
    }

    let absolute = if has_relative_protocol {
        format!("http:{input}")
    } else if SCHEME_PREFIX.is_match(input) {
        input.to_string()
    } else {
        format!("http://{input}")
    };

    let mut url = Url::parse(&absolute).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return None,
    };

    if url.scheme() == "http" {
        url.set_scheme("https").ok()?;
    }
    // Both fail only for URLs without a host, which were rejected above.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_fragment(None);
    url.set_query(None);

    let path = normalize_path(url.path());
    url.set_path(&path);

    let canonical_host = strip_www(host.strip_suffix('.').unwrap_or(&host));
    if canonical_host != host {
        url.set_host(Some(canonical_host)).ok()?;
    }

    let mut serialized = String::from(url);
    if serialized.ends_with('/') {
        serialized.pop();
    }

    let without_scheme = serialized
        .strip_prefix("https://")
        .or_else(|| serialized.strip_prefix("http://"))
        .unwrap_or(&serialized);

    Some(without_scheme.to_string())
}

fn has_unsupported_scheme(input: &str) -> bool {
    let lower = input.get(..12).unwrap_or(input).to_ascii_lowercase();
    lower.starts_with("data:") || lower.starts_with("view-source:")
}

/// The host a rule refers to: lowercase, without a trailing dot or a single
/// leading `www.` label.
///
/// ```
/// use diet_core::url::effective_host;
///
/// assert_eq!(effective_host("www.postmates.com"), "postmates.com");
/// assert_eq!(effective_host("news.digg.com"), "news.digg.com");
/// ```
pub fn effective_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    strip_www(host.strip_suffix('.').unwrap_or(&host)).to_string()
}

/// Strip a single leading `www.` when a registrable name follows it.
fn strip_www(host: &str) -> &str {
    match host.strip_prefix("www.") {
        Some(rest) if !rest.starts_with("www.") && WWW_REMAINDER.is_match(rest) => rest,
        _ => host,
    }
}

fn normalize_path(path: &str) -> String {
    let mut path = decode_unreserved(&collapse_slashes(path));

    loop {
        if path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        let last_segment = path.rsplit('/').next().unwrap_or("");
        if !DIRECTORY_INDEX.is_match(last_segment) {
            break;
        }
        let cut = path.len() - last_segment.len();
        path.truncate(cut);
    }

    if path.ends_with('/') {
        path.pop();
    }
    path
}

/// Collapse runs of `/`, leaving `scheme://` sequences embedded in the path intact.
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch == '/' && out.ends_with('/') && !out.ends_with(":/") {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Decode percent-escaped unreserved characters (`A-Z a-z 0-9 - _ ~`).
///
/// `.` stays escaped so decoding can never introduce dot segments.
fn decode_unreserved(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = hex_value(bytes[i + 1])
                .zip(hex_value(bytes[i + 2]))
                .map(|(hi, lo)| hi << 4 | lo);
            if let Some(b) = decoded {
                if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'~') {
                    out.push(b as char);
                    i += 3;
                    continue;
                }
            }
        }
        // Copy one UTF-8 character.
        let ch_len = utf8_len(bytes[i]);
        out.push_str(&path[i..i + ch_len]);
        i += ch_len;
    }

    out
}

#[inline]
fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

#[inline]
fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

// =============================================================================
// Comparison helpers
// =============================================================================

/// Whether `prefix` is `url` or a path-boundary prefix of it.
///
/// Both sides must be normalized; empty strings never match.
pub fn is_path_prefix(url: &str, prefix: &str) -> bool {
    if url.is_empty() || prefix.is_empty() || !url.starts_with(prefix) {
        return false;
    }
    url.len() == prefix.len() || prefix.ends_with('/') || url[prefix.len()..].starts_with('/')
}

/// Whether two normalized URLs refer to the same or a related resource.
pub fn urls_related(a: &str, b: &str) -> bool {
    is_path_prefix(a, b) || is_path_prefix(b, a)
}

/// Whether two hostnames are related, tolerating subdomain variation.
pub fn hosts_related(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Extract the hostname of an absolute URL.
pub fn hostname_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

/// Extract the path of an absolute URL.
pub fn pathname_of(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|parsed| parsed.path().to_string())
}

/// The document URL with its fragment removed, used to recognize in-page links.
pub fn strip_fragment(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    Some(String::from(parsed))
}
