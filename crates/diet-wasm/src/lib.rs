//! WebAssembly bindings for Internet Diet
//!
//! Holds the page's rule snapshot and exposes matching, selection and the
//! trigger schedulers to the content script. Rules arrive as the JSON the
//! extension keeps in storage; every `init_rules` call replaces the snapshot.

pub mod dom;
pub mod logger;

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use url::Url;
use wasm_bindgen::prelude::*;
use web_sys::Element;

use diet_core::schedule::{
    Debounce, Throttle, HOVER_DEBOUNCE_WAIT, PEER_RESPONSE_TIMEOUT, SCAN_THROTTLE_INTERVAL,
};
use diet_core::{BlockRule, RuleMatcher, SelectorOptions};
use diet_rules::identity::Clock;
use diet_rules::optimizer;
use diet_rules::{parse_block_rules, resolve_block_rules};

use crate::dom::DomTree;

/// `Date.now()` as a [`Clock`].
struct JsClock;

impl Clock for JsClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(js_sys::Date::now() as i64).unwrap_or_default()
    }
}

#[derive(Default)]
struct EngineState {
    rules: Vec<BlockRule>,
    matcher: Arc<RuleMatcher>,
}

thread_local! {
    static ENGINE: RefCell<EngineState> = RefCell::new(EngineState::default());
}

fn current_matcher() -> Arc<RuleMatcher> {
    ENGINE.with(|engine| Arc::clone(&engine.borrow().matcher))
}

fn set_field(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

fn parse_url(url: &str) -> Option<Url> {
    Url::parse(url).ok()
}

fn duration_from_ms(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn document_url() -> String {
    web_sys::window()
        .and_then(|window| window.location().href().ok())
        .unwrap_or_default()
}

// =============================================================================
// Rules
// =============================================================================

/// Replace the rule snapshot with the rules in `rules_json`.
///
/// Returns `{ rules, skipped, deduped }`.
#[wasm_bindgen]
pub fn init_rules(rules_json: &str) -> Result<JsValue, JsValue> {
    let parsed = parse_block_rules(rules_json)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse rules: {e}")))?;
    let mut rules = resolve_block_rules(parsed.rules, &JsClock);
    let stats = optimizer::dedupe_block_rules(&mut rules);

    let paused = current_matcher().is_paused();
    let count = rules.len();
    ENGINE.with(|engine| {
        let mut engine = engine.borrow_mut();
        engine.matcher = Arc::new(RuleMatcher::new(rules.clone(), paused));
        engine.rules = rules;
    });
    info!("loaded {count} block rules");

    let result = js_sys::Object::new();
    set_field(&result, "rules", &JsValue::from(count as u32));
    set_field(&result, "skipped", &JsValue::from(parsed.skipped.len() as u32));
    set_field(&result, "deduped", &JsValue::from(stats.deduped as u32));
    Ok(result.into())
}

#[wasm_bindgen]
pub fn set_paused(paused: bool) {
    ENGINE.with(|engine| {
        let mut engine = engine.borrow_mut();
        engine.matcher = Arc::new(engine.matcher.with_paused(paused));
    });
    debug!("paused = {paused}");
}

#[wasm_bindgen]
pub fn is_paused() -> bool {
    current_matcher().is_paused()
}

/// Sorted hostnames that have at least one rule.
#[wasm_bindgen]
pub fn hostnames() -> js_sys::Array {
    let mut hosts: Vec<String> =
        ENGINE.with(|engine| engine.borrow().rules.iter().map(|r| r.hostname.clone()).collect());
    hosts.sort();
    hosts.dedup();
    hosts.iter().map(|host| JsValue::from_str(host)).collect()
}

/// Deduplicate a JSON rule list, returning the list without repeats.
#[wasm_bindgen]
pub fn dedupe_block_rules(rules_json: &str) -> Result<String, JsValue> {
    let mut rules = parse_block_rules(rules_json)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse rules: {e}")))?
        .rules;
    optimizer::dedupe_block_rules(&mut rules);
    serde_json::to_string(&rules).map_err(|e| JsValue::from_str(&e.to_string()))
}

// =============================================================================
// Matching
// =============================================================================

#[wasm_bindgen]
pub fn is_blocking_enabled_for_host(url: &str) -> bool {
    parse_url(url).is_some_and(|url| current_matcher().is_blocking_enabled_for_host(&url))
}

#[wasm_bindgen]
pub fn is_host_blocked(url: &str) -> bool {
    parse_url(url).is_some_and(|url| current_matcher().is_host_blocked(&url))
}

#[wasm_bindgen]
pub fn is_url_blocked(url: &str) -> bool {
    current_matcher().is_url_blocked_as_string(url)
}

#[wasm_bindgen]
pub fn is_item_blocked(url: &str, text: Option<String>) -> bool {
    parse_url(url).is_some_and(|url| current_matcher().is_item_blocked(&url, text.as_deref()))
}

#[wasm_bindgen]
pub fn normalize_url(url: &str) -> String {
    diet_core::url::normalize_url(url)
}

#[wasm_bindgen]
pub fn get_candidate_id_for_url(normalized_url: &str) -> Option<String> {
    diet_core::candidate::get_candidate_id_for_url(normalized_url)
}

// =============================================================================
// Page
// =============================================================================

/// The best element/link pair starting from `element`, as `{ element, link, href }`, or `null`.
#[wasm_bindgen]
pub fn best_link_block_candidate(element: Element, hostname: &str, trace: Option<bool>) -> JsValue {
    let options = SelectorOptions::new(hostname, document_url()).with_trace(trace.unwrap_or(false));
    let tree = DomTree::new();
    let Some(candidate) = diet_core::get_best_link_block_candidate(&tree, &element, &options) else {
        return JsValue::NULL;
    };

    let result = js_sys::Object::new();
    set_field(&result, "element", &candidate.element);
    set_field(&result, "link", &candidate.link);
    if let Some(href) = diet_core::TreeQuery::href(&tree, &candidate.link) {
        set_field(&result, "href", &JsValue::from_str(&href));
    }
    result.into()
}

/// Scan `root` for blocked links and items on the current page.
///
/// Returns `{ containers, numBlockedLinks, numBlockedItems }`.
#[wasm_bindgen]
pub fn scan(root: Element) -> Result<JsValue, JsValue> {
    let page = Url::parse(&document_url())
        .map_err(|e| JsValue::from_str(&format!("Invalid document URL: {e}")))?;
    let matcher = current_matcher();
    let report = diet_core::scan_page(&DomTree::new(), &root, &page, &matcher);

    let containers: js_sys::Array = report
        .containers()
        .into_iter()
        .map(|el| JsValue::from(el.clone()))
        .collect();
    let result = js_sys::Object::new();
    set_field(&result, "containers", &containers);
    set_field(&result, "numBlockedLinks", &JsValue::from(report.num_blocked_links() as f64));
    set_field(&result, "numBlockedItems", &JsValue::from(report.num_blocked_items() as f64));
    Ok(result.into())
}

#[wasm_bindgen]
pub fn peer_response_timeout_ms() -> f64 {
    duration_to_ms(PEER_RESPONSE_TIMEOUT)
}

// =============================================================================
// Schedulers
// =============================================================================

/// Trailing-edge throttle for rescans. Times are `performance.now()` milliseconds.
#[wasm_bindgen]
pub struct ScanThrottle {
    inner: Throttle,
}

#[wasm_bindgen]
impl ScanThrottle {
    #[wasm_bindgen(constructor)]
    pub fn new(interval_ms: Option<f64>) -> ScanThrottle {
        let interval = interval_ms.map_or(SCAN_THROTTLE_INTERVAL, duration_from_ms);
        ScanThrottle {
            inner: Throttle::new(interval),
        }
    }

    /// Record a trigger; returns when the pending scan is due.
    pub fn trigger(&mut self, now_ms: f64) -> f64 {
        duration_to_ms(self.inner.trigger(duration_from_ms(now_ms)))
    }

    pub fn poll(&mut self, now_ms: f64) -> bool {
        self.inner.poll(duration_from_ms(now_ms))
    }

    pub fn cancel(&mut self) -> bool {
        self.inner.cancel()
    }

    #[wasm_bindgen(getter)]
    pub fn pending(&self) -> bool {
        self.inner.is_pending()
    }
}

/// Debounced pointer target for interactive selection.
#[wasm_bindgen]
pub struct HoverDebounce {
    inner: Debounce<Element>,
}

#[wasm_bindgen]
impl HoverDebounce {
    #[wasm_bindgen(constructor)]
    pub fn new(wait_ms: Option<f64>) -> HoverDebounce {
        let wait = wait_ms.map_or(HOVER_DEBOUNCE_WAIT, duration_from_ms);
        HoverDebounce {
            inner: Debounce::new(wait),
        }
    }

    /// Record the element under the pointer; returns the new deadline.
    pub fn trigger(&mut self, now_ms: f64, target: Element) -> f64 {
        duration_to_ms(self.inner.trigger(duration_from_ms(now_ms), target))
    }

    /// The settled element once its deadline has passed.
    pub fn poll(&mut self, now_ms: f64) -> Option<Element> {
        self.inner.poll(duration_from_ms(now_ms))
    }

    pub fn cancel(&mut self) -> Option<Element> {
        self.inner.cancel()
    }
}
