//! Browser tests for the bindings. Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use diet_core::{get_best_link_block_candidate, SelectorOptions, TreeQuery};
use diet_wasm::dom::DomTree;
use diet_wasm::*;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use web_sys::Element;

wasm_bindgen_test_configure!(run_in_browser);

fn mount(html: &str) -> Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let container = document.create_element("div").unwrap();
    container.set_inner_html(html);
    document.body().unwrap().append_child(&container).unwrap();
    container
}

fn field(object: &JsValue, key: &str) -> JsValue {
    js_sys::Reflect::get(object, &key.into()).unwrap()
}

#[wasm_bindgen_test]
fn test_init_rules_and_match() {
    let result = init_rules(
        r#"[
            {"type": "pathname", "hostname": "postmates.com", "pathname": "mcdonalds"},
            {"type": "pathname", "hostname": "postmates.com", "pathname": "mcdonalds"},
            {"type": "item", "hostname": "postmates.com", "item": "soda"}
        ]"#,
    )
    .unwrap();
    assert_eq!(field(&result, "rules").as_f64(), Some(2.0));
    assert_eq!(field(&result, "deduped").as_f64(), Some(1.0));

    assert!(is_blocking_enabled_for_host("https://postmates.com/"));
    assert!(is_url_blocked("https://www.postmates.com/store/mcdonalds-main-st/abc123"));
    assert!(!is_url_blocked("not a url"));
    assert!(is_item_blocked("https://postmates.com/", Some("Sodas".into())));
    assert!(!is_item_blocked("https://postmates.com/", None));

    set_paused(true);
    assert!(!is_url_blocked("https://postmates.com/store/mcdonalds-main-st/abc123"));
    set_paused(false);

    assert!(init_rules("{not json").is_err());
}

#[wasm_bindgen_test]
fn test_pure_exports() {
    assert_eq!(normalize_url("https://www.example.com/a/?q=1#f"), "example.com/a");
    assert_eq!(
        get_candidate_id_for_url("postmates.com/store/stop-1-deli/e8UstpdqRqSITq9weojBiA"),
        Some("e8UstpdqRqSITq9weojBiA".to_string())
    );
    let deduped = dedupe_block_rules(
        r#"[{"type": "host", "hostname": "a.com"}, {"id": "x", "type": "host", "hostname": "a.com"}]"#,
    )
    .unwrap();
    assert_eq!(deduped, r#"[{"hostname":"a.com","type":"host"}]"#);
}

#[wasm_bindgen_test]
fn test_dom_tree_selection() {
    let container = mount(
        r#"<ul>
            <li id="one"><a href="https://example.com/item/abcdef1234"><span id="start">One</span></a>
                <a href="https://example.com/item/abcdef1234#reviews">Reviews</a></li>
            <li id="two"><a href="https://example.com/item/zyxwvu9876">Two</a></li>
        </ul>"#,
    );
    let tree = DomTree::new();
    let start = container.query_selector("#start").unwrap().unwrap();
    let options = SelectorOptions::new("example.com", "https://example.com/");

    let candidate = get_best_link_block_candidate(&tree, &start, &options).unwrap();
    assert_eq!(candidate.element.id(), "one");
    assert_eq!(tree.tag_name(&candidate.link), "a");

    let leaves = tree.text_leaves_within(&container);
    assert!(leaves.iter().any(|el| el.id() == "start"));
    container.remove();
}

#[wasm_bindgen_test]
fn test_schedulers() {
    let mut throttle = ScanThrottle::new(Some(100.0));
    assert_eq!(throttle.trigger(0.0), 100.0);
    assert_eq!(throttle.trigger(50.0), 100.0);
    assert!(!throttle.poll(99.0));
    assert!(throttle.poll(100.0));
    assert!(!throttle.pending());

    let a = mount("<p>a</p>");
    let b = mount("<p>b</p>");
    let mut hover = HoverDebounce::new(None);
    hover.trigger(0.0, a.clone());
    hover.trigger(10.0, b.clone());
    assert!(hover.poll(50.0).is_none());
    assert_eq!(hover.poll(60.0), Some(b.clone()));
    a.remove();
    b.remove();
}
