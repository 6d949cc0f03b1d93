//! [`TreeQuery`] over live DOM elements.

use diet_core::tree::TreeQuery;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlAnchorElement, NodeList};

const NON_TEXT_TAGS: [&str; 4] = ["script", "style", "template", "noscript"];

/// The page's element tree. Element equality is node identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomTree;

impl DomTree {
    pub fn new() -> Self {
        Self
    }
}

fn elements(list: Result<NodeList, wasm_bindgen::JsValue>) -> Vec<Element> {
    let Ok(list) = list else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

impl TreeQuery for DomTree {
    type Node = Element;

    fn anchors_within(&self, node: &Element) -> Vec<Element> {
        let mut anchors = Vec::new();
        if self.tag_name(node) == "a" {
            anchors.push(node.clone());
        }
        anchors.extend(elements(node.query_selector_all("a")));
        anchors
    }

    fn parent_of(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn is_body(&self, node: &Element) -> bool {
        self.tag_name(node) == "body"
    }

    fn href(&self, anchor: &Element) -> Option<String> {
        anchor.get_attribute("href")?;
        // The property form is already resolved against the document base.
        let href = anchor.dyn_ref::<HtmlAnchorElement>()?.href();
        (!href.is_empty()).then_some(href)
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_ascii_lowercase()
    }

    fn own_text(&self, node: &Element) -> Option<String> {
        node.text_content().filter(|text| !text.trim().is_empty())
    }

    fn text_leaves_within(&self, node: &Element) -> Vec<Element> {
        std::iter::once(node.clone())
            .chain(elements(node.query_selector_all("*")))
            .filter(|el| el.child_element_count() == 0)
            .filter(|el| !NON_TEXT_TAGS.contains(&self.tag_name(el).as_str()))
            .filter(|el| self.own_text(el).is_some())
            .collect()
    }
}
