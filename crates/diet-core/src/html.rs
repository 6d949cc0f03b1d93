//! [`TreeQuery`] over parsed HTML.
//!
//! Used for offline pages (the CLI) and for fixture tests. Relative hrefs are
//! resolved against the document URL the same way a browser resolves
//! `HTMLAnchorElement.href`.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::tree::TreeQuery;

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("body selector"));

const NON_TEXT_TAGS: [&str; 4] = ["script", "style", "template", "noscript"];

/// Errors from loading an HTML document.
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    #[error("invalid document url: {0}")]
    DocumentUrl(#[from] url::ParseError),

    #[error("invalid selector {selector:?}")]
    Selector { selector: String },
}

/// A parsed document and the URL it was loaded from.
pub struct HtmlDocument {
    html: Html,
    url: Url,
}

impl HtmlDocument {
    pub fn parse(source: &str, document_url: &str) -> Result<Self, HtmlError> {
        Ok(Self {
            html: Html::parse_document(source),
            url: Url::parse(document_url)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// A query view over this document.
    pub fn tree(&self) -> HtmlTree<'_> {
        HtmlTree {
            html: &self.html,
            base: &self.url,
        }
    }

    /// The `<body>` element. Parsing always synthesizes one.
    pub fn body(&self) -> Option<ElementRef<'_>> {
        self.html.select(&BODY).next()
    }

    /// First element matching a CSS selector.
    pub fn select_first(&self, css: &str) -> Result<Option<ElementRef<'_>>, HtmlError> {
        let selector = Selector::parse(css).map_err(|_| HtmlError::Selector {
            selector: css.to_string(),
        })?;
        Ok(self.html.select(&selector).next())
    }

    /// First element child of `<body>`, the usual starting point for fixtures.
    pub fn first_body_child(&self) -> Option<ElementRef<'_>> {
        self.body()?.children().find_map(ElementRef::wrap)
    }
}

/// Borrowed view implementing [`TreeQuery`] with `scraper` element handles.
#[derive(Clone, Copy)]
pub struct HtmlTree<'a> {
    html: &'a Html,
    base: &'a Url,
}

impl<'a> HtmlTree<'a> {
    pub fn root(&self) -> ElementRef<'a> {
        self.html.root_element()
    }
}

impl<'a> TreeQuery for HtmlTree<'a> {
    type Node = ElementRef<'a>;

    fn anchors_within(&self, node: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
        node.descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "a")
            .collect()
    }

    fn parent_of(&self, node: &ElementRef<'a>) -> Option<ElementRef<'a>> {
        node.parent().and_then(ElementRef::wrap)
    }

    fn is_body(&self, node: &ElementRef<'a>) -> bool {
        node.value().name() == "body"
    }

    fn href(&self, anchor: &ElementRef<'a>) -> Option<String> {
        let href = anchor.value().attr("href")?;
        self.base.join(href.trim()).ok().map(String::from)
    }

    fn tag_name(&self, node: &ElementRef<'a>) -> String {
        node.value().name().to_ascii_lowercase()
    }

    fn own_text(&self, node: &ElementRef<'a>) -> Option<String> {
        let text: String = node.text().collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn text_leaves_within(&self, node: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
        node.descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| !NON_TEXT_TAGS.contains(&el.value().name()))
            .filter(|el| !el.children().any(|child| child.value().is_element()))
            .filter(|el| el.text().any(|piece| !piece.trim().is_empty()))
            .collect()
    }
}
