//! Read-only document tree access.
//!
//! Candidate selection and page scanning only need a handful of queries, so
//! they are written against this trait instead of a concrete DOM. The browser
//! binding implements it over live elements; [`crate::html::HtmlTree`]
//! implements it over parsed HTML.

/// Queries over an element tree.
pub trait TreeQuery {
    /// Handle to an element. Cheap to clone; equality is node identity.
    type Node: Clone + PartialEq;

    /// Every `<a>` element in `node`'s subtree in document order, `node` itself first if it is one.
    fn anchors_within(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// The parent element, `None` at the root.
    fn parent_of(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Whether `node` is the document `<body>`.
    fn is_body(&self, node: &Self::Node) -> bool;

    /// Absolute, resolved `href` of an anchor.
    fn href(&self, anchor: &Self::Node) -> Option<String>;

    /// Lowercase tag name.
    fn tag_name(&self, node: &Self::Node) -> String;

    /// Text of the element's own subtree, if it has any.
    fn own_text(&self, node: &Self::Node) -> Option<String>;

    /// Elements in `node`'s subtree (inclusive) that have text but no child
    /// elements, excluding script and style content.
    fn text_leaves_within(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Nearest inclusive ancestor with the given tag name.
    fn closest(&self, node: &Self::Node, tag: &str) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.tag_name(&candidate) == tag {
                return Some(candidate);
            }
            current = self.parent_of(&candidate);
        }
        None
    }
}
