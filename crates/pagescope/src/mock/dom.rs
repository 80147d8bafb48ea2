//! In-memory document backing [`MockDriver`](super::MockDriver).
//!
//! Elements live in an arena; index 0 is the `<html>` root. Removing an
//! element leaves a tombstone so that handles pointing at it go stale
//! instead of aliasing a newer element.

use std::collections::BTreeMap;

/// Default viewport height in pixels
pub const DEFAULT_VIEWPORT_HEIGHT: i64 = 600;

/// Default element height in pixels
pub const DEFAULT_ELEMENT_HEIGHT: i64 = 20;

/// Declarative description of a mock element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Tag name
    pub tag: String,
    /// Attributes (including `id`, `class`, `value`)
    pub attributes: BTreeMap<String, String>,
    /// Own text (children's text is appended when read)
    pub text: String,
    /// Whether the element is rendered
    pub displayed: bool,
    /// Vertical position of the top edge
    pub top: i64,
    /// Rendered height
    pub height: i64,
}

impl MockElement {
    /// Create a displayed element at the top of the page
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            text: String::new(),
            displayed: true,
            top: 0,
            height: DEFAULT_ELEMENT_HEIGHT,
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Set the `class` attribute
    #[must_use]
    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    /// Set the `name` attribute
    #[must_use]
    pub fn name(self, name: impl Into<String>) -> Self {
        self.attr("name", name)
    }

    /// Set the `value` attribute
    #[must_use]
    pub fn value(self, value: impl Into<String>) -> Self {
        self.attr("value", value)
    }

    /// Set own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Mark as not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Place the element at a vertical offset
    #[must_use]
    pub const fn at(mut self, top: i64) -> Self {
        self.top = top;
        self
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whitespace-separated class tokens
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .unwrap_or_default()
            .split_whitespace()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) element: MockElement,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) clicks: usize,
}

/// Mutable in-memory document
#[derive(Debug, Clone)]
pub struct MockDom {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) generation: u64,
    pub(crate) url: String,
    pub(crate) title: String,
    pub(crate) scroll_y: i64,
    pub(crate) viewport_height: i64,
    pub(crate) journal: Vec<String>,
    pub(crate) find_calls: usize,
}

impl Default for MockDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDom {
    /// Empty document containing only `<html>`
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                element: MockElement::new("html"),
                parent: None,
                children: Vec::new(),
                clicks: 0,
            })],
            generation: 0,
            url: "about:blank".to_string(),
            title: String::new(),
            scroll_y: 0,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            journal: Vec::new(),
            find_calls: 0,
        }
    }

    /// Index of the `<html>` root
    #[must_use]
    pub const fn root(&self) -> usize {
        0
    }

    /// Append `element` as the last child of `parent`, returning its index
    ///
    /// # Panics
    ///
    /// Panics if `parent` was removed or never existed.
    pub fn append(&mut self, parent: usize, element: MockElement) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Some(Node {
            element,
            parent: Some(parent),
            children: Vec::new(),
            clicks: 0,
        }));
        self.node_mut(parent)
            .unwrap_or_else(|| panic!("mock parent {parent} does not exist"))
            .children
            .push(index);
        index
    }

    /// Detach an element and its subtree
    pub fn remove(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index).and_then(Option::take) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|&c| c != index);
        }
        for child in node.children {
            self.remove(child);
        }
    }

    /// Element at `index`, if attached
    #[must_use]
    pub fn element(&self, index: usize) -> Option<&MockElement> {
        self.node(index).map(|n| &n.element)
    }

    /// Mutable element at `index`, if attached
    pub fn element_mut(&mut self, index: usize) -> Option<&mut MockElement> {
        self.node_mut(index).map(|n| &mut n.element)
    }

    /// Replace own text
    pub fn set_text(&mut self, index: usize, text: impl Into<String>) {
        if let Some(el) = self.element_mut(index) {
            el.text = text.into();
        }
    }

    /// Set or overwrite an attribute
    pub fn set_attribute(&mut self, index: usize, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(index) {
            let _ = el.attributes.insert(name.to_string(), value.into());
        }
    }

    /// Remove an attribute
    pub fn remove_attribute(&mut self, index: usize, name: &str) {
        if let Some(el) = self.element_mut(index) {
            let _ = el.attributes.remove(name);
        }
    }

    /// Show or hide an element
    pub fn set_displayed(&mut self, index: usize, displayed: bool) {
        if let Some(el) = self.element_mut(index) {
            el.displayed = displayed;
        }
    }

    /// First attached element whose `id` attribute equals `id`
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        self.nodes.iter().enumerate().find_map(|(i, n)| {
            n.as_ref()
                .filter(|n| n.element.attribute("id") == Some(id))
                .map(|_| i)
        })
    }

    /// Invalidate every outstanding handle, as a navigation would
    pub fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Set the document title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Set the viewport height
    pub fn set_viewport_height(&mut self, height: i64) {
        self.viewport_height = height;
    }

    /// Current scroll offset
    #[must_use]
    pub const fn scroll_y(&self) -> i64 {
        self.scroll_y
    }

    /// Number of clicks dispatched to `index`
    #[must_use]
    pub fn clicks(&self, index: usize) -> usize {
        self.node(index).map_or(0, |n| n.clicks)
    }

    /// Text content: own text followed by descendants' text
    #[must_use]
    pub fn text_content(&self, index: usize) -> String {
        let Some(node) = self.node(index) else {
            return String::new();
        };
        let mut text = node.element.text.clone();
        for &child in &node.children {
            text.push_str(&self.text_content(child));
        }
        text
    }

    /// Attached descendants of `index` in document order (excluding itself)
    #[must_use]
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if let Some(node) = self.node(index) {
            for &child in &node.children {
                out.push(child);
                out.extend(self.descendants(child));
            }
        }
        out
    }

    pub(crate) fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index).and_then(Option::as_mut)
    }

    pub(crate) fn page_height(&self) -> i64 {
        self.nodes
            .iter()
            .flatten()
            .map(|n| n.element.top + n.element.height)
            .max()
            .unwrap_or(0)
    }
}
