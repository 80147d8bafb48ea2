//! [`Driver`] implementation over a shared [`MockDom`].

use super::dom::MockDom;
use crate::driver::{Driver, ElementHandle, SearchContext};
use crate::locator::{LocatorKind, LocatorSpec};
use crate::result::{PageError, PageResult};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// In-memory driver. Clones share the same document, so a test can keep a
/// clone to mutate the DOM while a page object owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    dom: Rc<RefCell<MockDom>>,
}

impl MockDriver {
    /// Wrap a document
    #[must_use]
    pub fn new(dom: MockDom) -> Self {
        Self {
            dom: Rc::new(RefCell::new(dom)),
        }
    }

    /// Borrow the document
    #[must_use]
    pub fn dom(&self) -> Ref<'_, MockDom> {
        self.dom.borrow()
    }

    /// Mutably borrow the document
    #[must_use]
    pub fn dom_mut(&self) -> RefMut<'_, MockDom> {
        self.dom.borrow_mut()
    }

    /// Number of `find_elements` calls served so far
    #[must_use]
    pub fn find_calls(&self) -> usize {
        self.dom.borrow().find_calls
    }

    /// Append a free-form line to the call journal
    pub fn note(&self, entry: impl Into<String>) {
        self.dom.borrow_mut().journal.push(entry.into());
    }

    /// Journal of dispatched commands and notes, oldest first
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.dom.borrow().journal.clone()
    }

    /// Handle for an arena index in the current generation
    #[must_use]
    pub fn handle(&self, index: usize) -> Option<ElementHandle> {
        let dom = self.dom.borrow();
        dom.element(index)
            .map(|el| ElementHandle::new(format!("e{index}"), el.tag.clone(), dom.generation))
    }

    fn index_of(&self, handle: &ElementHandle) -> PageResult<usize> {
        let dom = self.dom.borrow();
        let stale = || PageError::StaleElement {
            handle: handle.id.clone(),
        };
        if handle.generation != dom.generation {
            return Err(stale());
        }
        let index: usize = handle
            .id
            .strip_prefix('e')
            .and_then(|n| n.parse().ok())
            .ok_or_else(stale)?;
        dom.node(index).map(|_| index).ok_or_else(stale)
    }

    fn record(&self, entry: String) {
        self.dom.borrow_mut().journal.push(entry);
    }
}

fn attribute_matches(value: Option<&str>, spec: &LocatorSpec) -> PageResult<bool> {
    match value {
        Some(value) => spec.match_kind.matches_any(&spec.terms, value),
        None => Ok(false),
    }
}

/// Minimal CSS: `*`, `tag`, `#id`, `.class`, `[attr=value]`, optionally
/// prefixed by a tag (`input[type=checkbox]`).
fn css_matches(dom: &MockDom, index: usize, selector: &str) -> bool {
    let Some(el) = dom.element(index) else {
        return false;
    };
    let split = selector
        .find(|c| matches!(c, '#' | '.' | '['))
        .unwrap_or(selector.len());
    let (tag, rest) = selector.split_at(split);
    if !tag.is_empty() && tag != "*" && !tag.eq_ignore_ascii_case(&el.tag) {
        return false;
    }
    if let Some(id) = rest.strip_prefix('#') {
        return el.attribute("id") == Some(id);
    }
    if let Some(class) = rest.strip_prefix('.') {
        return el.classes().any(|c| c == class);
    }
    if let Some(attr) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return match attr.split_once('=') {
            Some((name, value)) => {
                el.attribute(name) == Some(value.trim_matches(|c| c == '"' || c == '\''))
            }
            None => el.attribute(attr).is_some(),
        };
    }
    rest.is_empty()
}

impl Driver for MockDriver {
    fn find_elements(
        &self,
        context: &SearchContext,
        locator: &LocatorSpec,
    ) -> PageResult<Vec<ElementHandle>> {
        let start = match context {
            SearchContext::Document => 0,
            SearchContext::Element(handle) => self.index_of(handle)?,
        };
        let mut dom = self.dom.borrow_mut();
        dom.find_calls += 1;
        let dom = &*dom;

        let mut found = Vec::new();
        for index in dom.descendants(start) {
            let Some(el) = dom.element(index) else {
                continue;
            };
            let tag_ok = match (&locator.kind, &locator.tag) {
                (LocatorKind::Css, _) | (_, None) => true,
                (_, Some(tag)) => tag.eq_ignore_ascii_case(&el.tag),
            };
            if !tag_ok {
                continue;
            }
            let matched = match &locator.kind {
                LocatorKind::Id => attribute_matches(el.attribute("id"), locator)?,
                LocatorKind::Name => attribute_matches(el.attribute("name"), locator)?,
                LocatorKind::TestId => attribute_matches(el.attribute("data-testid"), locator)?,
                LocatorKind::Class => {
                    let mut any = false;
                    for class in el.classes() {
                        if locator.match_kind.matches_any(&locator.terms, class)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                LocatorKind::Css => locator.terms.iter().any(|s| css_matches(dom, index, s)),
                LocatorKind::Content => {
                    let text = dom.text_content(index);
                    locator.match_kind.matches_any(&locator.terms, text.trim())?
                }
                LocatorKind::Index => true,
                LocatorKind::XPath | LocatorKind::Custom(_) => {
                    return Err(PageError::driver(format!(
                        "MockDriver cannot evaluate {} locators",
                        locator.kind
                    )));
                }
            };
            if matched {
                found.push(ElementHandle::new(
                    format!("e{index}"),
                    el.tag.clone(),
                    dom.generation,
                ));
            }
        }
        Ok(found)
    }

    fn read_text(&self, handle: &ElementHandle) -> PageResult<String> {
        let index = self.index_of(handle)?;
        Ok(self.dom.borrow().text_content(index))
    }

    fn read_attribute(&self, handle: &ElementHandle, name: &str) -> PageResult<Option<String>> {
        let index = self.index_of(handle)?;
        Ok(self
            .dom
            .borrow()
            .element(index)
            .and_then(|el| el.attribute(name))
            .map(str::to_string))
    }

    fn is_displayed(&self, handle: &ElementHandle) -> PageResult<bool> {
        let index = self.index_of(handle)?;
        Ok(self.dom.borrow().element(index).is_some_and(|el| el.displayed))
    }

    fn is_displayed_in_viewport(&self, handle: &ElementHandle) -> PageResult<bool> {
        let index = self.index_of(handle)?;
        let dom = self.dom.borrow();
        Ok(dom.element(index).is_some_and(|el| {
            el.displayed
                && el.top < dom.scroll_y + dom.viewport_height
                && el.top + el.height > dom.scroll_y
        }))
    }

    fn dispatch_click(&self, handle: &ElementHandle) -> PageResult<()> {
        let index = self.index_of(handle)?;
        {
            let mut dom = self.dom.borrow_mut();
            let node = dom.node_mut(index).ok_or_else(|| PageError::StaleElement {
                handle: handle.id.clone(),
            })?;
            if node.element.attribute("disabled").is_some() {
                return Err(PageError::driver(format!("{handle} is disabled")));
            }
            node.clicks += 1;
            if node.element.attribute("type") == Some("checkbox") {
                if node.element.attributes.remove("checked").is_none() {
                    let _ = node
                        .element
                        .attributes
                        .insert("checked".into(), "checked".into());
                }
            }
        }
        self.record(format!("click {}", handle.id));
        Ok(())
    }

    fn dispatch_set_value(&self, handle: &ElementHandle, value: &str) -> PageResult<()> {
        let index = self.index_of(handle)?;
        {
            let mut dom = self.dom.borrow_mut();
            let el = dom.element_mut(index).ok_or_else(|| PageError::StaleElement {
                handle: handle.id.clone(),
            })?;
            if el.attribute("readonly").is_some() || el.attribute("disabled").is_some() {
                return Err(PageError::driver(format!("{handle} is not editable")));
            }
            let _ = el.attributes.insert("value".into(), value.to_string());
        }
        self.record(format!("set_value {} {value}", handle.id));
        Ok(())
    }

    fn dispatch_scroll_into_view(&self, handle: &ElementHandle) -> PageResult<()> {
        let index = self.index_of(handle)?;
        {
            let mut dom = self.dom.borrow_mut();
            let top = dom.element(index).map_or(0, |el| el.top);
            let max = (dom.page_height() - dom.viewport_height).max(0);
            dom.scroll_y = top.clamp(0, max);
        }
        self.record(format!("scroll_into_view {}", handle.id));
        Ok(())
    }

    fn dispatch_scroll_by(&self, dx: i64, dy: i64) -> PageResult<()> {
        {
            let mut dom = self.dom.borrow_mut();
            let max = (dom.page_height() - dom.viewport_height).max(0);
            dom.scroll_y = (dom.scroll_y + dy).clamp(0, max);
        }
        self.record(format!("scroll_by {dx} {dy}"));
        Ok(())
    }

    fn document_generation(&self) -> u64 {
        self.dom.borrow().generation
    }

    fn navigate(&self, url: &str) -> PageResult<()> {
        {
            let mut dom = self.dom.borrow_mut();
            dom.url = url.to_string();
            dom.scroll_y = 0;
            dom.bump_generation();
        }
        self.record(format!("navigate {url}"));
        Ok(())
    }

    fn current_url(&self) -> PageResult<String> {
        Ok(self.dom.borrow().url.clone())
    }

    fn title(&self) -> PageResult<String> {
        Ok(self.dom.borrow().title.clone())
    }
}
