//! Driver - Abstract Browser Automation Surface
//!
//! Everything pagescope knows about the browser goes through [`Driver`].
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  PageObject (component tree, triggers, verification)          │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Driver (trait)                                               │
//! │   ├── find_elements(context, locator)                         │
//! │   ├── read_text / read_attribute / is_displayed[_in_viewport] │
//! │   └── dispatch_click / set_value / scroll_into_view / by      │
//! ├───────────────────────────────────────────────────────────────┤
//! │  MockDriver (in-memory DOM)  │  your WebDriver/CDP adapter    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Calls are synchronous and the driver is not shared across threads. A
//! missing element is signalled with `PageError::ElementNotFound` or
//! `PageError::StaleElement`, never with a `false` boolean.

use crate::locator::LocatorSpec;
use crate::result::PageResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a located DOM element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Document generation the element was found in
    pub generation: u64,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>, generation: u64) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            generation,
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.tag_name, self.id)
    }
}

/// Where a locator search starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchContext {
    /// The whole document of the current frame
    Document,
    /// Descendants of an element
    Element(ElementHandle),
}

impl SearchContext {
    /// Element handle, if scoped to one
    #[must_use]
    pub const fn element(&self) -> Option<&ElementHandle> {
        match self {
            Self::Document => None,
            Self::Element(handle) => Some(handle),
        }
    }
}

/// Browser automation surface consumed by the core
pub trait Driver: fmt::Debug {
    /// All elements under `context` matching `locator`, in document order
    fn find_elements(
        &self,
        context: &SearchContext,
        locator: &LocatorSpec,
    ) -> PageResult<Vec<ElementHandle>>;

    /// Visible text of the element
    fn read_text(&self, handle: &ElementHandle) -> PageResult<String>;

    /// Attribute value, `None` when absent
    fn read_attribute(&self, handle: &ElementHandle, name: &str) -> PageResult<Option<String>>;

    /// Whether the element is rendered
    fn is_displayed(&self, handle: &ElementHandle) -> PageResult<bool>;

    /// Whether the element is rendered inside the current viewport
    fn is_displayed_in_viewport(&self, handle: &ElementHandle) -> PageResult<bool>;

    /// Click the element
    fn dispatch_click(&self, handle: &ElementHandle) -> PageResult<()>;

    /// Replace the element's value
    fn dispatch_set_value(&self, handle: &ElementHandle, value: &str) -> PageResult<()>;

    /// Scroll the element into the viewport
    fn dispatch_scroll_into_view(&self, handle: &ElementHandle) -> PageResult<()>;

    /// Scroll the viewport by a pixel offset
    fn dispatch_scroll_by(&self, dx: i64, dy: i64) -> PageResult<()>;

    /// Token that changes on every navigation or document replacement
    fn document_generation(&self) -> u64;

    /// Load a URL in the current tab
    fn navigate(&self, url: &str) -> PageResult<()>;

    /// URL of the current document
    fn current_url(&self) -> PageResult<String>;

    /// Title of the current document
    fn title(&self) -> PageResult<String>;
}
