//! Fluent component handles.
//!
//! Handles borrow the page mutably and return themselves from actions so
//! calls chain:
//!
//! ```
//! use pagescope::mock::{MockDom, MockDriver, MockElement};
//! use pagescope::{ComponentSpec, DataSource, FindBy, ManualClock, PageObject};
//!
//! let mut dom = MockDom::new();
//! let _ = dom.append(dom.root(), MockElement::new("input").id("query"));
//! let mut page = PageObject::builder("Search", MockDriver::new(dom))
//!     .clock(ManualClock::new())
//!     .build();
//! let query = page
//!     .add_component(page.root(), ComponentSpec::new("Query", "TextInput")
//!         .find(FindBy::id("query"))
//!         .source(DataSource::Value))
//!     .unwrap();
//!
//! page.editable::<String>(query)
//!     .set("rust")
//!     .unwrap()
//!     .should()
//!     .equal("rust")
//!     .unwrap();
//! ```

use crate::data::{DataProvider, DataSource, FieldValue};
use crate::metadata::ComponentId;
use crate::page::PageObject;
use crate::result::PageResult;
use crate::verify::Should;

/// Fluent handle on a component
#[derive(Debug)]
pub struct Control<'p> {
    page: &'p mut PageObject,
    id: ComponentId,
}

impl<'p> Control<'p> {
    pub(crate) fn new(page: &'p mut PageObject, id: ComponentId) -> Self {
        Self { page, id }
    }

    /// Component id
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Click
    pub fn click(self) -> PageResult<Self> {
        self.page.click(self.id)?;
        Ok(self)
    }

    /// Scroll into the viewport
    pub fn scroll_into_view(self) -> PageResult<Self> {
        self.page.scroll_into_view(self.id)?;
        Ok(self)
    }

    /// Whether the component's locator matches an element
    pub fn exists(&mut self) -> PageResult<bool> {
        self.page.exists(self.id)
    }

    /// Whether the component is rendered
    pub fn is_visible(&mut self) -> PageResult<bool> {
        self.page.is_visible(self.id)
    }

    /// Whether the component is enabled
    pub fn is_enabled(&mut self) -> PageResult<bool> {
        self.page.is_enabled(self.id)
    }

    /// Trimmed text content
    pub fn content(&mut self) -> PageResult<String> {
        self.page.content(self.id)
    }

    /// Attribute value
    pub fn attribute(&mut self, name: &str) -> PageResult<Option<String>> {
        self.page.attribute(self.id, name)
    }

    /// Start a verification of this component
    pub fn should(self) -> Should<'p> {
        Should::new(self.page, self.id)
    }

    /// Typed read access to this component
    pub fn field<T: FieldValue>(self) -> Field<'p, T> {
        Field::new(self.page, self.id)
    }

    /// Give the page back
    pub fn page(self) -> &'p mut PageObject {
        self.page
    }
}

/// Typed read-only value handle
#[derive(Debug)]
pub struct Field<'p, T> {
    page: &'p mut PageObject,
    provider: DataProvider<T>,
}

impl<'p, T: FieldValue> Field<'p, T> {
    pub(crate) fn new(page: &'p mut PageObject, id: ComponentId) -> Self {
        Self {
            page,
            provider: DataProvider::new(id),
        }
    }

    /// Read through an explicit source instead of the declared one
    #[must_use]
    pub fn from_source(mut self, source: DataSource) -> Self {
        self.provider = DataProvider::with_source(self.provider.component(), source);
        self
    }

    /// Current value
    pub fn get(&mut self) -> PageResult<T> {
        self.provider.get(self.page)
    }

    /// Store the current value in `out` and keep chaining
    pub fn get_into(mut self, out: &mut T) -> PageResult<Self> {
        *out = self.get()?;
        Ok(self)
    }

    /// Start a verification of this value
    pub fn should(self) -> Should<'p> {
        let component = self.provider.component();
        let source = self.provider.source(self.page);
        let should = Should::new(self.page, component);
        match source {
            Ok(source) => should.from_source(source),
            Err(_) => should,
        }
    }

    /// Untyped handle on the same component
    pub fn control(self) -> Control<'p> {
        Control::new(self.page, self.provider.component())
    }
}

/// Typed read/write value handle
#[derive(Debug)]
pub struct EditableField<'p, T> {
    inner: Field<'p, T>,
}

impl<'p, T: FieldValue> EditableField<'p, T> {
    pub(crate) fn new(page: &'p mut PageObject, id: ComponentId) -> Self {
        Self {
            inner: Field::new(page, id),
        }
    }

    /// Current value
    pub fn get(&mut self) -> PageResult<T> {
        self.inner.get()
    }

    /// Write a value
    pub fn set(self, value: impl Into<T>) -> PageResult<Self> {
        self.inner.provider.set(self.inner.page, &value.into())?;
        Ok(self)
    }

    /// Write a generated value and return it
    pub fn set_random(&mut self) -> PageResult<T> {
        self.inner.provider.set_random(self.inner.page)
    }

    /// Write a generated value, hand it to `inspect` and keep chaining
    pub fn set_random_with(mut self, inspect: impl FnOnce(&T)) -> PageResult<Self> {
        let value = self.set_random()?;
        inspect(&value);
        Ok(self)
    }

    /// Whether the element refuses writes
    pub fn is_read_only(&mut self) -> PageResult<bool> {
        let id = self.inner.provider.component();
        self.inner.page.is_read_only(id)
    }

    /// Start a verification of this value
    pub fn should(self) -> Should<'p> {
        self.inner.should()
    }

    /// Untyped handle on the same component
    pub fn control(self) -> Control<'p> {
        self.inner.control()
    }
}
