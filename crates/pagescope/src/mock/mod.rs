//! Mock Driver Module
//!
//! An in-memory document and a [`Driver`](crate::Driver) over it, so page
//! objects, triggers and verifications can be exercised without a browser.
//!
//! ## Example
//!
//! ```rust
//! use pagescope::mock::{MockDom, MockDriver, MockElement};
//! use pagescope::Driver;
//!
//! let mut dom = MockDom::new();
//! let form = dom.append(dom.root(), MockElement::new("form").id("login"));
//! let _ = dom.append(form, MockElement::new("input").name("email"));
//!
//! let driver = MockDriver::new(dom);
//! let handle = driver.clone(); // shares the same document
//! handle.dom_mut().set_title("Sign In");
//! assert_eq!(driver.title().unwrap(), "Sign In");
//! ```

mod dom;
mod driver;

pub use dom::{MockDom, MockElement, DEFAULT_ELEMENT_HEIGHT, DEFAULT_VIEWPORT_HEIGHT};
pub use driver::MockDriver;
