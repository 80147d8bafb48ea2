//! Pagescope: Page-Object Components for UI Test Automation
//!
//! Pagescope models a page under test as a tree of components. Each
//! component declares how to find itself relative to its parent, which
//! lifecycle triggers run around its operations, how its value is read and
//! written, and how expectations about it are verified by polling.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      PAGESCOPE Architecture                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐           │
//! │  │ ComponentSpec│──►│ PageObject   │──►│ Scope        │           │
//! │  │ (FindBy,     │   │ (arena tree, │   │ strategies   │──► Driver │
//! │  │  triggers)   │   │  caches)     │   │ + filters    │           │
//! │  └─────────────┘   └──────┬───────┘   └──────────────┘           │
//! │                           │                                       │
//! │            ┌──────────────┼───────────────┐                      │
//! │            ▼              ▼               ▼                      │
//! │     ┌────────────┐ ┌────────────┐  ┌──────────────┐              │
//! │     │ Triggers   │ │ DataProvider│  │ Verification │──► Clock     │
//! │     │ (priority) │ │ (get/set)   │  │ (poll loop)  │              │
//! │     └────────────┘ └────────────┘  └──────────────┘              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use pagescope::mock::{MockDom, MockDriver, MockElement};
//! use pagescope::{ComponentSpec, FindBy, ManualClock, PageObject};
//!
//! let mut dom = MockDom::new();
//! let form = dom.append(dom.root(), MockElement::new("form").id("login"));
//! let _ = dom.append(form, MockElement::new("button").class("submit").text("Sign In"));
//!
//! let mut page = PageObject::builder("Sign In", MockDriver::new(dom))
//!     .clock(ManualClock::new())
//!     .build();
//! let login = page
//!     .add_component(page.root(), ComponentSpec::new("Login", "Form").find(FindBy::id("login")))
//!     .unwrap();
//! let submit = page
//!     .add_component(login, ComponentSpec::new("Submit", "Button").find(FindBy::class("submit")))
//!     .unwrap();
//!
//! page.init().unwrap();
//! page.should(submit).equal("Sign In").unwrap().click().unwrap();
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod clock;
mod config;
mod control;
mod data;
mod driver;
mod locator;
mod log;
mod metadata;
mod page;
mod result;
mod term;

/// Component nodes and cached scopes
pub mod component;

/// Lifecycle triggers: event masks, priorities, behaviors and built-ins
pub mod trigger;

/// Polling verification engine
pub mod verify;

/// In-memory driver for tests and examples
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock;

pub use clock::{Clock, ManualClock, SystemClock};
pub use component::{CachedScope, UiComponent};
pub use config::{
    MultipleMatchPolicy, PageConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_VERIFY_TIMEOUT_MS,
};
pub use control::{Control, EditableField, Field};
pub use data::{
    CheckboxSetter, DataProvider, DataSource, DispatchSetValue, FieldValue, RandomKind,
    RandomizeSettings, Randomizer, StdRandomizer, ValueSetter,
};
pub use driver::{Driver, ElementHandle, SearchContext};
pub use locator::{
    ContentFilter, ContentStrategy, DriverQueryStrategy, LocatorKind, LocatorSpec, ScopeFilter,
    ScopeLocateStrategy, StrategyRegistry, TagStrategy, Visibility,
};
pub use log::{LogEntry, LogSection, LogSink, NoopLogSink, RecordingLogSink, TracingLogSink};
pub use metadata::{Attribute, ComponentId, ComponentMetadata, ComponentSpec, FindBy, MetadataBuilder};
pub use page::{PageObject, PageObjectBuilder};
pub use result::{PageError, PageResult};
pub use term::{CompiledMatch, MatchKind, TermFormat};
pub use trigger::{
    Priority, ScrollDown, ScrollIntoView, ScrollUp, TriggerAttribute, TriggerBehavior,
    TriggerBinding, TriggerContext, TriggerEvent, TriggerEvents, TriggerId, VerifyHeading,
    VerifyTitle,
};
pub use verify::{
    verify, Condition, FailureKind, Should, Subject, VerificationFailure, VerificationOutcome,
    VerificationPass, VerificationRequest,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::clock::*;
    pub use super::component::*;
    pub use super::config::*;
    pub use super::control::*;
    pub use super::data::*;
    pub use super::driver::*;
    pub use super::locator::*;
    pub use super::log::*;
    pub use super::metadata::*;
    pub use super::page::*;
    pub use super::result::*;
    pub use super::term::*;
    pub use super::trigger::*;
    pub use super::verify::*;
}

/// Pagescope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
