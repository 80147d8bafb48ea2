//! Trigger pipeline.
//!
//! Triggers are behaviors bound to lifecycle events of a component. Firing an
//! event runs every binding whose mask contains it, ordered by priority and
//! then by declaration order. The first failure aborts the batch.
//!
//! ```text
//!   get()   ── BeforeGet ─┬─ BeforeAccess ── resolve + read ── AfterAccess ─┬─ AfterGet
//!   set(v)  ── BeforeSet ─┤  (log section)                                  ├─ AfterSet
//!   click() ── BeforeClick┘                                                 └─ AfterClick
//! ```
//!
//! A trigger may access components itself. Re-firing the same event on the
//! same component while it is already firing is skipped.

use crate::data::DataSource;
use crate::metadata::{ComponentId, ComponentSpec, FindBy};
use crate::page::PageObject;
use crate::result::{PageError, PageResult};
use crate::term::{MatchKind, TermFormat};
use crate::verify::VerificationRequest;
use bitflags::bitflags;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

bitflags! {
    /// Set of lifecycle events a trigger is bound to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TriggerEvents: u16 {
        /// After the component is first constructed
        const INIT = 1 << 0;
        /// On teardown
        const DE_INIT = 1 << 1;
        /// Before any scope-touching operation
        const BEFORE_ACCESS = 1 << 2;
        /// After any scope-touching operation
        const AFTER_ACCESS = 1 << 3;
        /// Before a value read
        const BEFORE_GET = 1 << 4;
        /// After a value read
        const AFTER_GET = 1 << 5;
        /// Before a value write
        const BEFORE_SET = 1 << 6;
        /// After a value write
        const AFTER_SET = 1 << 7;
        /// Before a click
        const BEFORE_CLICK = 1 << 8;
        /// After a click
        const AFTER_CLICK = 1 << 9;
        /// Before any interaction that changes state
        const BEFORE_ACTION = Self::BEFORE_SET.bits() | Self::BEFORE_CLICK.bits();
    }
}

impl Default for TriggerEvents {
    fn default() -> Self {
        Self::empty()
    }
}

impl TriggerEvents {
    /// Whether `event` is part of the mask
    #[must_use]
    pub const fn has(self, event: TriggerEvent) -> bool {
        self.contains(event.mask())
    }
}

/// A single lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    /// After first construction
    Init,
    /// Teardown
    DeInit,
    /// Before a scope-touching operation
    BeforeAccess,
    /// After a scope-touching operation
    AfterAccess,
    /// Before a value read
    BeforeGet,
    /// After a value read
    AfterGet,
    /// Before a value write
    BeforeSet,
    /// After a value write
    AfterSet,
    /// Before a click
    BeforeClick,
    /// After a click
    AfterClick,
}

impl TriggerEvent {
    /// Single-bit mask for this event
    #[must_use]
    pub const fn mask(self) -> TriggerEvents {
        match self {
            Self::Init => TriggerEvents::INIT,
            Self::DeInit => TriggerEvents::DE_INIT,
            Self::BeforeAccess => TriggerEvents::BEFORE_ACCESS,
            Self::AfterAccess => TriggerEvents::AFTER_ACCESS,
            Self::BeforeGet => TriggerEvents::BEFORE_GET,
            Self::AfterGet => TriggerEvents::AFTER_GET,
            Self::BeforeSet => TriggerEvents::BEFORE_SET,
            Self::AfterSet => TriggerEvents::AFTER_SET,
            Self::BeforeClick => TriggerEvents::BEFORE_CLICK,
            Self::AfterClick => TriggerEvents::AFTER_CLICK,
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Firing order key; lower fires first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    /// Fires before everything else
    pub const HIGHEST: Self = Self(0);
    /// Second tier
    pub const HIGHER: Self = Self(1);
    /// Third tier
    pub const HIGH: Self = Self(2);
    /// Default tier
    pub const MEDIUM: Self = Self(3);
    /// Fifth tier
    pub const LOW: Self = Self(4);
    /// Sixth tier
    pub const LOWER: Self = Self(5);
    /// Fires after everything else
    pub const LOWEST: Self = Self(6);
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

/// Data handed to a firing trigger
#[derive(Debug)]
pub struct TriggerContext<'p> {
    /// Page owning the component
    pub page: &'p mut PageObject,
    /// Component the trigger is bound to
    pub component: ComponentId,
    /// Event being fired
    pub event: TriggerEvent,
    /// Raw value being written, for set events
    pub payload: Option<String>,
}

/// Behavior executed when a bound event fires
pub trait TriggerBehavior: fmt::Debug {
    /// Run the behavior
    fn execute(&self, ctx: &mut TriggerContext<'_>) -> PageResult<()>;

    /// Name for diagnostics
    fn name(&self) -> String;
}

/// Declarative trigger: events, priority and behavior
#[derive(Debug, Clone)]
pub struct TriggerAttribute {
    /// Events the trigger fires on
    pub events: TriggerEvents,
    /// Firing order key
    pub priority: Priority,
    /// Behavior to execute
    pub behavior: Rc<dyn TriggerBehavior>,
}

impl TriggerAttribute {
    /// Bind a behavior to events with medium priority
    pub fn new(events: TriggerEvents, behavior: impl TriggerBehavior + 'static) -> Self {
        Self {
            events,
            priority: Priority::default(),
            behavior: Rc::new(behavior),
        }
    }

    /// Set the priority
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Identity of an attached trigger, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(pub(crate) u64);

/// A trigger attached to a component
#[derive(Debug, Clone)]
pub struct TriggerBinding {
    /// Identity
    pub id: TriggerId,
    /// Declaration
    pub attribute: TriggerAttribute,
    /// Declaration order on the owning component
    pub sequence: u64,
}

/// Fire `event` on `component`. See the module docs for ordering rules.
pub(crate) fn fire(
    page: &mut PageObject,
    component: ComponentId,
    event: TriggerEvent,
    payload: Option<&str>,
) -> PageResult<()> {
    if page.is_firing(component, event) {
        tracing::trace!(%component, %event, "skipping re-entrant trigger firing");
        return Ok(());
    }

    let mut bindings: Vec<TriggerBinding> = page
        .node(component)?
        .triggers
        .iter()
        .filter(|b| b.attribute.events.has(event))
        .cloned()
        .collect();
    if bindings.is_empty() {
        return Ok(());
    }
    bindings.sort_by_key(|b| (b.attribute.priority, b.sequence));

    let owner = page.metadata(component)?.display_name();
    page.push_firing(component, event);
    let mut outcome = Ok(());
    for binding in bindings {
        let behavior = Rc::clone(&binding.attribute.behavior);
        tracing::debug!(%component, %event, trigger = %behavior.name(), "executing trigger");
        let mut ctx = TriggerContext {
            page: &mut *page,
            component,
            event,
            payload: payload.map(str::to_string),
        };
        if let Err(source) = behavior.execute(&mut ctx) {
            outcome = Err(PageError::TriggerFailure {
                trigger: behavior.name(),
                event,
                component: owner,
                source: Box::new(source),
            });
            break;
        }
    }
    page.pop_firing();
    outcome
}

/// Scrolls the component into the viewport
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollIntoView;

impl TriggerBehavior for ScrollIntoView {
    fn execute(&self, ctx: &mut TriggerContext<'_>) -> PageResult<()> {
        ctx.page
            .with_scope(ctx.component, |driver, handle| driver.dispatch_scroll_into_view(handle))
    }

    fn name(&self) -> String {
        "scroll into view".to_string()
    }
}

/// Distance used by [`ScrollDown`]/[`ScrollUp`] to reach the page edge
pub const SCROLL_TO_EDGE: i64 = 1_000_000;

/// Scrolls the viewport down
#[derive(Debug, Clone, Copy)]
pub struct ScrollDown {
    /// Pixels to scroll
    pub pixels: i64,
}

impl ScrollDown {
    /// Scroll to the bottom of the page
    #[must_use]
    pub const fn to_bottom() -> Self {
        Self {
            pixels: SCROLL_TO_EDGE,
        }
    }

    /// Scroll by a fixed amount
    #[must_use]
    pub const fn by(pixels: i64) -> Self {
        Self { pixels }
    }
}

impl TriggerBehavior for ScrollDown {
    fn execute(&self, ctx: &mut TriggerContext<'_>) -> PageResult<()> {
        ctx.page.driver().dispatch_scroll_by(0, self.pixels)
    }

    fn name(&self) -> String {
        format!("scroll down {}px", self.pixels)
    }
}

/// Scrolls the viewport up
#[derive(Debug, Clone, Copy)]
pub struct ScrollUp {
    /// Pixels to scroll
    pub pixels: i64,
}

impl ScrollUp {
    /// Scroll to the top of the page
    #[must_use]
    pub const fn to_top() -> Self {
        Self {
            pixels: SCROLL_TO_EDGE,
        }
    }

    /// Scroll by a fixed amount
    #[must_use]
    pub const fn by(pixels: i64) -> Self {
        Self { pixels }
    }
}

impl TriggerBehavior for ScrollUp {
    fn execute(&self, ctx: &mut TriggerContext<'_>) -> PageResult<()> {
        ctx.page.driver().dispatch_scroll_by(0, -self.pixels)
    }

    fn name(&self) -> String {
        format!("scroll up {}px", self.pixels)
    }
}

/// Verifies the text of an `<h1>`..`<h6>` inside the owning component.
///
/// A heading component is attached under the owner on first use and reused
/// by later runs, then verified through the polling engine. Values default
/// to the owner's name in `format` (title case unless set).
#[derive(Debug, Clone)]
pub struct VerifyHeading {
    /// Heading level, 1 to 6
    pub level: u8,
    /// 1-based index among headings of that level
    pub index: usize,
    /// Comparison
    pub match_kind: MatchKind,
    /// Accepted texts; empty means derive from the owner's name
    pub values: Vec<String>,
    /// Format used when deriving the text from the owner's name
    pub format: TermFormat,
    attached: RefCell<Vec<(ComponentId, ComponentId)>>,
}

impl VerifyHeading {
    /// Verify the first heading of `level` equals the owner's title-cased name
    #[must_use]
    pub const fn new(level: u8) -> Self {
        Self {
            level,
            index: 1,
            match_kind: MatchKind::Equals,
            values: Vec::new(),
            format: TermFormat::Inherit,
            attached: RefCell::new(Vec::new()),
        }
    }

    /// Shorthand for `<h1>`
    #[must_use]
    pub const fn h1() -> Self {
        Self::new(1)
    }

    /// Shorthand for `<h4>`
    #[must_use]
    pub const fn h4() -> Self {
        Self::new(4)
    }

    /// Accept any of these texts
    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the comparison
    #[must_use]
    pub const fn with_match(mut self, kind: MatchKind) -> Self {
        self.match_kind = kind;
        self
    }

    /// Pick the n-th heading (1-based)
    #[must_use]
    pub const fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Set the format for name-derived values
    #[must_use]
    pub const fn with_format(mut self, format: TermFormat) -> Self {
        self.format = format;
        self
    }

    /// Heading component under `owner`, attached on first use
    fn heading(&self, page: &mut PageObject, owner: ComponentId, values: &[String]) -> PageResult<ComponentId> {
        let cached = self
            .attached
            .borrow()
            .iter()
            .find(|(o, _)| *o == owner)
            .map(|(_, heading)| *heading);
        if let Some(heading) = cached {
            if page.metadata(heading).is_ok_and(|m| m.parent == Some(owner)) {
                return Ok(heading);
            }
        }

        let heading = page.add_component(
            owner,
            ComponentSpec::new(values.join(" / "), format!("H{}", self.level))
                .tag(format!("h{}", self.level))
                .find(FindBy::index(self.index)),
        )?;
        let mut attached = self.attached.borrow_mut();
        attached.retain(|(o, _)| *o != owner);
        attached.push((owner, heading));
        Ok(heading)
    }
}

impl TriggerBehavior for VerifyHeading {
    fn execute(&self, ctx: &mut TriggerContext<'_>) -> PageResult<()> {
        if !(1..=6).contains(&self.level) {
            return Err(PageError::InvalidMetadata {
                component: format!("h{}", self.level),
                message: "heading level must be between 1 and 6".into(),
            });
        }
        let owner = ctx.page.metadata(ctx.component)?;
        let values = if self.values.is_empty() {
            vec![self.format.resolve(TermFormat::Title).apply(&owner.name)]
        } else {
            self.values.clone()
        };
        let match_kind = self.match_kind.resolve(owner.match_kind);

        let heading = self.heading(ctx.page, ctx.component, &values)?;
        let request = VerificationRequest::data(heading, DataSource::Text, match_kind, values)
            .with_timing(ctx.page.config());
        ctx.page.verify(request)?.into_result().map(|_| ())
    }

    fn name(&self) -> String {
        format!("verify h{}", self.level)
    }
}

/// Verifies the document title
#[derive(Debug, Clone)]
pub struct VerifyTitle {
    /// Comparison
    pub match_kind: MatchKind,
    /// Accepted titles; empty means derive from the owner's name
    pub values: Vec<String>,
    /// Format used when deriving the title from the owner's name
    pub format: TermFormat,
}

impl Default for VerifyTitle {
    fn default() -> Self {
        Self {
            match_kind: MatchKind::Inherit,
            values: Vec::new(),
            format: TermFormat::Inherit,
        }
    }
}

impl VerifyTitle {
    /// Verify the title equals the owner's title-cased name
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept any of these titles
    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the comparison
    #[must_use]
    pub const fn with_match(mut self, kind: MatchKind) -> Self {
        self.match_kind = kind;
        self
    }
}

impl TriggerBehavior for VerifyTitle {
    fn execute(&self, ctx: &mut TriggerContext<'_>) -> PageResult<()> {
        let owner = ctx.page.metadata(ctx.component)?;
        let values = if self.values.is_empty() {
            vec![self.format.resolve(TermFormat::Title).apply(&owner.name)]
        } else {
            self.values.clone()
        };
        let request = VerificationRequest::title(self.match_kind.resolve(owner.match_kind), values)
            .with_timing(ctx.page.config());
        ctx.page.verify(request)?.into_result().map(|_| ())
    }

    fn name(&self) -> String {
        "verify title".to_string()
    }
}
