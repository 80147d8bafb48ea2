//! Page objects.
//!
//! A [`PageObject`] owns a tree of components stored in an arena and
//! addressed by [`ComponentId`]. The page itself is the root; its search
//! context is the whole document.
//!
//! ```text
//! PageObject
//! ├── driver, clock, log sink, randomizer, strategy registry
//! └── nodes: [ root(page) ─┬─ form ─┬─ email
//!                          │        └─ submit
//!                          └─ footer ]
//! ```
//!
//! Scopes are resolved lazily and cached per component. See
//! [`component`](crate::component) for the invalidation rules.

use crate::clock::{Clock, SystemClock};
use crate::component::{CachedScope, UiComponent};
use crate::config::{MultipleMatchPolicy, PageConfig};
use crate::control::{Control, EditableField, Field};
use crate::data::{DataProvider, DataSource, FieldValue, RandomKind, RandomizeSettings, Randomizer, StdRandomizer};
use crate::driver::{Driver, ElementHandle, SearchContext};
use crate::locator::{DriverQueryStrategy, LocatorKind, ScopeLocateStrategy, StrategyRegistry};
use crate::log::{LogSink, TracingLogSink};
use crate::metadata::{ComponentId, ComponentMetadata, ComponentSpec, MetadataBuilder};
use crate::result::{PageError, PageResult};
use crate::term::{MatchKind, TermFormat};
use crate::trigger::{self, TriggerAttribute, TriggerEvent, TriggerId};
use crate::verify::{self, Should, VerificationOutcome, VerificationRequest};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

const ROOT: ComponentId = ComponentId(0);

/// Builder for [`PageObject`]
#[derive(Debug)]
pub struct PageObjectBuilder {
    name: String,
    driver: Box<dyn Driver>,
    config: PageConfig,
    clock: Rc<dyn Clock>,
    log: Rc<dyn LogSink>,
    randomizer: Box<dyn Randomizer>,
    registry: StrategyRegistry,
    cancellation: CancellationToken,
    triggers: Vec<TriggerAttribute>,
    format: TermFormat,
    match_kind: MatchKind,
}

impl PageObjectBuilder {
    /// Start building a page named `name` over `driver`
    #[must_use]
    pub fn new(name: impl Into<String>, driver: impl Driver + 'static) -> Self {
        Self {
            name: name.into(),
            driver: Box::new(driver),
            config: PageConfig::default(),
            clock: Rc::new(SystemClock),
            log: Rc::new(TracingLogSink::new()),
            randomizer: Box::new(StdRandomizer::from_entropy()),
            registry: StrategyRegistry::new(),
            cancellation: CancellationToken::new(),
            triggers: Vec::new(),
            format: TermFormat::Inherit,
            match_kind: MatchKind::Inherit,
        }
    }

    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: PageConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock used by verification
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    /// Set the log sink
    #[must_use]
    pub fn log_sink(mut self, log: impl LogSink + 'static) -> Self {
        self.log = Rc::new(log);
        self
    }

    /// Set the randomizer
    #[must_use]
    pub fn randomizer(mut self, randomizer: impl Randomizer + 'static) -> Self {
        self.randomizer = Box::new(randomizer);
        self
    }

    /// Replace the strategy registry
    #[must_use]
    pub fn registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Bind a strategy to a locator kind
    #[must_use]
    pub fn strategy(mut self, kind: LocatorKind, strategy: impl ScopeLocateStrategy + 'static) -> Self {
        self.registry.register(kind, Rc::new(strategy));
        self
    }

    /// Share a cancellation token with the verification engine
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Add a page-level trigger
    #[must_use]
    pub fn trigger(mut self, trigger: TriggerAttribute) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Page-level term format
    #[must_use]
    pub const fn format(mut self, format: TermFormat) -> Self {
        self.format = format;
        self
    }

    /// Page-level match kind
    #[must_use]
    pub const fn match_kind(mut self, kind: MatchKind) -> Self {
        self.match_kind = kind;
        self
    }

    /// Build the page object
    #[must_use]
    pub fn build(self) -> PageObject {
        let mut metadata = ComponentMetadata::page(self.name, &self.config);
        metadata.format = self.format.resolve(self.config.default_format);
        metadata.match_kind = self.match_kind.resolve(self.config.default_match);

        let mut root = UiComponent::new(ROOT, metadata, Rc::new(DriverQueryStrategy));
        let mut next_trigger = 0;
        for attribute in self.triggers {
            root.bind(TriggerId(next_trigger), attribute);
            next_trigger += 1;
        }

        PageObject {
            nodes: vec![Some(root)],
            driver: self.driver,
            config: self.config,
            clock: self.clock,
            log: self.log,
            randomizer: self.randomizer,
            registry: self.registry,
            cancellation: self.cancellation,
            root_epoch: 0,
            next_stamp: 1,
            next_trigger,
            firing: Vec::new(),
            initialized: false,
        }
    }
}

/// A page and its component tree
#[derive(Debug)]
pub struct PageObject {
    nodes: Vec<Option<UiComponent>>,
    driver: Box<dyn Driver>,
    config: PageConfig,
    clock: Rc<dyn Clock>,
    log: Rc<dyn LogSink>,
    randomizer: Box<dyn Randomizer>,
    registry: StrategyRegistry,
    cancellation: CancellationToken,
    root_epoch: u64,
    next_stamp: u64,
    next_trigger: u64,
    firing: Vec<(ComponentId, TriggerEvent)>,
    initialized: bool,
}

impl PageObject {
    /// Start building a page named `name` over `driver`
    #[must_use]
    pub fn builder(name: impl Into<String>, driver: impl Driver + 'static) -> PageObjectBuilder {
        PageObjectBuilder::new(name, driver)
    }

    /// Id of the page itself
    #[must_use]
    pub const fn root(&self) -> ComponentId {
        ROOT
    }

    /// Page name
    #[must_use]
    pub fn name(&self) -> &str {
        self.nodes
            .first()
            .and_then(Option::as_ref)
            .map_or("", |root| root.metadata.name.as_str())
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Driver
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        &*self.driver
    }

    /// Clock used by verification
    #[must_use]
    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    /// Log sink
    #[must_use]
    pub fn log_sink(&self) -> Rc<dyn LogSink> {
        Rc::clone(&self.log)
    }

    /// Token cancelling in-flight verifications
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether [`init`](Self::init) has completed
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    pub(crate) fn node(&self, id: ComponentId) -> PageResult<&UiComponent> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(PageError::UnknownComponent { id: id.0 })
    }

    fn node_mut(&mut self, id: ComponentId) -> PageResult<&mut UiComponent> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(PageError::UnknownComponent { id: id.0 })
    }

    /// Attached component
    pub fn component(&self, id: ComponentId) -> PageResult<&UiComponent> {
        self.node(id)
    }

    /// Resolved metadata of a component
    pub fn metadata(&self, id: ComponentId) -> PageResult<&ComponentMetadata> {
        self.node(id).map(|n| &n.metadata)
    }

    /// Children of a component in attachment order
    pub fn children(&self, id: ComponentId) -> PageResult<&[ComponentId]> {
        self.node(id).map(|n| n.children.as_slice())
    }

    /// First child of `parent` named `name`
    pub fn find_child(&self, parent: ComponentId, name: &str) -> PageResult<Option<ComponentId>> {
        let node = self.node(parent)?;
        Ok(node
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).is_ok_and(|c| c.metadata.name == name)))
    }

    /// Attach a component under `parent`.
    ///
    /// Metadata is resolved against the parent and the strategy for its
    /// locator kind is bound now. If the page is already initialized the
    /// component's `Init` triggers fire before this returns.
    pub fn add_component(&mut self, parent: ComponentId, spec: ComponentSpec) -> PageResult<ComponentId> {
        let metadata = MetadataBuilder::build(&spec, parent, self.metadata(parent)?, &self.config)?;
        let strategy = self.registry.resolve(&metadata.locator.kind)?;

        let id = ComponentId(self.nodes.len());
        let triggers = metadata.triggers.clone();
        let mut node = UiComponent::new(id, metadata, strategy);
        for attribute in triggers {
            node.bind(self.next_trigger_id(), attribute);
        }
        tracing::debug!(
            component = %id,
            %parent,
            name = %node.metadata.name,
            locator = %node.metadata.locator,
            "component attached"
        );
        self.nodes.push(Some(node));
        self.node_mut(parent)?.children.push(id);

        if self.initialized {
            if let Err(err) = self.init_component(id) {
                if let Err(detach) = self.remove_component(id) {
                    tracing::warn!(
                        component = %id,
                        error = %detach,
                        "failed to detach component after init failure"
                    );
                }
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Detach a component and its subtree
    pub fn remove_component(&mut self, id: ComponentId) -> PageResult<()> {
        let parent = self.node(id)?.metadata.parent.ok_or_else(|| PageError::InvalidMetadata {
            component: self.name().to_string(),
            message: "the page itself cannot be removed".into(),
        })?;
        if let Ok(parent) = self.node_mut(parent) {
            parent.children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
        tracing::debug!(component = %id, "component detached");
        Ok(())
    }

    /// `id` and its descendants, parents before children
    fn subtree(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Ok(node) = self.node(next) {
                order.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    // ------------------------------------------------------------------
    // Scope resolution
    // ------------------------------------------------------------------

    /// Current stamp of `id` if its cached scope is still valid
    fn current_stamp(&self, id: ComponentId) -> Option<u64> {
        if id == ROOT {
            return Some(self.root_epoch);
        }
        let node = self.node(id).ok()?;
        let cache = node.cache.as_ref()?;
        if cache.generation != self.driver.document_generation() {
            return None;
        }
        let parent = node.metadata.parent?;
        (self.current_stamp(parent)? == cache.parent_stamp).then_some(cache.stamp)
    }

    fn resolve(&mut self, id: ComponentId) -> PageResult<(SearchContext, u64)> {
        if id == ROOT {
            return Ok((SearchContext::Document, self.root_epoch));
        }
        if let Some(stamp) = self.current_stamp(id) {
            if let Some(cache) = &self.node(id)?.cache {
                tracing::trace!(component = %id, element = %cache.element, "scope cache hit");
                return Ok((SearchContext::Element(cache.element.clone()), stamp));
            }
        }

        let parent = self.node(id)?.metadata.parent.unwrap_or(ROOT);
        let (context, parent_stamp) = self.resolve(parent)?;

        let node = self.node(id)?;
        let metadata = &node.metadata;
        let strategy = Rc::clone(&node.strategy);
        let candidates = strategy.locate(&*self.driver, metadata, &context, &metadata.filter)?;
        let mut kept = metadata.filter.apply(&*self.driver, candidates)?;

        let element = match kept.len() {
            0 => {
                return Err(PageError::ScopeNotFound {
                    component: metadata.display_name(),
                    locator: metadata.locator.to_string(),
                })
            }
            1 => kept.remove(0),
            count => match self.config.multiple_match {
                MultipleMatchPolicy::First => {
                    tracing::debug!(component = %id, count, "multiple elements match; taking the first");
                    kept.remove(0)
                }
                MultipleMatchPolicy::Strict => {
                    return Err(PageError::AmbiguousScope {
                        component: metadata.display_name(),
                        locator: metadata.locator.to_string(),
                        count,
                    })
                }
            },
        };
        let filter = metadata.filter.clone();

        let stamp = self.next_stamp;
        self.next_stamp += 1;
        let generation = self.driver.document_generation();
        tracing::debug!(component = %id, %element, strategy = strategy.name(), "scope resolved");
        self.node_mut(id)?.cache = Some(CachedScope {
            element: element.clone(),
            stamp,
            parent_stamp,
            generation,
            strategy: strategy.name().to_string(),
            filter,
        });
        Ok((SearchContext::Element(element), stamp))
    }

    /// Element scope of a component, resolving and caching it if needed
    pub fn scope(&mut self, id: ComponentId) -> PageResult<ElementHandle> {
        match self.resolve(id)?.0 {
            SearchContext::Element(handle) => Ok(handle),
            SearchContext::Document => Err(PageError::InvalidMetadata {
                component: self.name().to_string(),
                message: "the page itself has no element scope".into(),
            }),
        }
    }

    /// Every element the component's locator matches, uncached
    pub fn scope_all(&mut self, id: ComponentId) -> PageResult<Vec<ElementHandle>> {
        let parent = self.node(id)?.metadata.parent.ok_or_else(|| PageError::InvalidMetadata {
            component: self.name().to_string(),
            message: "the page itself has no element scope".into(),
        })?;
        let (context, _) = self.resolve(parent)?;
        let node = self.node(id)?;
        let candidates =
            node.strategy
                .locate(&*self.driver, &node.metadata, &context, &node.metadata.filter)?;
        node.metadata.filter.apply(&*self.driver, candidates)
    }

    /// Drop the cached scope of `id`. Descendants re-resolve on next access.
    pub fn invalidate(&mut self, id: ComponentId) -> PageResult<()> {
        if id == ROOT {
            self.root_epoch += 1;
        }
        self.node_mut(id)?.cache = None;
        Ok(())
    }

    /// Drop every cached scope
    pub fn invalidate_all(&mut self) {
        self.root_epoch += 1;
        for node in self.nodes.iter_mut().flatten() {
            node.cache = None;
        }
    }

    /// Drop the cached scopes of `id` and every ancestor up to the page
    pub(crate) fn invalidate_lineage(&mut self, id: ComponentId) -> PageResult<()> {
        let mut next = Some(id);
        while let Some(current) = next {
            next = self.node(current)?.metadata.parent;
            self.invalidate(current)?;
        }
        Ok(())
    }

    /// Run `op` against the component's scope without firing triggers.
    ///
    /// A stale element causes the component and its ancestors to be
    /// invalidated and `op` to be retried once, unless disabled in the
    /// configuration.
    pub fn with_scope<R>(
        &mut self,
        id: ComponentId,
        op: impl Fn(&dyn Driver, &ElementHandle) -> PageResult<R>,
    ) -> PageResult<R> {
        match self.try_with_scope(id, &op) {
            Err(err) if err.is_stale() && self.config.stale_retry => {
                tracing::debug!(component = %id, error = %err, "stale scope; re-resolving");
                self.invalidate_lineage(id)?;
                self.try_with_scope(id, &op)
            }
            other => other,
        }
    }

    fn try_with_scope<R>(
        &mut self,
        id: ComponentId,
        op: &impl Fn(&dyn Driver, &ElementHandle) -> PageResult<R>,
    ) -> PageResult<R> {
        let handle = self.scope(id)?;
        op(&*self.driver, &handle)
    }

    /// [`with_scope`](Self::with_scope) bracketed by `BeforeAccess`/`AfterAccess`
    pub fn access<R>(
        &mut self,
        id: ComponentId,
        op: impl Fn(&dyn Driver, &ElementHandle) -> PageResult<R>,
    ) -> PageResult<R> {
        self.fire(id, TriggerEvent::BeforeAccess)?;
        let result = self.with_scope(id, op)?;
        self.fire(id, TriggerEvent::AfterAccess)?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate the driver and drop every cached scope
    pub fn navigate_to(&mut self, url: &str) -> PageResult<()> {
        tracing::info!(page = %self.name(), url, "navigating");
        self.driver.navigate(url)?;
        self.invalidate_all();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle and triggers
    // ------------------------------------------------------------------

    /// Fire `Init` on every component, parents before children
    pub fn init(&mut self) -> PageResult<()> {
        tracing::info!(page = %self.name(), "initializing page");
        self.initialized = true;
        for id in self.subtree(ROOT) {
            if self.node(id).is_err() {
                continue;
            }
            if let Err(err) = self.init_component(id) {
                self.initialized = false;
                return Err(err);
            }
        }
        Ok(())
    }

    fn init_component(&mut self, id: ComponentId) -> PageResult<()> {
        if self.node(id)?.initialized {
            return Ok(());
        }
        self.fire(id, TriggerEvent::Init)?;
        self.node_mut(id)?.initialized = true;
        Ok(())
    }

    /// Fire `DeInit` on every component, children before parents, and
    /// drop every cached scope
    pub fn deinit(&mut self) -> PageResult<()> {
        tracing::info!(page = %self.name(), "tearing down page");
        for id in self.subtree(ROOT).into_iter().rev() {
            if self.node(id).is_ok() {
                self.fire(id, TriggerEvent::DeInit)?;
                self.node_mut(id)?.initialized = false;
            }
        }
        self.invalidate_all();
        self.initialized = false;
        Ok(())
    }

    fn next_trigger_id(&mut self) -> TriggerId {
        let id = TriggerId(self.next_trigger);
        self.next_trigger += 1;
        id
    }

    /// Attach a trigger to a component at runtime
    pub fn add_trigger(&mut self, id: ComponentId, trigger: TriggerAttribute) -> PageResult<TriggerId> {
        let trigger_id = self.next_trigger_id();
        self.node_mut(id)?.bind(trigger_id, trigger);
        Ok(trigger_id)
    }

    /// Detach a trigger by identity; `false` when it was not attached
    pub fn remove_trigger(&mut self, id: ComponentId, trigger: TriggerId) -> PageResult<bool> {
        let node = self.node_mut(id)?;
        let before = node.triggers.len();
        node.triggers.retain(|b| b.id != trigger);
        Ok(node.triggers.len() != before)
    }

    /// Fire `event` on a component
    pub fn fire(&mut self, id: ComponentId, event: TriggerEvent) -> PageResult<()> {
        trigger::fire(self, id, event, None)
    }

    /// Fire `event` on a component with the raw value being written
    pub fn fire_with(&mut self, id: ComponentId, event: TriggerEvent, payload: Option<&str>) -> PageResult<()> {
        trigger::fire(self, id, event, payload)
    }

    pub(crate) fn is_firing(&self, id: ComponentId, event: TriggerEvent) -> bool {
        self.firing.contains(&(id, event))
    }

    pub(crate) fn push_firing(&mut self, id: ComponentId, event: TriggerEvent) {
        self.firing.push((id, event));
    }

    pub(crate) fn pop_firing(&mut self) {
        let _ = self.firing.pop();
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Whether the component's locator currently matches an element
    pub fn exists(&mut self, id: ComponentId) -> PageResult<bool> {
        match self.with_scope(id, |driver, handle| driver.is_displayed(handle).map(|_| ())) {
            Ok(()) => Ok(true),
            Err(
                PageError::ScopeNotFound { .. }
                | PageError::StaleElement { .. }
                | PageError::ElementNotFound { .. },
            ) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether the component is rendered
    pub fn is_visible(&mut self, id: ComponentId) -> PageResult<bool> {
        self.access(id, |driver, handle| driver.is_displayed(handle))
    }

    /// Whether the component is rendered inside the viewport
    pub fn is_visible_in_viewport(&mut self, id: ComponentId) -> PageResult<bool> {
        self.access(id, |driver, handle| driver.is_displayed_in_viewport(handle))
    }

    /// Whether the component lacks a `disabled` attribute
    pub fn is_enabled(&mut self, id: ComponentId) -> PageResult<bool> {
        self.access(id, |driver, handle| {
            Ok(driver.read_attribute(handle, "disabled")?.is_none())
        })
    }

    /// Whether the component carries a `readonly` attribute
    pub fn is_read_only(&mut self, id: ComponentId) -> PageResult<bool> {
        self.access(id, |driver, handle| {
            Ok(driver.read_attribute(handle, "readonly")?.is_some())
        })
    }

    /// Scroll the component into the viewport
    pub fn scroll_into_view(&mut self, id: ComponentId) -> PageResult<()> {
        self.access(id, |driver, handle| driver.dispatch_scroll_into_view(handle))
    }

    /// Click the component, bracketed by `BeforeClick`/`AfterClick`
    pub fn click(&mut self, id: ComponentId) -> PageResult<()> {
        tracing::debug!(component = %id, "click");
        self.fire(id, TriggerEvent::BeforeClick)?;
        self.access(id, |driver, handle| driver.dispatch_click(handle))?;
        self.fire(id, TriggerEvent::AfterClick)
    }

    /// Trimmed text content of the component
    pub fn content(&mut self, id: ComponentId) -> PageResult<String> {
        DataProvider::<String>::with_source(id, DataSource::Text).get(self)
    }

    /// Attribute value of the component, `None` when absent
    pub fn attribute(&mut self, id: ComponentId, name: &str) -> PageResult<Option<String>> {
        DataProvider::<String>::with_source(id, DataSource::Attribute(name.to_string())).get_raw(self)
    }

    /// Generate a raw random value
    pub fn randomize(&mut self, kind: RandomKind, settings: &RandomizeSettings) -> PageResult<String> {
        self.randomizer.generate(kind, settings)
    }

    /// Run a verification request through the polling engine
    pub fn verify(&mut self, request: VerificationRequest) -> PageResult<VerificationOutcome> {
        verify::verify(self, request)
    }

    // ------------------------------------------------------------------
    // Fluent access
    // ------------------------------------------------------------------

    /// Fluent handle on a component
    pub fn control(&mut self, id: ComponentId) -> Control<'_> {
        Control::new(self, id)
    }

    /// Fluent typed read access
    pub fn field<T: FieldValue>(&mut self, id: ComponentId) -> Field<'_, T> {
        Field::new(self, id)
    }

    /// Fluent typed read/write access
    pub fn editable<T: FieldValue>(&mut self, id: ComponentId) -> EditableField<'_, T> {
        EditableField::new(self, id)
    }

    /// Verification entry point for a component
    pub fn should(&mut self, id: ComponentId) -> Should<'_> {
        Should::new(self, id)
    }
}
