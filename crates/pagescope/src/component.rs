//! Component nodes and their cached scopes.
//!
//! Each attached component owns its resolved metadata, the strategy bound
//! to its locator kind, its trigger bindings and at most one cached scope.
//!
//! A cached scope records three stamps:
//!
//! ```text
//!   stamp         unique per resolution of this node
//!   parent_stamp  the parent's stamp when this scope was located
//!   generation    the driver's document generation at that time
//! ```
//!
//! The cache is valid only while the document generation is unchanged and
//! the parent's current stamp still equals `parent_stamp`. Invalidating a
//! node drops its cache; its descendants notice lazily on their next access.

use crate::driver::ElementHandle;
use crate::locator::{ScopeFilter, ScopeLocateStrategy};
use crate::metadata::{ComponentId, ComponentMetadata};
use crate::trigger::{TriggerAttribute, TriggerBinding, TriggerId};
use std::fmt;
use std::rc::Rc;

/// Located element plus what is needed to locate it again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedScope {
    /// Located element
    pub element: ElementHandle,
    /// Unique stamp of this resolution
    pub stamp: u64,
    /// Parent's stamp at resolution time
    pub parent_stamp: u64,
    /// Document generation at resolution time
    pub generation: u64,
    /// Strategy that produced the element
    pub strategy: String,
    /// Filter that narrowed the candidates
    pub filter: ScopeFilter,
}

/// A component attached to a page
pub struct UiComponent {
    pub(crate) id: ComponentId,
    pub(crate) metadata: ComponentMetadata,
    pub(crate) strategy: Rc<dyn ScopeLocateStrategy>,
    pub(crate) cache: Option<CachedScope>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) triggers: Vec<TriggerBinding>,
    pub(crate) next_sequence: u64,
    pub(crate) initialized: bool,
}

impl fmt::Debug for UiComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiComponent")
            .field("id", &self.id)
            .field("name", &self.metadata.name)
            .field("locator", &self.metadata.locator.to_string())
            .field("strategy", &self.strategy.name())
            .field("cached", &self.cache.as_ref().map(|c| c.element.to_string()))
            .field("children", &self.children)
            .field("triggers", &self.triggers.len())
            .finish()
    }
}

impl UiComponent {
    pub(crate) fn new(
        id: ComponentId,
        metadata: ComponentMetadata,
        strategy: Rc<dyn ScopeLocateStrategy>,
    ) -> Self {
        Self {
            id,
            metadata,
            strategy,
            cache: None,
            children: Vec::new(),
            triggers: Vec::new(),
            next_sequence: 0,
            initialized: false,
        }
    }

    pub(crate) fn bind(&mut self, id: TriggerId, attribute: TriggerAttribute) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.triggers.push(TriggerBinding {
            id,
            attribute,
            sequence,
        });
    }

    /// Arena id
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Resolved metadata
    #[must_use]
    pub const fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    /// Parent, `None` for the page itself
    #[must_use]
    pub const fn parent(&self) -> Option<ComponentId> {
        self.metadata.parent
    }

    /// Child ids in attachment order
    #[must_use]
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    /// Attached triggers in declaration order
    #[must_use]
    pub fn triggers(&self) -> &[TriggerBinding] {
        &self.triggers
    }

    /// Cached scope, if one has been resolved and not invalidated
    #[must_use]
    pub const fn cached_scope(&self) -> Option<&CachedScope> {
        self.cache.as_ref()
    }

    /// Whether `Init` has fired for this component
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }
}
