//! Result and error types for Pagescope.

use crate::trigger::TriggerEvent;
use crate::verify::VerificationFailure;
use thiserror::Error;

/// Result type for Pagescope operations
pub type PageResult<T> = Result<T, PageError>;

/// Errors that can occur in Pagescope
#[derive(Debug, Error)]
pub enum PageError {
    /// Locator produced zero handles where one was required
    #[error("Unable to locate {component}: {locator}")]
    ScopeNotFound {
        /// Component display name
        component: String,
        /// Locator description
        locator: String,
    },

    /// Locator produced more than one handle under the strict policy
    #[error("{count} elements match {component} ({locator}); expected exactly one")]
    AmbiguousScope {
        /// Component display name
        component: String,
        /// Locator description
        locator: String,
        /// Number of matching elements
        count: usize,
    },

    /// A previously located element is no longer attached to the document
    #[error("Element {handle} is stale")]
    StaleElement {
        /// Opaque handle id
        handle: String,
    },

    /// The driver reported a missing element for a direct query
    #[error("Element not found: {message}")]
    ElementNotFound {
        /// Error message
        message: String,
    },

    /// Any other driver failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// A trigger behavior failed while firing
    #[error("Trigger {trigger} failed on {event} of {component}: {source}")]
    TriggerFailure {
        /// Trigger name
        trigger: String,
        /// Event being fired
        event: TriggerEvent,
        /// Owning component display name
        component: String,
        /// Underlying error
        source: Box<PageError>,
    },

    /// Raw scope value could not be converted to the target type
    #[error("Cannot convert {value:?} of {component} to {target}")]
    Conversion {
        /// Component display name
        component: String,
        /// Raw value
        value: String,
        /// Target type name
        target: &'static str,
    },

    /// Escalated verification failure
    #[error("{0}")]
    Verification(Box<VerificationFailure>),

    /// Component declaration is invalid
    #[error("Invalid metadata for {component}: {message}")]
    InvalidMetadata {
        /// Component display name
        component: String,
        /// Error message
        message: String,
    },

    /// Component id does not belong to the page
    #[error("Unknown component #{id}")]
    UnknownComponent {
        /// Arena index
        id: usize,
    },

    /// No strategy is registered for a locator kind
    #[error("No scope locate strategy registered for {kind}")]
    UnknownStrategy {
        /// Locator kind
        kind: String,
    },

    /// Regex term could not be compiled
    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern text
        pattern: String,
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Config error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PageError {
    /// Errors that a poll loop treats as "not yet satisfied" rather than fatal
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ScopeNotFound { .. }
                | Self::AmbiguousScope { .. }
                | Self::StaleElement { .. }
                | Self::ElementNotFound { .. }
                | Self::Conversion { .. }
        )
    }

    /// Whether the error signals a detached element
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }
}

impl From<VerificationFailure> for PageError {
    fn from(failure: VerificationFailure) -> Self {
        Self::Verification(Box::new(failure))
    }
}
