//! Page configuration.
//!
//! Defaults for verification timing, locator multiplicity and term
//! resolution. Loadable from YAML.

use crate::result::{PageError, PageResult};
use crate::term::{MatchKind, TermFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default verification timeout (5 seconds)
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 5_000;

/// Default verification polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// What to do when a locator yields more than one element and no index is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleMatchPolicy {
    /// Take the first match in document order
    #[default]
    First,
    /// Fail with `AmbiguousScope`
    Strict,
}

/// Configuration shared by every component of a page object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Verification timeout in milliseconds
    pub verify_timeout_ms: u64,
    /// Verification polling interval in milliseconds
    pub verify_poll_interval_ms: u64,
    /// Multiplicity policy for unindexed locators
    pub multiple_match: MultipleMatchPolicy,
    /// Match kind used where the whole ancestor chain says `Inherit`
    pub default_match: MatchKind,
    /// Term format used where the whole ancestor chain says `Inherit`
    pub default_format: TermFormat,
    /// Re-resolve once when the driver reports a stale element
    pub stale_retry: bool,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            verify_timeout_ms: DEFAULT_VERIFY_TIMEOUT_MS,
            verify_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            multiple_match: MultipleMatchPolicy::First,
            default_match: MatchKind::Equals,
            default_format: TermFormat::Title,
            stale_retry: true,
        }
    }
}

impl PageConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verification timeout in milliseconds
    #[must_use]
    pub const fn with_verify_timeout(mut self, timeout_ms: u64) -> Self {
        self.verify_timeout_ms = timeout_ms;
        self
    }

    /// Set verification polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.verify_poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set multiplicity policy
    #[must_use]
    pub const fn with_multiple_match(mut self, policy: MultipleMatchPolicy) -> Self {
        self.multiple_match = policy;
        self
    }

    /// Set the fallback match kind
    #[must_use]
    pub const fn with_default_match(mut self, kind: MatchKind) -> Self {
        self.default_match = kind;
        self
    }

    /// Set the fallback term format
    #[must_use]
    pub const fn with_default_format(mut self, format: TermFormat) -> Self {
        self.default_format = format;
        self
    }

    /// Enable or disable the single stale-element retry
    #[must_use]
    pub const fn with_stale_retry(mut self, enabled: bool) -> Self {
        self.stale_retry = enabled;
        self
    }

    /// Verification timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    /// Polling interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.verify_poll_interval_ms)
    }

    /// Parse from a YAML document
    pub fn from_yaml_str(yaml: &str) -> PageResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| PageError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> PageResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> PageResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| PageError::Config {
            message: e.to_string(),
        })
    }

    fn validate(&self) -> PageResult<()> {
        if self.default_match.is_inherit() {
            return Err(PageError::Config {
                message: "default_match cannot be inherit".into(),
            });
        }
        if self.default_format == TermFormat::Inherit {
            return Err(PageError::Config {
                message: "default_format cannot be inherit".into(),
            });
        }
        Ok(())
    }
}
