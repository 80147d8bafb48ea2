//! Polling verification engine.
//!
//! A [`VerificationRequest`] names a subject (a component's value, the page
//! title or a boolean condition), the expected values with a match kind,
//! negation, a timeout and a polling interval. [`verify`] evaluates it until
//! it holds or the timeout elapses:
//!
//! ```text
//! start ─► cancelled? ─yes─► Failed(Cancelled)
//!            │no
//!            ▼
//!          observe (fresh scope) ─► satisfied? ─yes─► Passed
//!            │no
//!            ▼
//!          elapsed >= timeout? ─yes─► Failed(Timeout)
//!            │no
//!            ▼
//!          sleep(min(poll, remaining)) ─► back to start
//! ```
//!
//! Missing or stale elements and failed conversions count as "not yet
//! satisfied" on every attempt. Any other error aborts the loop. Negation
//! only inverts the exit condition.

use crate::config::{PageConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_VERIFY_TIMEOUT_MS};
use crate::control::Control;
use crate::data::{DataProvider, DataSource};
use crate::log::LogSection;
use crate::metadata::ComponentId;
use crate::page::PageObject;
use crate::result::{PageError, PageResult};
use crate::term::MatchKind;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lower bound on the polling interval so a zero interval cannot spin
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

type ConditionCheck = Box<dyn FnMut(&mut PageObject) -> PageResult<bool>>;

/// Boolean predicate over the page
pub enum Condition {
    /// Component is rendered
    Visible(ComponentId),
    /// Component is rendered inside the viewport
    VisibleInViewport(ComponentId),
    /// Component's locator matches an element
    Exists(ComponentId),
    /// Component has no `disabled` attribute
    Enabled(ComponentId),
    /// Component has a `readonly` attribute
    ReadOnly(ComponentId),
    /// Arbitrary check
    Custom {
        /// Phrase completing "should ...", e.g. `have 3 rows`
        description: String,
        /// The check
        check: ConditionCheck,
    },
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible(id) => f.debug_tuple("Visible").field(id).finish(),
            Self::VisibleInViewport(id) => f.debug_tuple("VisibleInViewport").field(id).finish(),
            Self::Exists(id) => f.debug_tuple("Exists").field(id).finish(),
            Self::Enabled(id) => f.debug_tuple("Enabled").field(id).finish(),
            Self::ReadOnly(id) => f.debug_tuple("ReadOnly").field(id).finish(),
            Self::Custom { description, .. } => {
                f.debug_struct("Custom").field("description", description).finish()
            }
        }
    }
}

impl Condition {
    /// Wrap a closure as a condition
    pub fn custom(
        description: impl Into<String>,
        check: impl FnMut(&mut PageObject) -> PageResult<bool> + 'static,
    ) -> Self {
        Self::Custom {
            description: description.into(),
            check: Box::new(check),
        }
    }

    const fn component(&self) -> Option<ComponentId> {
        match self {
            Self::Visible(id)
            | Self::VisibleInViewport(id)
            | Self::Exists(id)
            | Self::Enabled(id)
            | Self::ReadOnly(id) => Some(*id),
            Self::Custom { .. } => None,
        }
    }

    fn phrase(&self) -> &str {
        match self {
            Self::Visible(_) => "be visible",
            Self::VisibleInViewport(_) => "be visible in viewport",
            Self::Exists(_) => "exist",
            Self::Enabled(_) => "be enabled",
            Self::ReadOnly(_) => "be read-only",
            Self::Custom { description, .. } => description,
        }
    }
}

/// What a verification observes
#[derive(Debug)]
pub enum Subject {
    /// A component's value
    Data {
        /// Component to read
        component: ComponentId,
        /// Source override; `None` uses the component's declared source
        source: Option<DataSource>,
    },
    /// The document title
    Title,
    /// A boolean condition
    Condition(Condition),
}

/// A single verification to run
#[derive(Debug)]
pub struct VerificationRequest {
    /// What is observed
    pub subject: Subject,
    /// Comparison for data subjects
    pub match_kind: MatchKind,
    /// Accepted values for data subjects; any may match
    pub expected: Vec<String>,
    /// Invert the exit condition
    pub negated: bool,
    /// Give up after this long
    pub timeout: Duration,
    /// Wait this long between attempts
    pub poll_interval: Duration,
}

impl VerificationRequest {
    fn with_subject(subject: Subject, match_kind: MatchKind, expected: Vec<String>) -> Self {
        Self {
            subject,
            match_kind,
            expected,
            negated: false,
            timeout: Duration::from_millis(DEFAULT_VERIFY_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Verify a component's value read through `source`
    pub fn data<I, S>(component: ComponentId, source: DataSource, match_kind: MatchKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_subject(
            Subject::Data {
                component,
                source: Some(source),
            },
            match_kind,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Verify a component's value read through its declared source
    pub fn value<I, S>(component: ComponentId, match_kind: MatchKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_subject(
            Subject::Data {
                component,
                source: None,
            },
            match_kind,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Verify the document title
    pub fn title<I, S>(match_kind: MatchKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_subject(
            Subject::Title,
            match_kind,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Verify a boolean condition
    #[must_use]
    pub fn condition(condition: Condition) -> Self {
        Self::with_subject(Subject::Condition(condition), MatchKind::Equals, Vec::new())
    }

    /// Invert the exit condition
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Set negation explicitly
    #[must_use]
    pub const fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    /// Set the timeout
    #[must_use]
    pub const fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn polling(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Take timeout and polling interval from a configuration
    #[must_use]
    pub const fn with_timing(self, config: &PageConfig) -> Self {
        self.within(config.timeout()).polling(config.poll_interval())
    }
}

/// Why a verification gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The timeout elapsed
    Timeout,
    /// The cancellation token fired
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Diagnostics of a failed verification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationFailure {
    /// Why the loop stopped
    pub kind: FailureKind,
    /// What was observed, e.g. `"Greeting" text text content`
    pub subject: String,
    /// Expectation phrase, e.g. `not equal` or `be visible`
    pub expectation: String,
    /// Accepted values
    pub expected: Vec<String>,
    /// Last observed value
    pub actual: Option<String>,
    /// Last transient error, when the subject could not be observed
    pub last_error: Option<String>,
    /// Comparison for data subjects
    pub match_kind: Option<MatchKind>,
    /// Whether the expectation was negated
    pub negated: bool,
    /// Time spent
    pub elapsed: Duration,
    /// Configured timeout
    pub timeout: Duration,
    /// Number of observations made
    pub attempts: u32,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} should {}", self.subject, self.expectation)?;
        match self.expected.as_slice() {
            [] => {}
            [single] => write!(f, " {single:?}")?,
            many => write!(f, " any of {many:?}")?,
        }
        if let Some(actual) = &self.actual {
            write!(f, ", but was {actual:?}")?;
        } else if let Some(error) = &self.last_error {
            write!(f, ", but {error}")?;
        }
        write!(
            f,
            " ({} after {:.2}s, {} attempt{})",
            self.kind,
            self.elapsed.as_secs_f64(),
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}

/// Diagnostics of a passed verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationPass {
    /// Value observed on the passing attempt, for data subjects
    pub actual: Option<String>,
    /// Time spent
    pub elapsed: Duration,
    /// Number of observations made
    pub attempts: u32,
}

/// Result of running a verification
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// The expectation held
    Passed(VerificationPass),
    /// The loop gave up
    Failed(VerificationFailure),
}

impl VerificationOutcome {
    /// Whether the expectation held
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }

    /// Escalate a failure to [`PageError::Verification`]
    pub fn into_result(self) -> PageResult<VerificationPass> {
        match self {
            Self::Passed(pass) => Ok(pass),
            Self::Failed(failure) => Err(failure.into()),
        }
    }
}

enum Observation {
    Value(String),
    Flag(bool),
    Unavailable(String),
}

fn transient(result: PageResult<Observation>) -> PageResult<Observation> {
    match result {
        Err(err) if err.is_transient() => Ok(Observation::Unavailable(err.to_string())),
        other => other,
    }
}

/// Presence-style conditions read a missing element as `false`
fn absent_is_false(result: PageResult<bool>) -> PageResult<Observation> {
    match result {
        Err(
            PageError::ScopeNotFound { .. }
            | PageError::StaleElement { .. }
            | PageError::ElementNotFound { .. },
        ) => Ok(Observation::Flag(false)),
        other => transient(other.map(Observation::Flag)),
    }
}

fn observe(page: &mut PageObject, subject: &mut Subject) -> PageResult<Observation> {
    match subject {
        Subject::Data { component, source } => {
            page.invalidate_lineage(*component)?;
            let provider = match source {
                Some(source) => DataProvider::<String>::with_source(*component, source.clone()),
                None => DataProvider::new(*component),
            };
            transient(provider.get(page).map(Observation::Value))
        }
        Subject::Title => transient(page.driver().title().map(Observation::Value)),
        Subject::Condition(condition) => {
            if let Some(id) = condition.component() {
                page.invalidate_lineage(id)?;
            }
            match condition {
                Condition::Visible(id) => absent_is_false(page.is_visible(*id)),
                Condition::VisibleInViewport(id) => absent_is_false(page.is_visible_in_viewport(*id)),
                Condition::Exists(id) => page.exists(*id).map(Observation::Flag),
                Condition::Enabled(id) => transient(page.is_enabled(*id).map(Observation::Flag)),
                Condition::ReadOnly(id) => transient(page.is_read_only(*id).map(Observation::Flag)),
                Condition::Custom { check, .. } => transient(check(page).map(Observation::Flag)),
            }
        }
    }
}

fn describe_subject(page: &PageObject, subject: &Subject) -> PageResult<String> {
    match subject {
        Subject::Data { component, source } => {
            let metadata = page.metadata(*component)?;
            let source = source.as_ref().unwrap_or(&metadata.source);
            Ok(format!("{} {source}", metadata.display_name()))
        }
        Subject::Title => Ok(format!("\"{}\" page title", page.name())),
        Subject::Condition(condition) => match condition.component() {
            Some(id) => Ok(page.metadata(id)?.display_name()),
            None => Ok(format!("\"{}\" page", page.name())),
        },
    }
}

/// Run `request` against `page` until it holds, times out or is cancelled.
///
/// Errors other than missing/stale elements and conversion failures are
/// returned immediately. An unsatisfied expectation is reported as
/// [`VerificationOutcome::Failed`], not as an error.
pub fn verify(page: &mut PageObject, request: VerificationRequest) -> PageResult<VerificationOutcome> {
    let VerificationRequest {
        mut subject,
        match_kind,
        expected,
        negated,
        timeout,
        poll_interval,
    } = request;

    let subject_text = describe_subject(page, &subject)?;
    let match_kind = match &subject {
        Subject::Data { component, .. } => match_kind.resolve(page.metadata(*component)?.match_kind),
        Subject::Title => match_kind.resolve(page.metadata(page.root())?.match_kind),
        Subject::Condition(_) => match_kind,
    };
    let is_data = !matches!(subject, Subject::Condition(_));
    let expectation = match &subject {
        Subject::Condition(condition) if negated => format!("not {}", condition.phrase()),
        Subject::Condition(condition) => condition.phrase().to_string(),
        _ => match_kind.describe(negated),
    };

    let matcher = match_kind.compile(&expected)?;
    let clock = page.clock();
    let cancellation = page.cancellation().clone();
    let poll = poll_interval.max(MIN_POLL_INTERVAL);
    let start = clock.now();
    let mut attempts: u32 = 0;
    let mut last_actual = None;
    let mut last_error = None;

    tracing::debug!(subject = %subject_text, %expectation, ?expected, ?timeout, "verification started");

    let kind = loop {
        if cancellation.is_cancelled() {
            break FailureKind::Cancelled;
        }
        attempts += 1;

        let (satisfied, actual, error) = match observe(page, &mut subject)? {
            Observation::Value(value) => {
                (matcher.matches_any(&value) != negated, Some(value), None)
            }
            Observation::Flag(flag) => (flag != negated, None, None),
            Observation::Unavailable(error) => (false, None, Some(error)),
        };

        if satisfied {
            let elapsed = clock.now().saturating_duration_since(start);
            tracing::debug!(subject = %subject_text, attempts, ?elapsed, "verification passed");
            return Ok(VerificationOutcome::Passed(VerificationPass {
                actual,
                elapsed,
                attempts,
            }));
        }
        last_actual = actual;
        last_error = error;

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= timeout {
            break FailureKind::Timeout;
        }
        clock.sleep(poll.min(timeout - elapsed));
    };

    let failure = VerificationFailure {
        kind,
        subject: subject_text,
        expectation,
        expected,
        actual: last_actual,
        last_error,
        match_kind: is_data.then_some(match_kind),
        negated,
        elapsed: clock.now().saturating_duration_since(start),
        timeout,
        attempts,
    };
    tracing::debug!(failure = %failure, "verification failed");
    Ok(VerificationOutcome::Failed(failure))
}

/// Fluent verification of a component.
///
/// Every check polls with the page's configured timing unless overridden
/// and returns a [`Control`] on success. A failure is written to the log
/// sink as a verification-failure section, then returned as
/// [`PageError::Verification`].
#[derive(Debug)]
pub struct Should<'p> {
    page: &'p mut PageObject,
    component: ComponentId,
    negated: bool,
    timeout: Duration,
    poll_interval: Duration,
    source: Option<DataSource>,
}

impl<'p> Should<'p> {
    pub(crate) fn new(page: &'p mut PageObject, component: ComponentId) -> Self {
        let timeout = page.config().timeout();
        let poll_interval = page.config().poll_interval();
        Self {
            page,
            component,
            negated: false,
            timeout,
            poll_interval,
            source: None,
        }
    }

    /// Invert the next check
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Override the timeout
    #[must_use]
    pub const fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the polling interval
    #[must_use]
    pub const fn polling(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Read values through `source` instead of the declared one
    #[must_use]
    pub fn from_source(mut self, source: DataSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Value equals `value`
    pub fn equal(self, value: impl Into<String>) -> PageResult<Control<'p>> {
        self.match_any(MatchKind::Equals, [value.into()])
    }

    /// Value contains `value`
    pub fn contain(self, value: impl Into<String>) -> PageResult<Control<'p>> {
        self.match_any(MatchKind::Contains, [value.into()])
    }

    /// Value starts with `value`
    pub fn start_with(self, value: impl Into<String>) -> PageResult<Control<'p>> {
        self.match_any(MatchKind::StartsWith, [value.into()])
    }

    /// Value ends with `value`
    pub fn end_with(self, value: impl Into<String>) -> PageResult<Control<'p>> {
        self.match_any(MatchKind::EndsWith, [value.into()])
    }

    /// Value matches the regular expression `pattern`
    pub fn match_regex(self, pattern: impl Into<String>) -> PageResult<Control<'p>> {
        self.match_any(MatchKind::Regex, [pattern.into()])
    }

    /// Value matches any of `values` under `kind`
    pub fn match_any<I, S>(self, kind: MatchKind, values: I) -> PageResult<Control<'p>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = match &self.source {
            Some(source) => VerificationRequest::data(self.component, source.clone(), kind, values),
            None => VerificationRequest::value(self.component, kind, values),
        };
        self.run(request)
    }

    /// Component is rendered
    pub fn be_visible(self) -> PageResult<Control<'p>> {
        let condition = Condition::Visible(self.component);
        self.run(VerificationRequest::condition(condition))
    }

    /// Component is rendered inside the viewport
    pub fn be_visible_in_viewport(self) -> PageResult<Control<'p>> {
        let condition = Condition::VisibleInViewport(self.component);
        self.run(VerificationRequest::condition(condition))
    }

    /// Component's locator matches an element
    pub fn exist(self) -> PageResult<Control<'p>> {
        let condition = Condition::Exists(self.component);
        self.run(VerificationRequest::condition(condition))
    }

    /// Component is enabled
    pub fn be_enabled(self) -> PageResult<Control<'p>> {
        let condition = Condition::Enabled(self.component);
        self.run(VerificationRequest::condition(condition))
    }

    /// Component is read-only
    pub fn be_read_only(self) -> PageResult<Control<'p>> {
        let condition = Condition::ReadOnly(self.component);
        self.run(VerificationRequest::condition(condition))
    }

    /// Arbitrary check over the page
    pub fn satisfy(
        self,
        description: impl Into<String>,
        check: impl FnMut(&mut PageObject) -> PageResult<bool> + 'static,
    ) -> PageResult<Control<'p>> {
        self.run(VerificationRequest::condition(Condition::custom(description, check)))
    }

    fn run(self, request: VerificationRequest) -> PageResult<Control<'p>> {
        let request = request
            .negated(self.negated)
            .within(self.timeout)
            .polling(self.poll_interval);
        match verify(self.page, request)? {
            VerificationOutcome::Passed(_) => Ok(Control::new(self.page, self.component)),
            VerificationOutcome::Failed(failure) => {
                let component = self
                    .page
                    .metadata(self.component)
                    .map_or_else(|_| self.component.to_string(), |m| m.display_name());
                let log = self.page.log_sink();
                log.start_section(&LogSection::VerificationFailure {
                    component,
                    message: failure.to_string(),
                });
                log.end_section();
                Err(failure.into())
            }
        }
    }
}
