//! Diagnostics sink for value writes and verification failures.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A section opened on the log sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSection {
    /// A value is being written to a field
    DataSetting {
        /// Component display name
        component: String,
        /// Formatted value description
        value: String,
    },
    /// A verification failed and is being escalated
    VerificationFailure {
        /// Component display name
        component: String,
        /// Rendered failure message
        message: String,
    },
    /// Free-form section
    Custom(String),
}

impl fmt::Display for LogSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataSetting { component, value } => write!(f, "Set {value} to {component}"),
            Self::VerificationFailure { component, message } => {
                write!(f, "Verification of {component} failed: {message}")
            }
            Self::Custom(text) => f.write_str(text),
        }
    }
}

/// Report sink. Sections nest; every `start_section` is paired with one
/// `end_section`.
pub trait LogSink: fmt::Debug {
    /// Open a section
    fn start_section(&self, section: &LogSection);

    /// Close the innermost open section
    fn end_section(&self);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn start_section(&self, _section: &LogSection) {}

    fn end_section(&self) {}
}

/// Sink that forwards sections to `tracing`
#[derive(Debug, Default)]
pub struct TracingLogSink {
    depth: RefCell<usize>,
}

impl TracingLogSink {
    /// Create a new tracing sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for TracingLogSink {
    fn start_section(&self, section: &LogSection) {
        let mut depth = self.depth.borrow_mut();
        *depth += 1;
        match section {
            LogSection::VerificationFailure { .. } => {
                tracing::warn!(depth = *depth, "{section}");
            }
            _ => tracing::info!(depth = *depth, "{section}"),
        }
    }

    fn end_section(&self) {
        let mut depth = self.depth.borrow_mut();
        *depth = depth.saturating_sub(1);
    }
}

/// Recorded sink event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// `start_section` was called
    Start(LogSection),
    /// `end_section` was called
    End,
}

/// Sink that keeps every call for later inspection. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogSink {
    entries: Rc<RefCell<Vec<LogEntry>>>,
}

impl RecordingLogSink {
    /// Create an empty recording sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded entries
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Started sections only
    #[must_use]
    pub fn sections(&self) -> Vec<LogSection> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|e| match e {
                LogEntry::Start(s) => Some(s.clone()),
                LogEntry::End => None,
            })
            .collect()
    }

    /// Clear recorded entries
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl LogSink for RecordingLogSink {
    fn start_section(&self, section: &LogSection) {
        self.entries
            .borrow_mut()
            .push(LogEntry::Start(section.clone()));
    }

    fn end_section(&self) {
        self.entries.borrow_mut().push(LogEntry::End);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_entries() {
        let sink = RecordingLogSink::new();
        let handle = sink.clone();
        sink.start_section(&LogSection::Custom("outer".into()));
        sink.end_section();

        assert_eq!(
            handle.entries(),
            vec![LogEntry::Start(LogSection::Custom("outer".into())), LogEntry::End]
        );
        handle.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_section_display() {
        let section = LogSection::DataSetting {
            component: "\"Email\" text input".into(),
            value: "\"a@b.c\"".into(),
        };
        assert_eq!(section.to_string(), "Set \"a@b.c\" to \"Email\" text input");
    }

    #[test]
    fn test_tracing_sink_depth_never_underflows() {
        let sink = TracingLogSink::new();
        sink.end_section();
        sink.start_section(&LogSection::Custom("x".into()));
        sink.end_section();
        assert_eq!(*sink.depth.borrow(), 0);
    }

    #[test]
    fn test_tracing_sink_nests_under_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let sink = TracingLogSink::new();
            sink.start_section(&LogSection::Custom("outer".into()));
            sink.start_section(&LogSection::VerificationFailure {
                component: "\"Email\" text input".into(),
                message: "should equal \"a\"".into(),
            });
            assert_eq!(*sink.depth.borrow(), 2);
            sink.end_section();
            sink.end_section();
            assert_eq!(*sink.depth.borrow(), 0);
        });
    }

    #[test]
    fn test_noop_sink() {
        let sink = NoopLogSink;
        sink.start_section(&LogSection::Custom("ignored".into()));
        sink.end_section();
    }
}
