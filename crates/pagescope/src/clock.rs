//! Clock abstraction for the poll loop.
//!
//! The verification engine never calls `Instant::now` or `thread::sleep`
//! directly; it goes through a [`Clock`] so tests can run timeouts in virtual
//! time.

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

/// Source of time and sleeping for polling
pub trait Clock: fmt::Debug {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock: `sleep` advances time instantly
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
    sleeps: Cell<usize>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            sleeps: Cell::new(0),
        }
    }

    /// Move time forward without counting a sleep
    pub fn advance(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }

    /// Virtual time elapsed since creation
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    /// Number of `sleep` calls observed
    #[must_use]
    pub fn sleep_count(&self) -> usize {
        self.sleeps.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
        self.advance(duration);
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}
