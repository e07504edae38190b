//! Timer primitives built on the event loop.
//!
//! [`sleep`] is the canonical leaf operation: it creates a [`Promise`], arranges for the
//! loop to complete it later and hands it back immediately. Any other leaf (a socket
//! read, a child process exiting) would have the same shape.

use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::{event_loop::EventLoop, promise::Promise};

/// Marker a timer completes its promise with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wakeup {
    /// When the timer was created.
    pub scheduled_at: Instant,
    /// When the loop fired it.
    pub fired_at: Instant,
}

impl Wakeup {
    /// Time actually spent asleep.
    pub fn slept(&self) -> Duration {
        self.fired_at.duration_since(self.scheduled_at)
    }
}

impl fmt::Display for Wakeup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "awake after {:?}", self.slept())
    }
}

/// Returns a promise that the thread's shared loop completes after `delay`.
///
/// Nothing happens until [`EventLoop::instance`] is run. Use [`EventLoop::sleep`] to
/// target a specific loop.
pub fn sleep(delay: Duration) -> Promise<Wakeup> {
    EventLoop::instance().sleep(delay)
}
