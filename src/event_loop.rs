//! Provides the [`EventLoop`], a single-threaded queue of time-ordered callbacks.
//!
//! Callbacks are scheduled with a delay and run strictly one after another, in order of
//! their due time, with ties resolved by the order in which they were scheduled. The loop
//! blocks the calling thread until the next callback is due, so it only ever models
//! timers; there is no I/O readiness polling.
//!
//! Each thread gets one shared loop through [`EventLoop::instance`]. Independent loops can
//! be created with [`EventLoop::new`] or [`EventLoop::builder`], which is what tests use
//! to stay isolated from each other.

use std::{
    cell::{Cell, OnceCell, RefCell},
    cmp::Ordering,
    collections::BinaryHeap,
    fmt,
    rc::Rc,
    time::{Duration, Instant},
};

use crate::{
    error::{Error, Result},
    promise::{Callback, Promise},
    timing::Wakeup,
};

// Due time used for delays too large to be represented as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

thread_local! {
    static INSTANCE: OnceCell<EventLoop> = const { OnceCell::new() };
}

// A thunk waiting in the queue. `sequence` breaks ties between equal due times so that
// callbacks scheduled first also run first.
struct ScheduledCallback {
    due: Instant,
    sequence: u64,
    callback: Callback,
}

impl Eq for ScheduledCallback {}

impl PartialEq for ScheduledCallback {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Ord for ScheduledCallback {
    // Reversed so that `BinaryHeap` pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for ScheduledCallback {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    name: String,
    queue: RefCell<BinaryHeap<ScheduledCallback>>,
    next_sequence: Cell<u64>,
    running: Cell<bool>,
}

/// Configures and creates an [`EventLoop`].
///
/// ```
/// use coroloop::EventLoop;
///
/// let event_loop = EventLoop::builder().name("timers").capacity(64).build();
/// assert_eq!(event_loop.name(), "timers");
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct Builder {
    name: String,
    capacity: usize,
}

impl Builder {
    /// Name used to tell loops apart in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of scheduled callbacks the queue can hold before it reallocates.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> EventLoop {
        EventLoop {
            inner: Rc::new(Inner {
                name: self.name,
                queue: RefCell::new(BinaryHeap::with_capacity(self.capacity)),
                next_sequence: Cell::new(0),
                running: Cell::new(false),
            }),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            name: "event-loop".to_string(),
            capacity: 16,
        }
    }
}

fn deadline(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

// Clears the running flag however `run` exits, including through `?`.
struct RunningGuard<'a>(&'a Cell<bool>);

impl<'a> RunningGuard<'a> {
    fn enter(running: &'a Cell<bool>) -> Result<Self> {
        if running.replace(true) {
            return Err(Error::AlreadyRunning);
        }
        Ok(RunningGuard(running))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A single-threaded, timer-driven callback queue.
///
/// `EventLoop` is a cheap handle; clones share the same queue. Callbacks run fully
/// synchronously and the loop never looks at the next entry, even one that is already
/// due, until the current callback has returned.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<Inner>,
}

impl EventLoop {
    /// Creates a loop with default settings.
    pub fn new() -> Self {
        Builder::default().build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns the loop shared by everything on the current thread, creating it on first
    /// access. It is never torn down.
    pub fn instance() -> EventLoop {
        INSTANCE.with(|cell| {
            cell.get_or_init(|| Builder::default().name("global").build())
                .clone()
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of callbacks still waiting to run.
    pub fn len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Queues `callback` to run once `delay` has elapsed from now.
    ///
    /// Callbacks sharing a due time run in the order they were scheduled. Scheduling from
    /// inside a running callback is allowed; the new entry is picked up by the same run.
    pub fn schedule(&self, callback: impl FnOnce() -> Result<()> + 'static, delay: Duration) {
        let sequence = self.inner.next_sequence.get();
        self.inner.next_sequence.set(sequence + 1);

        log::trace!(
            "{}: scheduling callback #{sequence} in {delay:?}",
            self.inner.name
        );
        self.inner.queue.borrow_mut().push(ScheduledCallback {
            due: deadline(delay),
            sequence,
            callback: Box::new(callback),
        });
    }

    /// Queues `callback` to run as soon as the loop gets to it.
    pub fn call_soon(&self, callback: impl FnOnce() -> Result<()> + 'static) {
        self.schedule(callback, Duration::ZERO);
    }

    /// Returns how long until the earliest callback is due, zero if it is overdue, or
    /// `None` when nothing is scheduled.
    pub fn next_wait(&self) -> Option<Duration> {
        self.inner
            .queue
            .borrow()
            .peek()
            .map(|entry| entry.due.saturating_duration_since(Instant::now()))
    }

    /// Returns a promise that completes with a [`Wakeup`] after `delay`.
    pub fn sleep(&self, delay: Duration) -> Promise<Wakeup> {
        let promise = Promise::new();
        let timer = promise.clone();
        let scheduled_at = Instant::now();

        self.schedule(
            move || {
                timer.set_result(Wakeup {
                    scheduled_at,
                    fired_at: Instant::now(),
                })
            },
            delay,
        );
        promise
    }

    /// Runs callbacks in due-time order until the queue is empty.
    ///
    /// Blocks the thread while waiting for the next callback. Returns the first error a
    /// callback produces; the offending callback is gone, the rest of the queue is left in
    /// place and a later call picks up from there.
    pub fn run(&self) -> Result<()> {
        let _running = RunningGuard::enter(&self.inner.running)?;
        log::debug!("{}: event loop started", self.inner.name);

        while self.run_once()? {}

        log::debug!("{}: event loop drained", self.inner.name);
        Ok(())
    }

    /// Runs callbacks until `promise` is done and returns its result.
    ///
    /// Fails with [`Error::Stalled`] if the queue empties while the promise is still
    /// pending. Callbacks due after the promise completes stay queued.
    pub fn run_until_complete<T: Clone>(&self, promise: &Promise<T>) -> Result<T> {
        let _running = RunningGuard::enter(&self.inner.running)?;
        log::debug!("{}: event loop started", self.inner.name);

        while promise.is_pending() {
            if !self.run_once()? {
                log::debug!("{}: event loop drained with the promise pending", self.inner.name);
                return Err(Error::Stalled);
            }
        }

        log::debug!("{}: promise completed, event loop stopped", self.inner.name);
        promise.result()
    }

    // Waits for the earliest callback, removes it from the queue and runs it. Returns
    // `false` if there was nothing to run.
    fn run_once(&self) -> Result<bool> {
        let Some(wait) = self.next_wait() else {
            return Ok(false);
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        // The entry leaves the queue before it runs, so anything it schedules is a new
        // entry and the borrow is released for it.
        let Some(entry) = self.inner.queue.borrow_mut().pop() else {
            return Ok(false);
        };
        log::trace!(
            "{}: running callback #{}",
            self.inner.name,
            entry.sequence
        );
        (entry.callback)()?;
        Ok(true)
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.inner.name)
            .field("scheduled", &self.len())
            .field("running", &self.inner.running.get())
            .finish()
    }
}
