//! Single-assignment result containers with completion callbacks.
//!
//! A [`Promise`] starts out pending and becomes done exactly once, when its producer
//! calls [`Promise::set_result`]. Consumers either register a completion callback or,
//! once the promise is done, read the stored value as often as they like.

use std::{
    cell::RefCell,
    fmt,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, Poll, Waker},
};

use crate::error::{Error, Result};

/// A zero-argument completion or scheduled callback.
///
/// Callbacks return `Result` so that a fatal condition hit inside one travels back
/// through whoever invoked it, and ultimately out of the event loop.
pub(crate) type Callback = Box<dyn FnOnce() -> Result<()>>;

enum State<T> {
    Pending {
        callbacks: Vec<Callback>,
        wakers: Vec<Waker>,
    },
    Done(T),
}

/// A write-once value with completion notification.
///
/// `Promise` is a shared handle: cloning it gives another view of the same slot, so the
/// producer and every consumer can hold their own copy. It is deliberately `!Send`,
/// everything it touches runs on the event loop thread.
#[must_use = "a promise does nothing unless its result is consumed"]
pub struct Promise<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Promise<T> {
    /// Creates a new pending promise.
    pub fn new() -> Self {
        Promise {
            state: Rc::new(RefCell::new(State::Pending {
                callbacks: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    /// Creates a promise that is already done with `value`.
    pub fn resolved(value: T) -> Self {
        Promise {
            state: Rc::new(RefCell::new(State::Done(value))),
        }
    }

    /// Returns `true` once a result has been set.
    pub fn is_done(&self) -> bool {
        matches!(*self.state.borrow(), State::Done(_))
    }

    /// Returns `true` while no result has been set.
    pub fn is_pending(&self) -> bool {
        !self.is_done()
    }

    /// Registers `callback` to run when the promise completes.
    ///
    /// If the promise is already done the callback runs right away, before this method
    /// returns, and its outcome is returned. Otherwise it is queued behind earlier
    /// registrations and `Ok(())` is returned.
    pub fn add_done_callback(&self, callback: impl FnOnce() -> Result<()> + 'static) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            if let State::Pending { callbacks, .. } = &mut *state {
                callbacks.push(Box::new(callback));
                return Ok(());
            }
        }
        callback()
    }

    /// Stores `value`, marks the promise done and runs every registered callback in
    /// registration order.
    ///
    /// A second call fails with [`Error::AlreadyCompleted`] and leaves the first value in
    /// place. If a callback fails, the remaining ones are skipped and the error is
    /// returned.
    pub fn set_result(&self, value: T) -> Result<()> {
        let (callbacks, wakers) = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, State::Done(value)) {
                State::Pending { callbacks, wakers } => (callbacks, wakers),
                previous @ State::Done(_) => {
                    *state = previous;
                    return Err(Error::AlreadyCompleted);
                }
            }
        };

        log::trace!("promise completed, notifying {} callback(s)", callbacks.len());
        for waker in wakers {
            waker.wake();
        }
        for callback in callbacks {
            callback()?;
        }
        Ok(())
    }
}

impl<T: Clone> Promise<T> {
    /// Returns a copy of the stored value, or [`Error::NotReady`] while pending.
    pub fn result(&self) -> Result<T> {
        match &*self.state.borrow() {
            State::Done(value) => Ok(value.clone()),
            State::Pending { .. } => Err(Error::NotReady),
        }
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// Like [`Promise::add_done_callback`], but hands the result to `callback`.
    ///
    /// The registered callback only holds a weak reference to the promise, so a callback
    /// that ends up owning the promise again does not keep it alive.
    pub(crate) fn add_result_callback(
        &self,
        callback: impl FnOnce(T) -> Result<()> + 'static,
    ) -> Result<()> {
        let state: Weak<RefCell<State<T>>> = Rc::downgrade(&self.state);
        self.add_done_callback(move || {
            let state = state.upgrade().ok_or(Error::NotReady)?;
            callback(Promise { state }.result()?)
        })
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            State::Done(value) => f.debug_tuple("Promise::Done").field(value).finish(),
            State::Pending { callbacks, .. } => f
                .debug_struct("Promise::Pending")
                .field("callbacks", &callbacks.len())
                .finish(),
        }
    }
}

/// Lets a promise be consumed by any `std` executor.
///
/// Polling never drives the event loop; a pending promise only records the waker of every
/// task polling it and wakes them all from [`Promise::set_result`].
impl<T: Clone> Future for Promise<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Done(value) => Poll::Ready(value.clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
