//! Suspendable computations and the wrapper that turns them into promise-returning calls.
//!
//! A coroutine is written as an explicit state machine implementing [`Coroutine`]. Each
//! call to [`Coroutine::resume`] advances it to its next suspension point, where it
//! returns [`Step::Await`] with the promise it wants to wait on, or finishes with
//! [`Step::Return`]. When the awaited promise completes, the coroutine is resumed with a
//! [`Value`] holding that promise's result.
//!
//! ```
//! use std::time::Duration;
//!
//! use coroloop::{EventLoop, Resume, Step, Wakeup, coroutine};
//!
//! let event_loop = EventLoop::new();
//! let timers = event_loop.clone();
//! let mut naps = 0;
//!
//! let promise = coroutine::spawn(coroutine::from_fn(move |resume| {
//!     if let Resume::Value(value) = resume {
//!         value.take::<Wakeup>()?;
//!         naps += 1;
//!     }
//!     Ok(if naps < 2 {
//!         Step::awaiting(timers.sleep(Duration::from_millis(1)))
//!     } else {
//!         Step::Return(naps)
//!     })
//! }))
//! .unwrap();
//!
//! assert_eq!(event_loop.run_until_complete(&promise), Ok(2));
//! ```

use std::{any::Any, fmt};

use crate::{
    error::{Error, Result},
    promise::Promise,
    runner::Runner,
};

/// A type-erased result of an awaited promise.
pub struct Value(Box<dyn Any>);

impl Value {
    pub(crate) fn new<T: 'static>(value: T) -> Self {
        Value(Box::new(value))
    }

    /// Recovers the value as `T`.
    ///
    /// Fails with [`Error::UnexpectedValue`] if the awaited promise did not hold a `T`.
    pub fn take<T: 'static>(self) -> Result<T> {
        self.0
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::UnexpectedValue {
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Value(..)")
    }
}

// What the runner needs from an awaited promise, independent of its result type.
pub(crate) trait Awaitable {
    fn is_done(&self) -> bool;
    fn add_value_callback(&self, callback: ValueCallback) -> Result<()>;
    fn value(&self) -> Result<Value>;
}

pub(crate) type ValueCallback = Box<dyn FnOnce(Value) -> Result<()>>;

impl<T: Clone + 'static> Awaitable for Promise<T> {
    fn is_done(&self) -> bool {
        Promise::is_done(self)
    }

    fn add_value_callback(&self, callback: ValueCallback) -> Result<()> {
        self.add_result_callback(move |value| callback(Value::new(value)))
    }

    fn value(&self) -> Result<Value> {
        self.result().map(Value::new)
    }
}

/// A promise a coroutine is suspended on.
///
/// Only promises convert into `Awaiting`, so a coroutine cannot yield anything the
/// runner does not know how to wait for.
pub struct Awaiting(Box<dyn Awaitable>);

impl Awaiting {
    pub(crate) fn is_done(&self) -> bool {
        self.0.is_done()
    }

    // Runs `callback` with the result once the promise completes. The promise itself is
    // not kept alive by the registration.
    pub(crate) fn add_value_callback(&self, callback: ValueCallback) -> Result<()> {
        self.0.add_value_callback(callback)
    }

    pub(crate) fn value(&self) -> Result<Value> {
        self.0.value()
    }
}

impl<T: Clone + 'static> From<Promise<T>> for Awaiting {
    fn from(promise: Promise<T>) -> Self {
        Awaiting(Box::new(promise))
    }
}

impl fmt::Debug for Awaiting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Awaiting")
            .field("done", &self.is_done())
            .finish()
    }
}

/// What a coroutine is resumed with.
#[derive(Debug)]
pub enum Resume {
    /// First call, before any suspension point.
    Start,
    /// Result of the promise the coroutine last awaited.
    Value(Value),
}

/// Outcome of advancing a coroutine by one step.
#[derive(Debug)]
#[must_use]
pub enum Step<T> {
    /// Suspend until the promise completes.
    Await(Awaiting),
    /// Finish with a final value. Used both for falling off the end and for returning
    /// early from the middle of the step sequence.
    Return(T),
}

impl<T> Step<T> {
    pub fn awaiting<U: Clone + 'static>(promise: Promise<U>) -> Self {
        Step::Await(promise.into())
    }
}

/// A computation that can suspend on promises and be resumed with their results.
pub trait Coroutine: 'static {
    type Output: 'static;

    /// Advances to the next suspension point or to completion.
    ///
    /// An error aborts the coroutine; it propagates out of whichever callback resumed
    /// it. Once `Step::Return` has been produced the coroutine is never resumed again.
    fn resume(&mut self, input: Resume) -> Result<Step<Self::Output>>;
}

/// Coroutine backed by a closure, see [`from_fn`].
pub struct FromFn<F>(F);

impl<F, T> Coroutine for FromFn<F>
where
    F: FnMut(Resume) -> Result<Step<T>> + 'static,
    T: 'static,
{
    type Output = T;

    fn resume(&mut self, input: Resume) -> Result<Step<T>> {
        (self.0)(input)
    }
}

/// Builds a coroutine from a closure that keeps its own state across calls.
pub fn from_fn<F, T>(f: F) -> FromFn<F>
where
    F: FnMut(Resume) -> Result<Step<T>> + 'static,
{
    FromFn(f)
}

/// Starts `coroutine` and returns the promise its final value will be delivered to.
///
/// The coroutine runs synchronously up to its first suspension on a pending promise. If it
/// finishes before that, the returned promise is already done.
pub fn spawn<C: Coroutine>(mut coroutine: C) -> Result<Promise<C::Output>> {
    let result = Promise::new();
    match coroutine.resume(Resume::Start)? {
        Step::Return(output) => result.set_result(output)?,
        Step::Await(first) => Runner::start(coroutine, result.clone(), first)?,
    }
    Ok(result)
}

/// What a wrapped body produces when it is called.
pub enum Invocation<C: Coroutine> {
    /// The body finished without suspending, either with a plain value or by returning
    /// early.
    Return(C::Output),
    /// The body is a multi-step computation to be driven by a runner.
    Suspend(C),
}

/// Wraps `body` into a callable that always returns a promise immediately.
///
/// Bodies that return [`Invocation::Return`] produce an already-done promise. Bodies that
/// return [`Invocation::Suspend`] are started with [`spawn`].
///
/// ```
/// use coroloop::{Invocation, Resume, Step, coroutine::{self, FromFn}};
///
/// type Never = FromFn<fn(Resume) -> coroloop::Result<Step<u32>>>;
///
/// let double = coroutine::wrap(|n: u32| Invocation::<Never>::Return(n * 2));
/// assert_eq!(double(21).unwrap().result(), Ok(42));
/// ```
pub fn wrap<A, C, B>(body: B) -> impl Fn(A) -> Result<Promise<C::Output>>
where
    C: Coroutine,
    B: Fn(A) -> Invocation<C>,
{
    move |args| match body(args) {
        Invocation::Return(output) => Ok(Promise::resolved(output)),
        Invocation::Suspend(coroutine) => spawn(coroutine),
    }
}
