//! A minimal single-threaded cooperative scheduler.
//!
//! `coroloop` lets sequential-looking code suspend on timers without blocking other
//! pending work. It is made of a few small pieces:
//! - An [`EventLoop`] that runs deferred callbacks in due-time order on one thread
//! - A [`Promise`], a write-once result slot that notifies callbacks when it completes
//! - [`Coroutine`]s, explicit state machines that suspend by awaiting promises and are
//!   driven across suspension points by an internal runner
//! - [`coroutine::wrap`], which turns a coroutine body into a call that returns a
//!   promise immediately
//! - [`sleep`], the timer primitive every suspension ultimately bottoms out in
//!
//! There is no I/O polling, no threading and no cancellation. Fatal misuse (reading a
//! pending promise, completing one twice) surfaces as an [`Error`] that propagates out
//! of [`EventLoop::run`].

pub mod coroutine;
pub mod error;
pub mod event_loop;
pub mod promise;
mod runner;
pub mod timing;

pub use coroutine::{Awaiting, Coroutine, Invocation, Resume, Step, Value};
pub use error::{Error, Result};
pub use event_loop::{Builder, EventLoop};
pub use promise::Promise;
pub use timing::{Wakeup, sleep};
