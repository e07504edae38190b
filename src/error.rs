use thiserror::Error;

/// Errors raised by promises, coroutines and the event loop.
///
/// None of these are recoverable conditions. They describe a misuse of the API and
/// terminate whatever callback observed them; [`EventLoop::run`](crate::EventLoop::run)
/// hands them back to the caller unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The result of a promise was requested before it was set.
    #[error("promise is not done yet")]
    NotReady,

    /// A promise was completed a second time.
    #[error("promise result has already been set")]
    AlreadyCompleted,

    /// A coroutine took its resume value as a type it was not produced with.
    #[error("resume value is not of the expected type `{expected}`")]
    UnexpectedValue { expected: &'static str },

    /// The event loop was asked to run from inside one of its own callbacks.
    #[error("event loop is already running")]
    AlreadyRunning,

    /// The event loop ran out of work while a promise was still pending.
    #[error("event loop drained before the promise completed")]
    Stalled,
}

pub type Result<T> = std::result::Result<T, Error>;
