//! Drives a suspended coroutine to completion.
//!
//! The runner owns the coroutine and the promise its final value goes to. Whenever the
//! coroutine suspends on a pending promise, the runner registers itself as that promise's
//! completion callback; the callback holds the only strong reference, which keeps the
//! runner alive between steps and lets it go once the coroutine finishes.

use std::{cell::RefCell, rc::Rc};

use crate::{
    coroutine::{Awaiting, Coroutine, Resume, Step, Value},
    error::Result,
    promise::Promise,
};

// Holds no reference to the promise being awaited. The only link between the two is the
// callback registered on that promise, so a wait that is abandoned frees the runner
// together with the promise.
pub(crate) struct Runner<C: Coroutine> {
    coroutine: C,
    result: Promise<C::Output>,
}

impl<C: Coroutine> Runner<C> {
    /// Takes over a coroutine that has already been started and yielded `first`.
    ///
    /// If `first` is already done the coroutine keeps running right away, possibly all the
    /// way to completion, before this returns.
    pub(crate) fn start(coroutine: C, result: Promise<C::Output>, first: Awaiting) -> Result<()> {
        let runner = Rc::new(RefCell::new(Runner { coroutine, result }));
        if let Some(value) = Self::handle_yield(&runner, first)? {
            Self::run(&runner, value)?;
        }
        Ok(())
    }

    // Returns the result right away if the promise is already done, so the coroutine can
    // continue without giving the thread back to the loop. Otherwise registers `run` to be
    // called with the result later and returns `None`.
    fn handle_yield(this: &Rc<RefCell<Self>>, awaiting: Awaiting) -> Result<Option<Value>> {
        if awaiting.is_done() {
            return awaiting.value().map(Some);
        }

        log::trace!("coroutine suspended");
        let resume = Rc::clone(this);
        awaiting.add_value_callback(Box::new(move |value| Self::run(&resume, value)))?;
        Ok(None)
    }

    // Feeds the awaited result back into the coroutine, repeating for as long as it keeps
    // yielding promises that are already done.
    fn run(this: &Rc<RefCell<Self>>, mut value: Value) -> Result<()> {
        loop {
            log::trace!("coroutine resumed");
            let step = this.borrow_mut().coroutine.resume(Resume::Value(value))?;

            match step {
                Step::Return(output) => {
                    let result = this.borrow().result.clone();
                    log::trace!("coroutine finished");
                    return result.set_result(output);
                }
                Step::Await(next) => match Self::handle_yield(this, next)? {
                    Some(next_value) => value = next_value,
                    None => return Ok(()),
                },
            }
        }
    }
}
