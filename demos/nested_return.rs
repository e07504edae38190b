use std::time::Duration;

use coroloop::{EventLoop, Invocation, Resume, Step, coroutine, sleep};

fn main() -> coroloop::Result<()> {
    // Naps once, then returns early with a value.
    let returning = coroutine::wrap(|()| {
        Invocation::Suspend(coroutine::from_fn(|resume| match resume {
            Resume::Start => Ok(Step::awaiting(sleep(Duration::from_secs(1)))),
            Resume::Value(_) => {
                println!("woke up");
                Ok(Step::Return("something"))
            }
        }))
    });

    let invoking = coroutine::wrap(move |()| {
        let mut child = Some(returning(()));
        Invocation::Suspend(coroutine::from_fn(move |resume| match resume {
            Resume::Start => match child.take() {
                Some(promise) => Ok(Step::awaiting(promise?)),
                None => unreachable!("started once"),
            },
            Resume::Value(value) => {
                println!("coroutine returned {:?}", value.take::<&str>()?);
                Ok(Step::Return(()))
            }
        }))
    });

    let event_loop = EventLoop::instance();
    let promise = invoking(())?;
    event_loop.run_until_complete(&promise)
}
