use std::{
    cell::RefCell,
    rc::Rc,
    time::{Duration, Instant},
};

use coroloop::{
    Coroutine, Error, EventLoop, Invocation, Promise, Resume, Step, Wakeup,
    coroutine::{self, from_fn},
};

// Sleeps for each of `naps` in turn and records every wakeup it is resumed with.
struct Naps {
    event_loop: EventLoop,
    naps: Vec<Duration>,
    next: usize,
    wakeups: Rc<RefCell<Vec<Wakeup>>>,
}

impl Naps {
    fn new(event_loop: &EventLoop, naps: &[u64], wakeups: &Rc<RefCell<Vec<Wakeup>>>) -> Self {
        Naps {
            event_loop: event_loop.clone(),
            naps: naps.iter().copied().map(Duration::from_millis).collect(),
            next: 0,
            wakeups: Rc::clone(wakeups),
        }
    }
}

impl Coroutine for Naps {
    type Output = usize;

    fn resume(&mut self, input: Resume) -> coroloop::Result<Step<usize>> {
        if let Resume::Value(value) = input {
            self.wakeups.borrow_mut().push(value.take()?);
        }
        match self.naps.get(self.next) {
            Some(nap) => {
                self.next += 1;
                Ok(Step::awaiting(self.event_loop.sleep(*nap)))
            }
            None => Ok(Step::Return(self.next)),
        }
    }
}

#[test]
fn coroutine_resumes_with_each_sleep_result() {
    let event_loop = EventLoop::new();
    let wakeups = Rc::new(RefCell::new(Vec::new()));
    let start = Instant::now();

    let promise = coroutine::spawn(Naps::new(&event_loop, &[10, 20], &wakeups)).unwrap();
    assert!(promise.is_pending(), "Spawn should return at the first suspension");

    event_loop.run().unwrap();

    assert_eq!(promise.result(), Ok(2));
    assert!(start.elapsed() >= Duration::from_millis(30));
    let wakeups = wakeups.borrow();
    assert_eq!(wakeups.len(), 2, "Coroutine should be resumed once per sleep");
    assert!(wakeups[0].slept() >= Duration::from_millis(10));
    assert!(wakeups[1].slept() >= Duration::from_millis(20));
    assert!(wakeups[0].fired_at <= wakeups[1].scheduled_at);
}

#[test]
fn coroutine_interleaves_with_other_callbacks() {
    let event_loop = EventLoop::new();
    let wakeups = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::new(RefCell::new(Vec::new()));
    let done_at = Rc::new(RefCell::new(None));

    let wrapped = {
        let event_loop = event_loop.clone();
        let wakeups = Rc::clone(&wakeups);
        coroutine::wrap(move |naps: &'static [u64]| {
            Invocation::Suspend(Naps::new(&event_loop, naps, &wakeups))
        })
    };

    let scheduled_at = Instant::now();
    let spawner_done = Rc::clone(&done_at);
    let spawner_log = Rc::clone(&log);
    event_loop.call_soon(move || {
        let promise = wrapped(&[20, 20, 10, 10])?;
        let observed = promise.clone();
        promise.add_done_callback(move || {
            spawner_log.borrow_mut().push("coroutine done");
            *spawner_done.borrow_mut() = Some((Instant::now(), observed.result()?));
            Ok(())
        })
    });
    let interrupt_log = Rc::clone(&log);
    event_loop.call_soon(move || {
        interrupt_log.borrow_mut().push("interrupt");
        Ok(())
    });
    let again_log = Rc::clone(&log);
    event_loop.schedule(
        move || {
            again_log.borrow_mut().push("interrupt again");
            Ok(())
        },
        Duration::from_millis(30),
    );

    event_loop.run().unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["interrupt", "interrupt again", "coroutine done"],
        "Other callbacks should run while the coroutine sleeps"
    );
    let (finished, naps) = done_at.borrow().expect("Coroutine should have finished");
    assert_eq!(naps, 4);
    assert!(finished >= scheduled_at + Duration::from_millis(60));

    let wakeups = wakeups.borrow();
    assert_eq!(wakeups.len(), 4);
    assert!(
        wakeups.windows(2).all(|w| w[0].fired_at < w[1].fired_at),
        "Resumptions should observe increasing timestamps"
    );
}

#[test]
fn coroutine_awaits_nested_coroutine_with_early_return() {
    let event_loop = EventLoop::new();

    let returning = Rc::new({
        let event_loop = event_loop.clone();
        coroutine::wrap(move |()| {
            let event_loop = event_loop.clone();
            Invocation::Suspend(from_fn(move |resume| match resume {
                Resume::Start => Ok(Step::awaiting(event_loop.sleep(Duration::from_millis(5)))),
                Resume::Value(_) => Ok(Step::Return("something")),
            }))
        })
    });

    let invoking = coroutine::wrap(move |()| {
        let returning = Rc::clone(&returning);
        Invocation::Suspend(from_fn(move |resume| match resume {
            Resume::Start => Ok(Step::awaiting(returning(())?)),
            Resume::Value(value) => Ok(Step::Return(value.take::<&str>()?)),
        }))
    });

    let promise = invoking(()).unwrap();
    assert_eq!(event_loop.run_until_complete(&promise), Ok("something"));
}

#[test]
fn coroutine_immediate_completion_is_done() {
    type Body = coroutine::FromFn<fn(Resume) -> coroloop::Result<Step<i32>>>;

    let plain = coroutine::wrap(|n: i32| Invocation::<Body>::Return(n + 1));
    let promise = plain(1).unwrap();
    assert!(promise.is_done(), "Plain value should complete synchronously");
    assert_eq!(promise.result(), Ok(2));

    let finishes_at_start = coroutine::wrap(|n: i32| {
        Invocation::Suspend(from_fn(move |_| Ok(Step::Return(n * 3))))
    });
    let promise = finishes_at_start(4).unwrap();
    assert!(promise.is_done(), "Coroutine without suspension completes synchronously");
    assert_eq!(promise.result(), Ok(12));
}

#[test]
fn coroutine_continues_through_done_promises_without_the_loop() {
    let event_loop = EventLoop::new();
    let steps = Rc::new(RefCell::new(0));
    let steps_cl = Rc::clone(&steps);

    let promise = coroutine::spawn(from_fn(move |resume| {
        if let Resume::Value(value) = resume {
            *steps_cl.borrow_mut() += value.take::<i32>()?;
        }
        Ok(if *steps_cl.borrow() < 3 {
            Step::awaiting(Promise::resolved(1))
        } else {
            Step::Return(())
        })
    }))
    .unwrap();

    assert!(promise.is_done(), "Already done awaits must not suspend");
    assert_eq!(*steps.borrow(), 3);
    assert!(event_loop.is_empty());
}

#[test]
fn coroutine_falling_off_the_end_returns_unit() {
    let event_loop = EventLoop::new();
    let timers = event_loop.clone();

    let promise = coroutine::spawn(from_fn(move |resume| match resume {
        Resume::Start => Ok(Step::awaiting(timers.sleep(Duration::from_millis(1)))),
        Resume::Value(_) => Ok(Step::Return(())),
    }))
    .unwrap();

    assert_eq!(event_loop.run_until_complete(&promise), Ok(()));
}

#[test]
fn coroutine_error_propagates_out_of_run() {
    let event_loop = EventLoop::new();
    let timers = event_loop.clone();

    let promise = coroutine::spawn(from_fn(move |resume| match resume {
        Resume::Start => Ok(Step::awaiting(timers.sleep(Duration::from_millis(1)))),
        Resume::Value(value) => Ok(Step::Return(value.take::<String>()?)),
    }))
    .unwrap();

    assert!(matches!(
        event_loop.run(),
        Err(Error::UnexpectedValue { .. })
    ));
    assert!(promise.is_pending(), "Failed coroutine never completes its promise");
}

struct DropFlag(Rc<RefCell<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        *self.0.borrow_mut() = true;
    }
}

#[test]
fn coroutine_freed_when_awaited_promise_is_dropped() {
    let dropped = Rc::new(RefCell::new(false));
    let flag = DropFlag(Rc::clone(&dropped));
    let gate: Promise<()> = Promise::new();
    let mut pending = Some(gate.clone());

    let promise = coroutine::spawn(from_fn(move |resume| {
        let _held = &flag;
        match (resume, pending.take()) {
            (Resume::Start, Some(gate)) => Ok(Step::awaiting(gate)),
            _ => Ok(Step::Return(())),
        }
    }))
    .unwrap();
    assert!(promise.is_pending());
    assert!(!*dropped.borrow(), "Coroutine waits while the promise is alive");

    drop(gate);
    drop(promise);
    assert!(
        *dropped.borrow(),
        "Coroutine should not outlive the promise it was waiting on"
    );
}

#[test]
fn coroutine_inspects_mixed_resume_values() {
    let event_loop = EventLoop::new();
    let timers = event_loop.clone();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_cl = Rc::clone(&seen);
    let mut awaited = 0;

    let promise = coroutine::spawn(from_fn(move |resume| {
        if let Resume::Value(value) = resume {
            if value.is::<Wakeup>() {
                seen_cl.borrow_mut().push("wakeup".to_string());
            } else if let Some(n) = value.downcast_ref::<u32>() {
                seen_cl.borrow_mut().push(format!("number {n}"));
            }
        }
        awaited += 1;
        Ok(match awaited {
            1 => Step::awaiting(timers.sleep(Duration::from_millis(1))),
            2 => Step::awaiting(Promise::resolved(7_u32)),
            _ => Step::Return(awaited - 1),
        })
    }))
    .unwrap();

    assert_eq!(event_loop.run_until_complete(&promise), Ok(2));
    assert_eq!(*seen.borrow(), vec!["wakeup", "number 7"]);
}
