use std::time::{Duration, Instant};

use coroloop::{Coroutine, EventLoop, Invocation, Resume, Step, Wakeup, coroutine, sleep};

// Sleeps 2s, 2s, 1s, 1s, reporting each wakeup.
struct Naps {
    start: Instant,
    naps: [u64; 4],
    next: usize,
}

impl Coroutine for Naps {
    type Output = ();

    fn resume(&mut self, input: Resume) -> coroloop::Result<Step<()>> {
        match input {
            Resume::Start => println!("{:>8.3?} begin naps", self.start.elapsed()),
            Resume::Value(value) => {
                let wakeup: Wakeup = value.take()?;
                println!("{:>8.3?} {}. woke up: {wakeup}", self.start.elapsed(), self.next);
            }
        }

        let Some(secs) = self.naps.get(self.next) else {
            println!("{:>8.3?} end naps", self.start.elapsed());
            return Ok(Step::Return(()));
        };
        self.next += 1;
        Ok(Step::awaiting(sleep(Duration::from_secs(*secs))))
    }
}

fn interrupt(start: Instant, message: &'static str) -> impl FnOnce() -> coroloop::Result<()> {
    move || {
        println!("{:>8.3?} hello, {message}!", start.elapsed());
        Ok(())
    }
}

fn main() -> coroloop::Result<()> {
    let event_loop = EventLoop::instance();
    let start = Instant::now();

    let naps = coroutine::wrap(move |()| {
        Invocation::Suspend(Naps {
            start,
            naps: [2, 2, 1, 1],
            next: 0,
        })
    });

    event_loop.call_soon(move || naps(()).map(drop));
    event_loop.call_soon(interrupt(start, "sorry to interrupt"));
    event_loop.schedule(
        interrupt(start, "sorry to interrupt, again"),
        Duration::from_secs(3),
    );

    println!("{:>8.3?} event loop start", start.elapsed());
    event_loop.run()?;
    println!("{:>8.3?} event loop end", start.elapsed());
    Ok(())
}
