use std::time::{Duration, Instant};

use coroloop::EventLoop;

fn hello(start: Instant, someone: &'static str) -> impl FnOnce() -> coroloop::Result<()> {
    move || {
        println!("{:>8.3?} hello, {someone}!", start.elapsed());
        Ok(())
    }
}

fn main() -> coroloop::Result<()> {
    let event_loop = EventLoop::instance();
    let start = Instant::now();

    // Scheduled in this order, fired by due time.
    event_loop.schedule(hello(start, "1"), Duration::from_secs(1));
    event_loop.schedule(hello(start, "3"), Duration::from_secs(3));
    event_loop.schedule(hello(start, "5"), Duration::from_secs(5));

    event_loop.run()
}
