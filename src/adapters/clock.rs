//! Wall-clock adapter for the [`Clock`] port.
//!
//! Blocks the calling thread.  Also tracks time since construction so the
//! control tool can report how long a run took.

use std::time::{Duration, Instant};

use crate::app::ports::Clock;

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since this clock was created (monotonic).
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
