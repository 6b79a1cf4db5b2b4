//! Time source used by the upload engine's timed waits.
//!
//! All bounded waits in the engine are polling loops that ask a [`Clock`]
//! how much time has passed, so tests can drive them without real delays.

use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;

    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration);

    /// Time elapsed since `start`, where `start` came from [`Clock::now`].
    fn since(&self, start: Duration) -> Duration {
        self.now().saturating_sub(start)
    }
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}
