//! Monotonic clock used by the event pump, the animation engine and the
//! timer heap. A single [`Clock`] is owned by the root context and handed
//! out by reference so that tests can substitute a fake one without
//! threading a trait generic through every subsystem that reads the time.

use std::time::{Duration, Instant};

/// Milliseconds since the clock was created.
pub type Millis = u64;

/// A monotonic source of milliseconds, anchored at construction time.
///
/// The original keeps a microsecond epoch for the same purpose (used to
/// seed default [`crate::group::GroupId`] values); [`Clock::micros`] is
/// kept for that one caller and otherwise everything downstream works in
/// milliseconds, matching the animation engine's frame-rate math.
#[derive(Debug, Clone)]
pub struct Clock {
    epoch: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a new clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Milliseconds elapsed since this clock was created.
    pub fn millis(&self) -> Millis {
        self.epoch.elapsed().as_millis() as Millis
    }

    /// Microseconds elapsed since this clock was created.
    pub fn micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Sleep the calling thread for the given duration. Only used by the
    /// non-blocking paths in tests and by the fork-child init-window
    /// stub; the event pump itself suspends in `select()`, never here.
    pub fn sleep(d: Duration) {
        std::thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_is_monotonic() {
        let c = Clock::new();
        let a = c.millis();
        std::thread::sleep(Duration::from_millis(5));
        let b = c.millis();
        assert!(b >= a);
    }
}
