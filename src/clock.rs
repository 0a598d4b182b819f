use std::time::Instant;

/// Source of monotonic, non-decreasing time in nanoseconds.
///
/// The absolute value is meaningless, only differences between two readings
/// of the same clock are.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Reads time from the OS monotonic clock.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos().min(u64::MAX as u128) as u64
    }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// A clock that moves only when told to.
    /// Clones share the same time, so a test can keep one handle
    /// and give another to the code under test.
    #[derive(Clone, Debug, Default)]
    pub struct ManualClock {
        nanos: Arc<AtomicU64>,
    }

    impl ManualClock {
        pub fn advance(&self, d: Duration) {
            let nanos = u64::try_from(d.as_nanos()).unwrap();
            self.nanos.fetch_add(nanos, Ordering::SeqCst);
        }

        pub fn advance_nanos(&self, nanos: u64) {
            self.nanos.fetch_add(nanos, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> u64 {
            self.nanos.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Clock, ManualClock, MonotonicClock};
    use more_asserts::assert_ge;
    use std::time::Duration;

    #[test]
    fn test_monotonic_clock_does_not_go_back() {
        let clock = MonotonicClock::default();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(1));
        let t2 = clock.now();
        assert_ge!(t2 - t1, 1_000_000);
    }

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::default();
        let other = clock.clone();
        clock.advance(Duration::from_millis(5));
        other.advance_nanos(1);
        assert_eq!(clock.now(), 5_000_001);
        assert_eq!(other.now(), 5_000_001);
    }
}
