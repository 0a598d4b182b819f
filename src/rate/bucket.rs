use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of events that happened in one time slice of a rate window.
/// The start time is fixed at creation, the count only grows.
#[derive(Debug)]
pub struct Bucket {
    start: u64,
    count: AtomicU64,
}

impl Bucket {
    pub fn new(start: u64) -> Bucket {
        Bucket {
            start,
            count: AtomicU64::new(0),
        }
    }

    /// Creation time, in nanoseconds of the clock that created the bucket
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Nanoseconds elapsed since the bucket was created.
    /// Returns 0 if `now` is earlier than the start.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.start)
    }
}

impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bucket [start={}, count={}]", self.start, self.count())
    }
}
