//! Approximate event rate over a sliding time window.
//!
//! The window is split into a fixed number of time slices (buckets) kept in a ring.
//! Recording an event increments the newest bucket under a shared lock,
//! so counting threads never block each other. Only when the newest bucket gets older
//! than one slice, the counting thread takes the exclusive lock and
//! replaces the oldest bucket with a fresh one.
//! Reading the rate sums the buckets that are still inside the window.
//!
//! Old data decays: a bucket stops contributing once its start time falls out of the window.

use std::cmp::min;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::clock::{Clock, MonotonicClock};
use crate::time_unit::TimeUnit;
use bucket::Bucket;

pub mod bucket;

/// Number of slices the rate window is divided into
pub const BUCKET_COUNT: usize = 10;

/// Fixed capacity ring of buckets.
/// Slots past `slots.len()` have never been used and hold no data yet.
#[derive(Debug)]
struct Ring {
    slots: Vec<Bucket>,
    newest: usize,
}

impl Ring {
    fn new(first: Bucket) -> Ring {
        let mut slots = Vec::with_capacity(BUCKET_COUNT);
        slots.push(first);
        Ring { slots, newest: 0 }
    }

    fn newest(&self) -> &Bucket {
        &self.slots[self.newest]
    }

    /// Makes `bucket` the newest one, overwriting the oldest slot once the ring is full.
    fn rotate(&mut self, bucket: Bucket) {
        self.newest = (self.newest + 1) % BUCKET_COUNT;
        if self.newest == self.slots.len() {
            self.slots.push(bucket);
        } else {
            self.slots[self.newest] = bucket;
        }
    }

    /// Iterates used slots from the newest to the oldest, visiting each slot once.
    fn recent_first(&self) -> impl Iterator<Item = &Bucket> + '_ {
        let len = self.slots.len();
        (0..len).map(move |i| &self.slots[(self.newest + len - i) % len])
    }
}

/// Thread-safe counter of events per unit of time over the last `duration` units.
#[derive(Debug)]
pub struct SlidingRate<C: Clock = MonotonicClock> {
    ring: RwLock<Ring>,
    clock: C,
    rate_unit: TimeUnit,
    rate_duration: u64,
    /// Window length in nanoseconds, saturated at `u64::MAX`
    window: u64,
    bucket_duration: u64,
}

impl SlidingRate<MonotonicClock> {
    /// Creates a rate spanning `duration` units of `unit`,
    /// measured with the OS monotonic clock.
    pub fn new(duration: u64, unit: TimeUnit) -> Self {
        Self::with_clock(duration, unit, MonotonicClock::default())
    }
}

impl<C: Clock> SlidingRate<C> {
    pub fn with_clock(duration: u64, unit: TimeUnit, clock: C) -> Self {
        let window = unit.to_nanos(duration);
        let first = Bucket::new(clock.now());
        SlidingRate {
            ring: RwLock::new(Ring::new(first)),
            clock,
            rate_unit: unit,
            rate_duration: duration,
            window,
            bucket_duration: window / BUCKET_COUNT as u64,
        }
    }

    /// The unit the window length and the rate are expressed in
    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    /// Length of the window, in `rate_unit()`
    pub fn rate_duration(&self) -> u64 {
        self.rate_duration
    }

    /// Records a single event.
    pub fn count(&self) {
        {
            let ring = self.read();
            let newest = ring.newest();
            if !self.is_stale(newest, self.clock.now()) {
                newest.increment();
                return;
            }
        }
        self.rotate_if_stale();
        // The bucket might have been rotated again since we released the exclusive lock.
        // Incrementing whatever is the newest now keeps the event in the window.
        self.read().newest().increment();
    }

    /// Returns the average number of events per `rate_unit()` in the window,
    /// or NaN if no event was recorded within the window.
    ///
    /// The newest bucket contributes only the time elapsed since its creation,
    /// so right after creation or after a long pause the rate is averaged over
    /// less than the full window.
    pub fn rate(&self) -> f64 {
        let now = self.clock.now();
        let (count, elapsed) = {
            let ring = self.read();
            ring.recent_first()
                .take_while(|b| b.start().saturating_add(self.window) >= now)
                .fold((0u64, 0u64), |(count, elapsed), b| {
                    (
                        count + b.count(),
                        elapsed.saturating_add(min(self.bucket_duration, b.age(now))),
                    )
                })
        };
        if count == 0 || elapsed == 0 {
            return f64::NAN;
        }
        count as f64 / elapsed as f64 * self.rate_unit.nanos_per_unit() as f64
    }

    fn is_stale(&self, bucket: &Bucket, now: u64) -> bool {
        bucket.age(now) >= self.bucket_duration
    }

    /// Checks the newest bucket again under the exclusive lock,
    /// because other threads could have rotated it in the meantime.
    fn rotate_if_stale(&self) {
        let mut ring = self.write();
        let now = self.clock.now();
        if self.is_stale(ring.newest(), now) {
            trace!(expired = %ring.newest(), slot = (ring.newest + 1) % BUCKET_COUNT, "Rotating rate bucket");
            ring.rotate(Bucket::new(now));
        }
    }

    // Nothing panics while holding the lock, so a poisoned lock still guards a valid ring.
    fn read(&self) -> RwLockReadGuard<'_, Ring> {
        self.ring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ring> {
        self.ring.write().unwrap_or_else(PoisonError::into_inner)
    }
}
