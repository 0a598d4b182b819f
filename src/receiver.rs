//! Statistics of events received from the cache replication channel.
//!
//! Every event kind has a lifetime counter. Data-carrying events (puts and removes)
//! additionally have a sliding window rate. Bootstrap events are rare enough
//! that only their counts are interesting.

use atomic_counter::{AtomicCounter, RelaxedCounter};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::rate::SlidingRate;
use crate::time_unit::TimeUnit;

/// Rates reported by `ReceiverStats::default()` are averaged over the last minute
const DEFAULT_WINDOW_SECS: u64 = 60;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Put,
    RemoveExisting,
    RemoveNotExisting,
    RemoveAll,
    BootstrapRequest,
    BootstrapResponse,
    BootstrapComplete,
    BootstrapIncomplete,
}

impl EventKind {
    /// Returns true if the rate of this kind of events is tracked
    pub fn is_rated(self) -> bool {
        matches!(
            self,
            EventKind::Put
                | EventKind::RemoveExisting
                | EventKind::RemoveNotExisting
                | EventKind::RemoveAll
        )
    }
}

/// Write side of the statistics, called by the replication receiver.
pub trait ReceiverStatsCounter {
    fn record(&self, kind: EventKind);

    fn count_put(&self) {
        self.record(EventKind::Put)
    }
    /// A remove event arrived and the local element existed
    fn count_remove_existing(&self) {
        self.record(EventKind::RemoveExisting)
    }
    /// A remove event arrived but the local element did not exist
    fn count_remove_not_existing(&self) {
        self.record(EventKind::RemoveNotExisting)
    }
    fn count_remove_all(&self) {
        self.record(EventKind::RemoveAll)
    }
    fn count_bootstrap_request(&self) {
        self.record(EventKind::BootstrapRequest)
    }
    fn count_bootstrap_response(&self) {
        self.record(EventKind::BootstrapResponse)
    }
    fn count_bootstrap_complete(&self) {
        self.record(EventKind::BootstrapComplete)
    }
    fn count_bootstrap_incomplete(&self) {
        self.record(EventKind::BootstrapIncomplete)
    }
}

/// Read side of the statistics, used by monitoring.
pub trait ReceiverStatsView {
    /// Number of events of given kind received since creation
    fn event_count(&self, kind: EventKind) -> u64;
    /// Events of given kind per rate unit, NaN if not tracked or no recent data
    fn event_rate(&self, kind: EventKind) -> f64;

    fn put_count(&self) -> u64 {
        self.event_count(EventKind::Put)
    }
    fn put_rate(&self) -> f64 {
        self.event_rate(EventKind::Put)
    }
    fn remove_existing_count(&self) -> u64 {
        self.event_count(EventKind::RemoveExisting)
    }
    fn remove_existing_rate(&self) -> f64 {
        self.event_rate(EventKind::RemoveExisting)
    }
    fn remove_not_existing_count(&self) -> u64 {
        self.event_count(EventKind::RemoveNotExisting)
    }
    fn remove_not_existing_rate(&self) -> f64 {
        self.event_rate(EventKind::RemoveNotExisting)
    }
    fn remove_all_count(&self) -> u64 {
        self.event_count(EventKind::RemoveAll)
    }
    fn remove_all_rate(&self) -> f64 {
        self.event_rate(EventKind::RemoveAll)
    }
    fn bootstrap_request_count(&self) -> u64 {
        self.event_count(EventKind::BootstrapRequest)
    }
    fn bootstrap_response_count(&self) -> u64 {
        self.event_count(EventKind::BootstrapResponse)
    }
    fn bootstrap_complete_count(&self) -> u64 {
        self.event_count(EventKind::BootstrapComplete)
    }
    fn bootstrap_incomplete_count(&self) -> u64 {
        self.event_count(EventKind::BootstrapIncomplete)
    }
}

struct EventCounter {
    total: RelaxedCounter,
    rate: Option<SlidingRate>,
}

/// Counts and rates of all kinds of replication events.
/// Safe to share between threads.
pub struct ReceiverStats {
    counters: Vec<EventCounter>,
    rate_unit: TimeUnit,
    rate_duration: u64,
}

impl ReceiverStats {
    pub fn new(window: u64, unit: TimeUnit) -> Self {
        let counters = EventKind::iter()
            .map(|kind| EventCounter {
                total: RelaxedCounter::new(0),
                rate: kind.is_rated().then(|| SlidingRate::new(window, unit)),
            })
            .collect();
        ReceiverStats {
            counters,
            rate_unit: unit,
            rate_duration: window,
        }
    }

    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    pub fn rate_duration(&self) -> u64 {
        self.rate_duration
    }

    fn counter(&self, kind: EventKind) -> &EventCounter {
        &self.counters[kind as usize]
    }

    /// Captures the current counts and rates of all event kinds
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            timestamp_ms: Utc::now().timestamp_millis(),
            rate_unit: self.rate_unit,
            rate_duration: self.rate_duration,
            events: EventKind::iter()
                .map(|kind| EventSnapshot {
                    kind,
                    count: self.event_count(kind),
                    rate: not_nan(self.event_rate(kind)),
                })
                .collect(),
        }
    }
}

impl Default for ReceiverStats {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS, TimeUnit::Seconds)
    }
}

impl ReceiverStatsCounter for ReceiverStats {
    fn record(&self, kind: EventKind) {
        let counter = self.counter(kind);
        counter.total.inc();
        if let Some(rate) = &counter.rate {
            rate.count();
        }
    }
}

impl ReceiverStatsView for ReceiverStats {
    fn event_count(&self, kind: EventKind) -> u64 {
        self.counter(kind).total.get() as u64
    }

    fn event_rate(&self, kind: EventKind) -> f64 {
        match &self.counter(kind).rate {
            Some(rate) => rate.rate(),
            None => f64::NAN,
        }
    }
}

/// Converts NaN to None.
fn not_nan(x: f64) -> Option<f64> {
    if x.is_nan() {
        None
    } else {
        Some(x)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub kind: EventKind,
    pub count: u64,
    pub rate: Option<f64>,
}

/// Counts and rates of all event kinds at a single point in time
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Milliseconds since 1970-01-01T00:00:00Z
    pub timestamp_ms: i64,
    pub rate_unit: TimeUnit,
    pub rate_duration: u64,
    pub events: Vec<EventSnapshot>,
}

impl StatsSnapshot {
    pub fn get(&self, kind: EventKind) -> Option<&EventSnapshot> {
        self.events.iter().find(|e| e.kind == kind)
    }

    /// Sum of counts of all events
    pub fn total_count(&self) -> u64 {
        self.events.iter().map(|e| e.count).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;

    #[test]
    fn test_fresh_stats() {
        let stats = ReceiverStats::default();
        for kind in EventKind::iter() {
            assert_eq!(stats.event_count(kind), 0);
            assert!(stats.event_rate(kind).is_nan());
        }
        assert_eq!(stats.rate_unit(), TimeUnit::Seconds);
        assert_eq!(stats.rate_duration(), 60);
    }

    #[test]
    fn test_per_kind_methods_route_to_their_counters() {
        let stats = ReceiverStats::default();
        stats.count_put();
        stats.count_put();
        stats.count_remove_existing();
        stats.count_remove_not_existing();
        stats.count_remove_not_existing();
        stats.count_remove_not_existing();
        stats.count_remove_all();
        stats.count_bootstrap_request();
        stats.count_bootstrap_response();
        stats.count_bootstrap_complete();
        stats.count_bootstrap_incomplete();
        stats.count_bootstrap_incomplete();

        assert_eq!(stats.put_count(), 2);
        assert_eq!(stats.remove_existing_count(), 1);
        assert_eq!(stats.remove_not_existing_count(), 3);
        assert_eq!(stats.remove_all_count(), 1);
        assert_eq!(stats.bootstrap_request_count(), 1);
        assert_eq!(stats.bootstrap_response_count(), 1);
        assert_eq!(stats.bootstrap_complete_count(), 1);
        assert_eq!(stats.bootstrap_incomplete_count(), 2);
    }

    #[rstest]
    #[case(EventKind::Put, true)]
    #[case(EventKind::RemoveExisting, true)]
    #[case(EventKind::RemoveNotExisting, true)]
    #[case(EventKind::RemoveAll, true)]
    #[case(EventKind::BootstrapRequest, false)]
    #[case(EventKind::BootstrapResponse, false)]
    #[case(EventKind::BootstrapComplete, false)]
    #[case(EventKind::BootstrapIncomplete, false)]
    fn test_rate_tracked_only_for_data_events(#[case] kind: EventKind, #[case] rated: bool) {
        let stats = ReceiverStats::new(1, TimeUnit::Seconds);
        for _ in 0..100 {
            stats.record(kind);
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(stats.event_count(kind), 100);
        assert_eq!(!stats.event_rate(kind).is_nan(), rated);
    }

    #[test]
    fn test_counts_from_many_threads() {
        let stats = Arc::new(ReceiverStats::default());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..5000 {
                        stats.count_put();
                        stats.count_remove_all();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(stats.put_count(), 20000);
        assert_eq!(stats.remove_all_count(), 20000);
    }

    #[test]
    fn test_snapshot() {
        let stats = ReceiverStats::new(1, TimeUnit::Seconds);
        stats.count_put();
        stats.count_bootstrap_complete();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events.len(), EventKind::iter().count());
        assert_eq!(snapshot.total_count(), 2);
        assert!(snapshot.get(EventKind::Put).unwrap().rate.is_some());
        assert!(snapshot.get(EventKind::RemoveAll).unwrap().rate.is_none());
        assert_eq!(snapshot.get(EventKind::BootstrapComplete).unwrap().count, 1);
        assert!(snapshot.get(EventKind::BootstrapComplete).unwrap().rate.is_none());
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::RemoveNotExisting.to_string(), "remove_not_existing");
        assert_eq!(
            "bootstrap_request".parse::<EventKind>().unwrap(),
            EventKind::BootstrapRequest
        );
    }
}
