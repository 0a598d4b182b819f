//! Plays the replication receiver and the monitoring poller at the same time.
//!
//! Producer threads record randomly chosen events into a shared `ReceiverStats`
//! while the poller periodically takes snapshots of the counts and rates.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimulateCommand;
use crate::error::{AppError, Result};
use crate::interrupt::InterruptHandler;
use crate::receiver::{EventKind, ReceiverStats, ReceiverStatsCounter, StatsSnapshot};

/// Everything observed during a single simulation run
#[derive(Debug, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Number of events recorded by all producers
    pub recorded: u64,
    pub elapsed_s: f64,
    pub samples: Vec<StatsSnapshot>,
    /// State of statistics after all producers finished
    pub last: StatsSnapshot,
}

/// Picks event kinds at random, proportionally to their weights
#[derive(Clone)]
struct EventMix {
    kinds: Vec<EventKind>,
    distribution: WeightedIndex<f64>,
}

impl EventMix {
    fn new(weights: &[(EventKind, f64)]) -> Result<EventMix> {
        let distribution = WeightedIndex::new(weights.iter().map(|(_, w)| *w))
            .map_err(|e| AppError::Configuration(format!("invalid event weights: {}", e)))?;
        Ok(EventMix {
            kinds: weights.iter().map(|(k, _)| *k).collect(),
            distribution,
        })
    }

    fn sample<R: rand::Rng>(&self, rng: &mut R) -> EventKind {
        self.kinds[self.distribution.sample(rng)]
    }
}

/// Records events until the deadline passes or the user interrupts.
/// If `period` is given, records at most one event per period.
/// Returns the number of recorded events.
fn produce(
    stats: &ReceiverStats,
    mix: &EventMix,
    period: Option<Duration>,
    deadline: Instant,
    interrupt: &InterruptHandler,
) -> u64 {
    let mut rng = rand::thread_rng();
    let mut next_event = Instant::now();
    let mut recorded = 0;
    loop {
        let now = Instant::now();
        if now >= deadline || interrupt.is_interrupted() {
            break;
        }
        if let Some(period) = period {
            if next_event > now {
                std::thread::sleep(next_event - now);
                continue;
            }
            next_event += period;
        }
        stats.record(mix.sample(&mut rng));
        recorded += 1;
    }
    recorded
}

/// Runs producers on blocking threads and samples the statistics every sampling period.
/// Calls `on_sample` with every snapshot taken.
pub async fn run(
    conf: &SimulateCommand,
    interrupt: Arc<InterruptHandler>,
    mut on_sample: impl FnMut(&StatsSnapshot),
) -> Result<SimulationResult> {
    let mix = EventMix::new(&conf.event_weights())?;
    let period = conf.event_period()?;
    let sampling_period = conf.sampling_interval()?;
    let run_duration = conf.run_duration()?;
    let stats = Arc::new(ReceiverStats::new(conf.window, conf.unit));
    let start = Instant::now();
    let deadline = start.checked_add(run_duration).ok_or_else(|| {
        AppError::Configuration(format!("duration {} s is too long", conf.duration))
    })?;
    let first_sample = start.checked_add(sampling_period).ok_or_else(|| {
        AppError::Configuration(format!(
            "sampling period {} s is too long",
            conf.sampling_period
        ))
    })?;

    let threads = conf.thread_count();
    info!(threads, window = conf.window, unit = %conf.unit, "Recording events");
    let producers: Vec<_> = (0..threads)
        .map(|_| {
            let stats = stats.clone();
            let mix = mix.clone();
            let interrupt = interrupt.clone();
            tokio::task::spawn_blocking(move || produce(&stats, &mix, period, deadline, &interrupt))
        })
        .collect();

    let mut samples = Vec::new();
    let mut interval = tokio::time::interval_at(
        tokio::time::Instant::from_std(first_sample),
        sampling_period,
    );
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => break,
        }
        if interrupt.is_interrupted() {
            break;
        }
        let snapshot = stats.snapshot();
        debug!(total = snapshot.total_count(), "Sampled statistics");
        on_sample(&snapshot);
        samples.push(snapshot);
    }

    let mut recorded = 0;
    for p in producers {
        recorded += p.await.map_err(AppError::Producer)?;
    }
    let elapsed_s = start.elapsed().as_secs_f64();
    info!(recorded, elapsed_s, "Recording finished");

    Ok(SimulationResult {
        recorded,
        elapsed_s,
        samples,
        last: stats.snapshot(),
    })
}
