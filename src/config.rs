use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::error::{AppError, Result};
use crate::rate::BUCKET_COUNT;
use crate::receiver::EventKind;
use crate::time_unit::TimeUnit;

/// Parse a single key-value pair
fn parse_key_val<T, U>(s: &str) -> std::result::Result<(T, U), anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}

fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

/// Converts seconds to a `Duration`, rejecting values that don't fit
fn secs(name: &str, value: f64) -> Result<Duration> {
    if !positive(value) {
        return Err(AppError::Configuration(format!(
            "{} must be a finite number greater than 0",
            name
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| AppError::Configuration(format!("invalid {} {}: {}", name, value, e)))
}

mod defaults {
    use crate::receiver::EventKind;

    /// Relative frequencies of events observed on a typical replicated cache:
    /// mostly puts, some removes, rare clears and bootstraps.
    pub fn weight(kind: EventKind) -> f64 {
        match kind {
            EventKind::Put => 100.0,
            EventKind::RemoveExisting => 20.0,
            EventKind::RemoveNotExisting => 5.0,
            EventKind::RemoveAll => 0.1,
            EventKind::BootstrapRequest
            | EventKind::BootstrapResponse
            | EventKind::BootstrapComplete => 0.01,
            EventKind::BootstrapIncomplete => 0.001,
        }
    }
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[clap(next_line_help = true)]
pub struct SimulateCommand {
    /// Number of events per second each thread records.
    /// If not given, events are recorded as fast as possible
    #[clap(short('r'), long)]
    pub rate: Option<f64>,

    /// Number of threads recording events
    #[clap(short('t'), long)]
    pub threads: Option<usize>,

    /// How long to run, in seconds
    #[clap(short('d'), long, default_value = "10.0")]
    pub duration: f64,

    /// Statistics sampling period, in seconds
    #[clap(short('s'), long, default_value = "1.0")]
    pub sampling_period: f64,

    /// Length of the window the rates are averaged over, in `--unit`
    #[clap(long, default_value = "1")]
    pub window: u64,

    /// Unit of the rate window; rates are reported as events per this unit
    #[clap(long, default_value = "seconds")]
    pub unit: TimeUnit,

    /// Relative frequency of an event kind, e.g. `-w put=10`.
    /// Kinds not listed keep their default weight
    #[clap(short('w'), long("weight"), parse(try_from_str = parse_key_val),
    number_of_values = 1, multiple_occurrences = true)]
    pub weights: Vec<(EventKind, f64)>,

    /// Label that will be added to the report to help identifying the run
    #[clap(long)]
    pub tag: Option<String>,

    /// Path to an output file where the JSON report should be written to
    #[clap(short('o'), long)]
    #[serde(skip)]
    pub output: Option<PathBuf>,

    /// Seconds since 1970-01-01T00:00:00Z
    #[clap(hide(true), long)]
    pub timestamp: Option<i64>,
}

impl SimulateCommand {
    pub fn set_timestamp_if_empty(mut self) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now().timestamp())
        }
        self
    }

    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }

    /// How long producers keep recording
    pub fn run_duration(&self) -> Result<Duration> {
        secs("duration", self.duration)
    }

    pub fn sampling_interval(&self) -> Result<Duration> {
        secs("sampling period", self.sampling_period)
    }

    /// Time between two events recorded by the same thread, if the rate is limited
    pub fn event_period(&self) -> Result<Option<Duration>> {
        match self.rate {
            Some(rate) if !positive(rate) => Err(AppError::Configuration(
                "rate must be a finite number greater than 0".to_owned(),
            )),
            Some(rate) => secs("event period", 1.0 / rate).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the weights of all event kinds, defaults overridden by the user
    pub fn event_weights(&self) -> Vec<(EventKind, f64)> {
        let overrides: HashMap<EventKind, f64> = self.weights.iter().cloned().collect();
        EventKind::iter()
            .map(|k| (k, overrides.get(&k).copied().unwrap_or_else(|| defaults::weight(k))))
            .collect()
    }

    /// Rejects settings that would make the run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(AppError::Configuration("window must be greater than 0".to_owned()));
        }
        if self.unit.to_nanos(self.window) < BUCKET_COUNT as u64 {
            return Err(AppError::Configuration(format!(
                "window must be at least {} ns",
                BUCKET_COUNT
            )));
        }
        if self.thread_count() == 0 {
            return Err(AppError::Configuration("threads must be greater than 0".to_owned()));
        }
        self.sampling_interval()?;
        self.run_duration()?;
        self.event_period()?;
        let weights = self.event_weights();
        if let Some((kind, w)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(AppError::Configuration(format!(
                "invalid weight of {}: {}",
                kind, w
            )));
        }
        if weights.iter().all(|(_, w)| *w == 0.0) {
            return Err(AppError::Configuration(
                "at least one event kind must have a positive weight".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct ShowCommand {
    /// Path to the JSON report file
    pub report: PathBuf,
}

#[derive(Parser, Debug)]
pub enum Command {
    /// Records simulated replication events from many threads and samples their rates
    Simulate(SimulateCommand),
    /// Displays the report of a previous simulation
    Show(ShowCommand),
}

#[derive(Parser, Debug)]
#[clap(
name = "Replication Receiver Statistics",
version = clap::crate_version ! (),
)]
pub struct AppConfig {
    #[clap(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> SimulateCommand {
        let mut argv = vec!["repstat", "simulate"];
        argv.extend_from_slice(args);
        match AppConfig::parse_from(argv).command {
            Command::Simulate(cmd) => cmd,
            Command::Show(_) => panic!("expected simulate command"),
        }
    }

    #[test]
    fn test_defaults() {
        let cmd = parse(&[]);
        assert_eq!(cmd.window, 1);
        assert_eq!(cmd.unit, TimeUnit::Seconds);
        assert_eq!(cmd.duration, 10.0);
        assert!(cmd.rate.is_none());
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_weights_override_defaults() {
        let cmd = parse(&["-w", "put=1", "--weight", "remove_all=0"]);
        let weights: HashMap<_, _> = cmd.event_weights().into_iter().collect();
        assert_eq!(weights[&EventKind::Put], 1.0);
        assert_eq!(weights[&EventKind::RemoveAll], 0.0);
        assert_eq!(weights[&EventKind::RemoveExisting], 20.0);
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let argv = vec!["repstat", "simulate", "-w", "update=1"];
        assert!(AppConfig::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_rejects_invalid_settings() {
        assert!(parse(&["--window", "0"]).validate().is_err());
        assert!(parse(&["--window", "5", "--unit", "nanoseconds"]).validate().is_err());
        assert!(parse(&["-t", "0"]).validate().is_err());
        assert!(parse(&["-s", "0"]).validate().is_err());
        assert!(parse(&["--rate=-1"]).validate().is_err());
        assert!(parse(&["-d", "inf"]).validate().is_err());
        assert!(parse(&["-d", "NaN"]).validate().is_err());
        assert!(parse(&["-d", "1e30"]).validate().is_err());
        assert!(parse(&["-s", "inf"]).validate().is_err());
        assert!(parse(&["-r", "1e-320"]).validate().is_err());
        assert!(parse(&["-r", "inf"]).validate().is_err());
        let all_zero: Vec<String> = EventKind::iter().map(|k| format!("{}=0", k)).collect();
        let mut args = Vec::new();
        for w in &all_zero {
            args.push("-w");
            args.push(w.as_str());
        }
        assert!(parse(&args).validate().is_err());
    }

    #[test]
    fn test_durations() {
        let cmd = parse(&["-d", "2.5", "-s", "0.25", "-r", "4"]);
        assert_eq!(cmd.run_duration().unwrap(), Duration::from_millis(2500));
        assert_eq!(cmd.sampling_interval().unwrap(), Duration::from_millis(250));
        assert_eq!(cmd.event_period().unwrap(), Some(Duration::from_millis(250)));
        assert_eq!(parse(&[]).event_period().unwrap(), None);
    }

    #[test]
    fn test_parse_key_val() {
        let (k, v): (EventKind, f64) = parse_key_val("put=2.5").unwrap();
        assert_eq!(k, EventKind::Put);
        assert_eq!(v, 2.5);
        assert!(parse_key_val::<EventKind, f64>("put").is_err());
        assert!(parse_key_val::<EventKind, f64>("put=x").is_err());
    }
}
