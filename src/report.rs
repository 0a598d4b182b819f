use core::fmt;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::{fs, io};

use chrono::{Local, TimeZone};
use console::{pad_str, style, Alignment};
use err_derive::*;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::config::SimulateCommand;
use crate::receiver::{EventKind, StatsSnapshot};
use crate::simulate::SimulationResult;
use crate::time_unit::TimeUnit;

#[derive(Debug, Error)]
pub enum ReportLoadError {
    #[error(display = "{}", _0)]
    IO(#[source] io::Error),
    #[error(display = "{}", _0)]
    Deserialize(#[source] serde_json::Error),
}

/// Keeps all data we want to save in a report:
/// run configuration and results
#[derive(Serialize, Deserialize)]
pub struct Report {
    pub conf: SimulateCommand,
    pub result: SimulationResult,
}

impl Report {
    /// Creates a new report from given configuration and results
    pub fn new(conf: SimulateCommand, result: SimulationResult) -> Report {
        Report { conf, result }
    }

    /// Loads simulation results from a JSON file
    pub fn load(path: &Path) -> Result<Report, ReportLoadError> {
        let file = fs::File::open(path)?;
        let reader = io::BufReader::new(file);
        let report = serde_json::from_reader(reader)?;
        Ok(report)
    }

    /// Saves simulation results to a JSON file
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let f = fs::File::create(path)?;
        let writer = io::BufWriter::new(f);
        serde_json::to_writer_pretty(writer, &self)?;
        Ok(())
    }
}

/// This is similar as the builtin `Option`, but we need it, because the
/// builtin `Option` doesn't implement `Display`.
/// Formats None as a dash.
pub struct Maybe<T>(Option<T>);

impl<T: Display> Display for Maybe<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => write!(f, "{}", pad_str("-", f.width().unwrap_or(0), Alignment::Right, None)),
        }
    }
}

struct Rate {
    value: Option<f64>,
    unit: TimeUnit,
}

impl Display for Rate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let value = Maybe(self.value.map(|v| format!("{:.1}", v)));
        write!(
            f,
            "{:>14} {:<4}",
            style(value).bright().for_stdout(),
            style(format!("/{}", self.unit.suffix())).dim().for_stdout()
        )
    }
}

/// Kinds shown in the per-sample table
const SAMPLED_KINDS: [EventKind; 4] = [
    EventKind::Put,
    EventKind::RemoveExisting,
    EventKind::RemoveNotExisting,
    EventKind::RemoveAll,
];

/// One line of the table printed while the simulation is running
pub struct SampleRow<'a> {
    start_ms: i64,
    snapshot: &'a StatsSnapshot,
}

impl<'a> SampleRow<'a> {
    pub fn new(start_ms: i64, snapshot: &'a StatsSnapshot) -> Self {
        SampleRow { start_ms, snapshot }
    }

    pub fn header() -> String {
        let columns = SAMPLED_KINDS
            .iter()
            .map(|k| format!("{:>19}", k.to_string()))
            .join(" ");
        format!(
            "{}",
            style(format!("{:>8} {} {:>12}", "Time [s]", columns, "Total"))
                .yellow()
                .bold()
                .for_stdout()
        )
    }
}

impl Display for SampleRow<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let time_s = (self.snapshot.timestamp_ms - self.start_ms) as f64 / 1000.0;
        let rates = SAMPLED_KINDS
            .iter()
            .map(|&k| Rate {
                value: self.snapshot.get(k).and_then(|e| e.rate),
                unit: self.snapshot.rate_unit,
            })
            .join(" ");
        write!(
            f,
            "{:8.3} {} {:>12}",
            time_s,
            rates,
            self.snapshot.total_count()
        )
    }
}

fn fmt_section_header(f: &mut Formatter<'_>, name: &str) -> fmt::Result {
    writeln!(
        f,
        "{}",
        style(format!("{:=<76}", format!("{} ", name)))
            .yellow()
            .bold()
            .for_stdout()
    )
}

fn fmt_line<T: Display>(f: &mut Formatter<'_>, label: &str, value: T) -> fmt::Result {
    writeln!(
        f,
        "{} {}",
        style(pad_str(label, 28, Alignment::Left, None)).dim().for_stdout(),
        value
    )
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let conf = &self.conf;
        let result = &self.result;
        let time = conf
            .timestamp
            .and_then(|ts| Local.timestamp_opt(ts, 0).single())
            .map(|t| t.format("%a, %d %b %Y %H:%M:%S %z").to_string());

        writeln!(f)?;
        fmt_section_header(f, "CONFIG")?;
        fmt_line(f, "Date", Maybe(time))?;
        fmt_line(f, "Tag", Maybe(conf.tag.as_ref()))?;
        fmt_line(f, "Threads", conf.thread_count())?;
        fmt_line(
            f,
            "Rate [op/s/thread]",
            Maybe(conf.rate.map(|r| format!("{:.1}", r))),
        )?;
        fmt_line(f, "Window", format!("{} {}", conf.window, conf.unit))?;
        fmt_line(f, "Sampling period [s]", conf.sampling_period)?;
        fmt_line(
            f,
            "Weights",
            conf.event_weights()
                .iter()
                .filter(|(_, w)| *w > 0.0)
                .map(|(k, w)| format!("{}={}", k, w))
                .join(", "),
        )?;

        writeln!(f)?;
        fmt_section_header(f, "SUMMARY")?;
        fmt_line(f, "Elapsed [s]", format!("{:.3}", result.elapsed_s))?;
        fmt_line(f, "Recorded events", result.recorded)?;
        fmt_line(f, "Samples", result.samples.len())?;
        fmt_line(
            f,
            "Mean throughput [op/s]",
            format!("{:.1}", result.recorded as f64 / result.elapsed_s),
        )?;

        writeln!(f)?;
        fmt_section_header(f, "EVENTS")?;
        writeln!(
            f,
            "{}",
            style(format!("{:28} {:>12} {:>19}", "Kind", "Count", "Rate"))
                .yellow()
                .bold()
                .for_stdout()
        )?;
        for kind in EventKind::iter() {
            if let Some(e) = result.last.get(kind) {
                writeln!(
                    f,
                    "{:28} {:>12} {}",
                    kind.to_string(),
                    e.count,
                    Rate {
                        value: e.rate,
                        unit: result.last.rate_unit,
                    }
                )?;
            }
        }

        if let Some(first) = result.samples.first() {
            let start_ms = first.timestamp_ms - (conf.sampling_period * 1000.0) as i64;
            writeln!(f)?;
            fmt_section_header(f, "SAMPLES")?;
            writeln!(f, "{}", SampleRow::header())?;
            for s in &result.samples {
                writeln!(f, "{}", SampleRow::new(start_ms, s))?;
            }
        }
        Ok(())
    }
}
