use std::path::PathBuf;

use err_derive::*;

use crate::report::ReportLoadError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(display = "Failed to load report {:?}: {}", _0, _1)]
    ReportLoad(PathBuf, ReportLoadError),

    #[error(display = "Failed to create output file {:?}: {}", _0, _1)]
    OutputFileCreate(PathBuf, std::io::Error),

    #[error(display = "Failed to start the runtime: {}", _0)]
    Runtime(#[source] std::io::Error),

    #[error(display = "Event producer failed: {}", _0)]
    Producer(#[source] tokio::task::JoinError),

    #[error(display = "Invalid configuration: {}", _0)]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
