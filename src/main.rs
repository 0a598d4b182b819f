use std::process::exit;

use chrono::Utc;
use clap::Parser;
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::EnvFilter;

use repstat::config::{AppConfig, Command, ShowCommand, SimulateCommand};
use repstat::error::{AppError, Result};
use repstat::interrupt::InterruptHandler;
use repstat::report::{Report, SampleRow};
use repstat::simulate;

async fn run_simulation(conf: SimulateCommand) -> Result<()> {
    conf.validate()?;
    let conf = conf.set_timestamp_if_empty();
    let interrupt = InterruptHandler::install();

    let start_ms = Utc::now().timestamp_millis();
    println!("{}", SampleRow::header());
    let result = simulate::run(&conf, interrupt, |s| {
        println!("{}", SampleRow::new(start_ms, s))
    })
    .await?;

    let report = Report::new(conf, result);
    println!("{}", report);

    if let Some(path) = &report.conf.output {
        report
            .save(path)
            .map_err(|e| AppError::OutputFileCreate(path.clone(), e))?;
        info!(path = %path.display(), "Saved report");
    }
    Ok(())
}

fn show(conf: ShowCommand) -> Result<()> {
    let report = Report::load(&conf.report).map_err(|e| AppError::ReportLoad(conf.report, e))?;
    println!("{}", report);
    Ok(())
}

async fn async_main(command: Command) -> Result<()> {
    match command {
        Command::Simulate(config) => run_simulation(config).await?,
        Command::Show(config) => show(config)?,
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let command = AppConfig::parse().command;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime);
    let result = match runtime {
        Ok(runtime) => runtime.block_on(async_main(command)),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        exit(128);
    }
}
