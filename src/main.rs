//! FileTrend: period-by-period inventory of tabular files.
//!
//! Thin binary entry point. All logic lives in the `filetrend-core`
//! and `filetrend-cli` crates.

use clap::Parser;
use filetrend_cli::Args;
use filetrend_core::pipeline::RunOutcome;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    tracing::info!("FileTrend starting");

    let summary = filetrend_cli::run(&args)?;
    match summary.outcome {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Cancelled => anyhow::bail!("run cancelled after {} periods", summary.periods_processed),
        RunOutcome::Aborted => anyhow::bail!("run stopped: not enough disk space"),
    }
}
