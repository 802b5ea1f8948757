/// FileTrend CLI: console frontend.
///
/// Parses arguments, optionally backs up previous outputs, starts a run in
/// the background and renders its events. Ctrl-C cancels the run: the
/// current period is discarded and completed ones are saved. Business
/// logic lives in `filetrend-core`.
pub mod args;
pub mod backup;
pub mod console;
pub mod state;

pub use args::Args;

use console::ConsoleOperator;
use filetrend_core::pipeline::{Collaborators, RunSummary};
use state::{DriverState, RunPhase};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Run to completion, printing progress to stdout.
pub fn run(args: &Args) -> anyhow::Result<RunSummary> {
    let config = args.to_config()?;
    info!("Base folder: {}", config.base_path.display());

    if let Some(dest) = &args.backup_outputs_to {
        match backup::backup_outputs(&config, dest)? {
            Some(root) => println!("Previous outputs moved to {}", root.display()),
            None => info!("No previous outputs to back up"),
        }
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        if let Err(e) = ctrlc::set_handler(move || interrupted.store(true, Ordering::Relaxed)) {
            warn!("Ctrl-C handler not installed: {e}");
        }
    }

    let operator = Arc::new(ConsoleOperator::new(args.prompt_mode()));
    let mut state = DriverState::new();
    state.start(config, Collaborators::new(operator))?;
    drive(&mut state, &interrupted, &mut io::stdout())?;

    match state.finish() {
        Some(result) => Ok(result?),
        None => anyhow::bail!("run was never started"),
    }
}

/// Pump and render events until the run leaves `Running`.
///
/// Once `interrupted` is raised the run is cancelled, and the loop keeps
/// pumping until the worker reports `Done`.
pub fn drive<W: Write>(state: &mut DriverState, interrupted: &AtomicBool, out: &mut W) -> io::Result<()> {
    while state.phase == RunPhase::Running {
        if interrupted.load(Ordering::Relaxed) && !state.cancel_requested() {
            info!("Interrupted; cancelling run");
            state.cancel();
            writeln!(out, "\rCancelling: the current period is discarded, completed periods are saved")?;
        }
        for event in state.process_events(POLL_INTERVAL) {
            console::render(&event, out)?;
        }
    }
    Ok(())
}
