/// Pipeline module: sequences a run on a single worker thread.
///
/// Per period, in chronological order: expand archives under the space
/// guard, de-duplicate by name, measure every file, enrich with trends,
/// write the period outputs and upsert the in-memory ledger. The ledger is
/// saved once at the end of the run and the run's scratch folder removed.
///
/// The driver talks to the worker through a [`RunHandle`]: events arrive
/// on an unbounded crossbeam channel and cancellation is a shared flag.
pub mod events;
pub mod inventory;
pub mod periods;

pub use events::RunEvent;
pub use periods::{scan_periods, PeriodDir};

use crate::analysis::build_trend_records;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::extract::expand_period_checked;
use crate::guard::{ensure_headroom, SpaceGuard, SpaceOperator};
use crate::ledger::{Ledger, LedgerRow};
use crate::model::PeriodId;
use crate::output::{write_null_details, write_period_summary, TableFormatter, WrittenTable};
use crate::platform::{remove_dir_all_retry, FreeSpace, RetryPolicy, ScratchDir, SystemFreeSpace};
use events::percent;
use inventory::{dedup_by_name, measure_period};

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, info, info_span, warn};

/// External collaborators of a run.
pub struct Collaborators {
    /// Asked to free space by hand when automatic cleanup is not enough.
    pub operator: Arc<dyn SpaceOperator>,
    pub free_space: Arc<dyn FreeSpace>,
    /// Styles every written table. `None` leaves outputs as plain data.
    pub formatter: Option<Box<dyn TableFormatter>>,
}

impl Collaborators {
    pub fn new(operator: Arc<dyn SpaceOperator>) -> Self {
        Self {
            operator,
            free_space: Arc::new(SystemFreeSpace),
            formatter: None,
        }
    }

    pub fn with_free_space(mut self, free_space: Arc<dyn FreeSpace>) -> Self {
        self.free_space = free_space;
        self
    }

    pub fn with_formatter(mut self, formatter: Box<dyn TableFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    fn format(&self, tables: &[WrittenTable]) {
        let Some(formatter) = &self.formatter else {
            return;
        };
        for table in tables {
            if let Err(e) = formatter.format(table) {
                warn!("Could not format {}: {e}", table.path.display());
            }
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Stopped by the cancel flag; completed periods are kept.
    Cancelled,
    /// Stopped by the space guard; the ledger was not saved.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub periods_processed: usize,
    pub ledger_rows: usize,
    pub ledger_saved: bool,
}

/// Handle to a running or completed run.
pub struct RunHandle {
    /// Events from the worker; ends with [`RunEvent::Done`].
    pub events: Receiver<RunEvent>,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<Result<RunSummary>>>,
}

impl RunHandle {
    /// Request the run to stop at the next checkpoint.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Wait for the worker and return its summary.
    pub fn join(mut self) -> Result<RunSummary> {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or(Err(Error::WorkerPanicked)),
            None => Err(Error::WorkerPanicked),
        }
    }
}

/// Start a run on a background thread.
pub fn start_run(
    config: RunConfig,
    cancel: Arc<AtomicBool>,
    collaborators: Collaborators,
) -> std::io::Result<RunHandle> {
    let (tx, events) = crossbeam_channel::unbounded();
    let cancel_clone = cancel.clone();

    let thread = thread::Builder::new()
        .name("filetrend-worker".into())
        .spawn(move || run(&config, &collaborators, &cancel_clone, &tx))?;

    Ok(RunHandle {
        events,
        cancel_flag: cancel,
        thread: Some(thread),
    })
}

/// Execute a whole run on the calling thread. Always emits
/// [`RunEvent::Done`] last.
pub fn run(
    config: &RunConfig,
    collaborators: &Collaborators,
    cancel: &AtomicBool,
    tx: &Sender<RunEvent>,
) -> Result<RunSummary> {
    let span = info_span!("run", base = %config.base_path.display());
    let _enter = span.enter();

    let periods = match scan_periods(&config.base_path) {
        Ok(periods) => periods,
        Err(e) => {
            error!("Cannot list {}: {e}", config.base_path.display());
            let _ = tx.send(RunEvent::Done { periods_processed: 0 });
            return Err(e.into());
        }
    };
    info!("Found {} period folders", periods.len());
    send_info(tx, format!("Found {} periods to process", periods.len()));

    let mut ledger = Ledger::load(config);
    let mut outcome = RunOutcome::Completed;
    let mut processed = 0usize;
    let mut previous: Option<PeriodId> = None;
    let total = periods.len();

    for (idx, period) in periods.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            outcome = RunOutcome::Cancelled;
            break;
        }
        let _ = tx.send(RunEvent::ProgressOverall(percent(idx, total)));

        match process_period(config, collaborators, period, previous.as_ref(), &mut ledger, cancel, tx) {
            Ok(true) => processed += 1,
            Ok(false) => {}
            Err(Error::Cancelled) => {
                info!("Run cancelled during period {}", period.id);
                send_info(tx, format!("Cancelled during period {}", period.id.label()));
                outcome = RunOutcome::Cancelled;
                break;
            }
            Err(Error::SpaceGuardAborted) => {
                error!("Run aborted for lack of disk space in period {}", period.id);
                outcome = RunOutcome::Aborted;
                break;
            }
            Err(e) => {
                error!("Period {} failed: {e}", period.id);
                send_info(tx, format!("Period {} failed: {e}", period.id.label()));
            }
        }

        previous = Some(period.id.clone());
        let _ = tx.send(RunEvent::ProgressPeriod(0));
        let _ = tx.send(RunEvent::ProgressOverall(percent(idx + 1, total)));
    }

    let mut ledger_saved = false;
    if outcome == RunOutcome::Aborted {
        warn!("Ledger not saved after abort");
    } else {
        match ledger.save(config) {
            Ok(tables) => {
                ledger_saved = true;
                collaborators.format(&tables);
            }
            Err(e) => {
                warn!("{e}");
                send_info(tx, format!("Warning: {e}"));
            }
        }
    }

    let scratch_dir = config.scratch_dir();
    if let Err(e) = remove_dir_all_retry(&scratch_dir, RetryPolicy::DEFAULT) {
        warn!("Could not remove scratch folder {}: {e}", scratch_dir.display());
    }

    info!("Run finished ({outcome:?}): {processed} periods processed");
    let _ = tx.send(RunEvent::Done {
        periods_processed: processed,
    });

    Ok(RunSummary {
        outcome,
        periods_processed: processed,
        ledger_rows: ledger.len(),
        ledger_saved,
    })
}

/// Process one period. `Ok(false)` when the period holds no files.
fn process_period(
    config: &RunConfig,
    collaborators: &Collaborators,
    period: &PeriodDir,
    previous: Option<&PeriodId>,
    ledger: &mut Ledger,
    cancel: &AtomicBool,
    tx: &Sender<RunEvent>,
) -> Result<bool> {
    let span = info_span!("period", period = %period.id);
    let _enter = span.enter();
    send_info(tx, format!("Processing period {}", period.id.label()));

    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f");
    let scratch_dir = config.scratch_dir();
    let scratch = ScratchDir::create(scratch_dir.join(format!("{}_{stamp}", period.id)))?;

    let mut guard = SpaceGuard::new(
        &scratch_dir,
        config.min_free_bytes,
        config.max_space_recoveries,
        collaborators.free_space.as_ref(),
        collaborators.operator.as_ref(),
    )
    .with_events(tx.clone());
    let free_space = collaborators.free_space.as_ref();
    let check_space = || ensure_headroom(free_space, &scratch_dir, config.min_free_bytes);
    let descriptors = guard.run(&scratch, |dest| {
        expand_period_checked(&period.path, dest, &config.output_dir_name, cancel, &check_space)
    })?;

    let descriptors = dedup_by_name(descriptors);
    if descriptors.is_empty() {
        info!("No files in {}", period.path.display());
        send_info(tx, format!("No files found in period {}", period.id.label()));
        return Ok(false);
    }
    info!("{} files to measure", descriptors.len());

    let inventory = measure_period(
        &period.id,
        &period.path,
        &descriptors,
        config.streaming_threshold_bytes,
        cancel,
        tx,
    )?;

    let records = build_trend_records(
        &inventory.rows,
        ledger,
        &period.id,
        previous,
        config.row_floor,
        config.similarity_threshold,
    );

    match write_period_summary(config, &period.id, &records) {
        Ok(tables) => collaborators.format(&tables),
        Err(e) => error!("Could not write summary for {}: {e}", period.id),
    }
    match write_null_details(config, &period.id, &inventory.details) {
        Ok(Some(table)) => collaborators.format(&[table]),
        Ok(None) => {}
        Err(e) => error!("Could not write null details for {}: {e}", period.id),
    }

    ledger.upsert_period(&period.id, records.iter().map(LedgerRow::from_record).collect());
    send_info(
        tx,
        format!("Period {} done: {} files", period.id.label(), records.len()),
    );
    Ok(true)
}

fn send_info(tx: &Sender<RunEvent>, text: String) {
    let _ = tx.send(RunEvent::Info(text));
}
