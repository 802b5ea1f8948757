/// Run events: lightweight messages sent from the worker thread to the
/// driver via a crossbeam channel.

/// Progress and log events emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A human-readable status line.
    Info(String),
    /// Share of periods finished, 0-100.
    ProgressOverall(u8),
    /// Share of the current period's files finished, 0-100.
    ProgressPeriod(u8),
    /// The run has ended. Always the last event.
    Done { periods_processed: usize },
}

/// `done / total` as a 0-100 percentage. An empty total counts as complete.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}
