/// Driver state.
///
/// Owns the [`RunHandle`] and folds the worker's events into progress
/// figures and a bounded message log. The console loop calls
/// [`DriverState::process_events`] until the phase leaves `Running`.
use filetrend_core::pipeline::{self, Collaborators, RunEvent, RunHandle, RunSummary};
use filetrend_core::RunConfig;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Finished,
}

/// Events handled per call, so a backlog cannot starve rendering.
pub const MAX_EVENTS_PER_PUMP: usize = 300;

/// Info lines kept in memory; the oldest are dropped first.
pub const MAX_MESSAGES: usize = 1_000;

pub struct DriverState {
    pub phase: RunPhase,
    pub overall_progress: u8,
    pub period_progress: u8,
    pub messages: VecDeque<String>,
    /// Set once `Done` arrives.
    pub periods_processed: Option<usize>,
    handle: Option<RunHandle>,
}

impl Default for DriverState {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverState {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            overall_progress: 0,
            period_progress: 0,
            messages: VecDeque::new(),
            periods_processed: None,
            handle: None,
        }
    }

    /// Start a run in the background and reset progress.
    pub fn start(&mut self, config: RunConfig, collaborators: Collaborators) -> std::io::Result<()> {
        let handle = pipeline::start_run(config, Arc::new(AtomicBool::new(false)), collaborators)?;
        self.phase = RunPhase::Running;
        self.overall_progress = 0;
        self.period_progress = 0;
        self.messages.clear();
        self.periods_processed = None;
        self.handle = Some(handle);
        Ok(())
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.cancel();
        }
    }

    /// Whether the current run has been asked to stop.
    pub fn cancel_requested(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_cancelled())
    }

    /// Wait up to `wait` for the next event, then drain what is pending.
    /// Returns the events handled, in order.
    pub fn process_events(&mut self, wait: Duration) -> Vec<RunEvent> {
        let Some(handle) = &self.handle else {
            return Vec::new();
        };

        let mut handled = Vec::new();
        let first = match handle.events.recv_timeout(wait) {
            Ok(event) => event,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => return handled,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                self.phase = RunPhase::Finished;
                return handled;
            }
        };
        handled.push(first);
        while handled.len() < MAX_EVENTS_PER_PUMP {
            match handle.events.try_recv() {
                Ok(event) => handled.push(event),
                Err(_) => break,
            }
        }

        for event in &handled {
            self.apply(event);
        }
        handled
    }

    fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Info(text) => {
                if self.messages.len() >= MAX_MESSAGES {
                    self.messages.pop_front();
                }
                self.messages.push_back(text.clone());
            }
            RunEvent::ProgressOverall(pct) => self.overall_progress = *pct,
            RunEvent::ProgressPeriod(pct) => self.period_progress = *pct,
            RunEvent::Done { periods_processed } => {
                self.periods_processed = Some(*periods_processed);
                self.phase = RunPhase::Finished;
            }
        }
    }

    /// Join the worker. `None` if no run was started.
    pub fn finish(&mut self) -> Option<filetrend_core::Result<RunSummary>> {
        let handle = self.handle.take()?;
        self.phase = RunPhase::Finished;
        Some(handle.join())
    }
}
