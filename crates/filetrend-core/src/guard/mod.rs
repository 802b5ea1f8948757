/// Disk-exhaustion recovery around archive expansion.
///
/// ```text
/// Extracting ──DiskExhausted──▶ SpaceExhausted ──▶ Cleaning
///     ▲                                               │
///     └──── Retrying ◀── enough space / operator ok ──┤
///                                                     └──▶ Aborted
/// ```
///
/// Cleaning removes every scratch subtree except the newest. If free space
/// is still at or below the configured minimum the operator is asked to
/// free space by hand; declining aborts the run.
///
/// Besides real write failures, [`ensure_headroom`] reports exhaustion
/// before an archive is extracted onto a volume already at the minimum.
use crate::error::{Error, Result};
use crate::model::size::format_size;
use crate::pipeline::events::RunEvent;
use crate::platform::{remove_dir_all_retry, remove_stale_subtrees, FreeSpace, RetryPolicy, ScratchDir};
use crossbeam_channel::Sender;
use std::io;
use std::path::Path;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Extracting,
    SpaceExhausted,
    Cleaning,
    Retrying,
    Aborted,
}

/// The human in the loop when automatic cleanup is not enough.
pub trait SpaceOperator: Send + Sync {
    /// Ask for space to be freed by hand. `true` resumes extraction,
    /// `false` aborts the run.
    fn request_manual_cleanup(&self, scratch_dir: &Path, available: Option<u64>, required: u64) -> bool;
}

/// Operator for unattended runs: always declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineCleanup;

impl SpaceOperator for DeclineCleanup {
    fn request_manual_cleanup(&self, _scratch_dir: &Path, _available: Option<u64>, _required: u64) -> bool {
        false
    }
}

/// Fail with [`Error::DiskExhausted`] unless `path` has more than
/// `min_free_bytes` available. A volume that cannot be measured passes.
pub fn ensure_headroom(free_space: &dyn FreeSpace, path: &Path, min_free_bytes: u64) -> Result<()> {
    match free_space.available_bytes(path) {
        Ok(bytes) if bytes <= min_free_bytes => Err(Error::DiskExhausted(io::Error::new(
            io::ErrorKind::StorageFull,
            format!(
                "{} free, more than {} required",
                format_size(bytes),
                format_size(min_free_bytes)
            ),
        ))),
        Ok(_) => Ok(()),
        Err(e) => {
            debug!("Cannot measure free space under {}: {e}", path.display());
            Ok(())
        }
    }
}

pub struct SpaceGuard<'a> {
    scratch_dir: &'a Path,
    min_free_bytes: u64,
    max_recoveries: u32,
    free_space: &'a dyn FreeSpace,
    operator: &'a dyn SpaceOperator,
    events: Option<Sender<RunEvent>>,
    transitions: Vec<GuardState>,
}

impl<'a> SpaceGuard<'a> {
    pub fn new(
        scratch_dir: &'a Path,
        min_free_bytes: u64,
        max_recoveries: u32,
        free_space: &'a dyn FreeSpace,
        operator: &'a dyn SpaceOperator,
    ) -> Self {
        Self {
            scratch_dir,
            min_free_bytes,
            max_recoveries,
            free_space,
            operator,
            events: None,
            transitions: Vec::new(),
        }
    }

    /// Forward recovery notices to a run's event channel.
    pub fn with_events(mut self, tx: Sender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Every state entered so far, in order.
    pub fn transitions(&self) -> &[GuardState] {
        &self.transitions
    }

    /// Run `attempt` against the period scratch directory, recovering from
    /// [`Error::DiskExhausted`] until it succeeds, fails otherwise, or the
    /// guard aborts with [`Error::SpaceGuardAborted`].
    pub fn run<T, F>(&mut self, scratch: &ScratchDir, mut attempt: F) -> Result<T>
    where
        F: FnMut(&Path) -> Result<T>,
    {
        let mut recoveries = 0u32;
        self.enter(GuardState::Extracting);

        loop {
            let cause = match attempt(scratch.path()) {
                Err(Error::DiskExhausted(cause)) => cause,
                other => return other,
            };

            self.enter(GuardState::SpaceExhausted);
            warn!("Out of disk space under {}: {cause}", scratch.path().display());
            self.notify(format!("Disk full while expanding archives ({cause}); cleaning scratch space"));

            if recoveries >= self.max_recoveries {
                error!("Giving up after {recoveries} space recoveries");
                return Err(self.abort(scratch));
            }
            recoveries += 1;

            self.enter(GuardState::Cleaning);
            let removed = remove_stale_subtrees(self.scratch_dir);
            info!("Removed {} stale scratch directories", removed.len());

            if !self.space_recovered() {
                return Err(self.abort(scratch));
            }

            self.enter(GuardState::Retrying);
            scratch.recreate()?;
            self.notify("Retrying archive expansion".to_string());
            self.enter(GuardState::Extracting);
        }
    }

    /// Enough free space after cleaning, or the operator freed some by hand.
    fn space_recovered(&self) -> bool {
        let available = match self.free_space.available_bytes(self.scratch_dir) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Cannot measure free space under {}: {e}", self.scratch_dir.display());
                None
            }
        };
        if let Some(bytes) = available {
            if bytes > self.min_free_bytes {
                info!("{} free after cleaning", format_size(bytes));
                return true;
            }
        }
        self.notify("Automatic cleanup was not enough; waiting for the operator".to_string());
        self.operator
            .request_manual_cleanup(self.scratch_dir, available, self.min_free_bytes)
    }

    fn abort(&mut self, scratch: &ScratchDir) -> Error {
        self.enter(GuardState::Aborted);
        if let Err(e) = remove_dir_all_retry(scratch.path(), RetryPolicy::DEFAULT) {
            warn!("Could not remove {}: {e}", scratch.path().display());
        }
        self.notify("Stopped: not enough disk space".to_string());
        Error::SpaceGuardAborted
    }

    fn enter(&mut self, state: GuardState) {
        debug!("Space guard: {state:?}");
        self.transitions.push(state);
    }

    fn notify(&self, text: String) {
        if let Some(tx) = &self.events {
            let _ = tx.send(RunEvent::Info(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use GuardState::*;

    struct FixedSpace(u64);

    impl FreeSpace for FixedSpace {
        fn available_bytes(&self, _path: &Path) -> io::Result<u64> {
            Ok(self.0)
        }
    }

    struct Operator {
        answer: bool,
        asked: AtomicUsize,
    }

    impl Operator {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: AtomicUsize::new(0),
            }
        }
    }

    impl SpaceOperator for Operator {
        fn request_manual_cleanup(&self, _root: &Path, _available: Option<u64>, _required: u64) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn disk_full() -> Error {
        Error::DiskExhausted(io::Error::new(io::ErrorKind::StorageFull, "no space left"))
    }

    /// Fails with `DiskExhausted` `failures` times, then succeeds.
    fn flaky(failures: u32) -> (Cell<u32>, impl Fn(&Cell<u32>) -> Result<u32>) {
        (Cell::new(0), move |calls: &Cell<u32>| {
            calls.set(calls.get() + 1);
            if calls.get() <= failures {
                Err(disk_full())
            } else {
                Ok(calls.get())
            }
        })
    }

    fn setup() -> (TempDir, ScratchDir) {
        let tmp = TempDir::new().unwrap();
        let scratch = ScratchDir::create(tmp.path().join("022024_run")).unwrap();
        (tmp, scratch)
    }

    #[test]
    fn success_needs_no_recovery() {
        let (tmp, scratch) = setup();
        let operator = Operator::new(false);
        let space = FixedSpace(0);
        let mut guard = SpaceGuard::new(tmp.path(), 100, 5, &space, &operator);

        let (calls, attempt) = flaky(0);
        assert_eq!(guard.run(&scratch, |_| attempt(&calls)).unwrap(), 1);
        assert_eq!(guard.transitions(), &[Extracting]);
    }

    #[test]
    fn recovers_when_cleanup_frees_enough_space() {
        let (tmp, scratch) = setup();
        let stale = tmp.path().join("012024_old");
        fs::create_dir_all(&stale).unwrap();
        let mtime = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        fs::File::open(&stale).unwrap().set_modified(mtime).unwrap();
        fs::write(scratch.path().join("partial.csv"), "x").unwrap();

        let operator = Operator::new(false);
        let space = FixedSpace(500);
        let mut guard = SpaceGuard::new(tmp.path(), 100, 5, &space, &operator);

        let (calls, attempt) = flaky(1);
        assert_eq!(guard.run(&scratch, |_| attempt(&calls)).unwrap(), 2);
        assert_eq!(
            guard.transitions(),
            &[Extracting, SpaceExhausted, Cleaning, Retrying, Extracting]
        );
        assert!(!stale.exists());
        assert!(scratch.path().exists());
        assert!(!scratch.path().join("partial.csv").exists());
        assert_eq!(operator.asked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn operator_can_resume() {
        let (tmp, scratch) = setup();
        let operator = Operator::new(true);
        let space = FixedSpace(10);
        let mut guard = SpaceGuard::new(tmp.path(), 100, 5, &space, &operator);

        let (calls, attempt) = flaky(2);
        assert_eq!(guard.run(&scratch, |_| attempt(&calls)).unwrap(), 3);
        assert_eq!(operator.asked.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn operator_decline_aborts_and_removes_scratch() {
        let (tmp, scratch) = setup();
        let operator = Operator::new(false);
        let space = FixedSpace(10);
        let mut guard = SpaceGuard::new(tmp.path(), 100, 5, &space, &operator);

        let (calls, attempt) = flaky(u32::MAX);
        let err = guard.run(&scratch, |_| attempt(&calls)).unwrap_err();
        assert!(matches!(err, Error::SpaceGuardAborted));
        assert_eq!(
            guard.transitions(),
            &[Extracting, SpaceExhausted, Cleaning, Aborted]
        );
        assert!(!scratch.path().exists());
    }

    #[test]
    fn recovery_budget_is_bounded() {
        let (tmp, scratch) = setup();
        let operator = Operator::new(true);
        let space = FixedSpace(u64::MAX);
        let mut guard = SpaceGuard::new(tmp.path(), 100, 2, &space, &operator);

        let (calls, attempt) = flaky(u32::MAX);
        let err = guard.run(&scratch, |_| attempt(&calls)).unwrap_err();
        assert!(matches!(err, Error::SpaceGuardAborted));
        assert_eq!(calls.get(), 3);
        assert_eq!(guard.transitions().last(), Some(&Aborted));
    }

    #[test]
    fn other_errors_pass_through() {
        let (tmp, scratch) = setup();
        let operator = Operator::new(true);
        let space = FixedSpace(0);
        let mut guard = SpaceGuard::new(tmp.path(), 100, 5, &space, &operator);

        let err = guard.run::<(), _>(&scratch, |_| Err(Error::Cancelled)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(guard.transitions(), &[Extracting]);
    }

    #[test]
    fn events_are_forwarded() {
        let (tmp, scratch) = setup();
        let operator = DeclineCleanup;
        let space = FixedSpace(0);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut guard = SpaceGuard::new(tmp.path(), 100, 5, &space, &operator).with_events(tx);

        let _ = guard.run::<(), _>(&scratch, |_| Err(disk_full()));
        let texts: Vec<String> = rx
            .try_iter()
            .map(|e| match e {
                RunEvent::Info(text) => text,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert!(texts.first().unwrap().starts_with("Disk full"));
        assert!(texts.last().unwrap().starts_with("Stopped"));
    }

    #[test]
    fn headroom_requires_more_than_the_minimum() {
        let tmp = TempDir::new().unwrap();
        assert!(ensure_headroom(&FixedSpace(101), tmp.path(), 100).is_ok());
        let err = ensure_headroom(&FixedSpace(100), tmp.path(), 100).unwrap_err();
        assert!(matches!(err, Error::DiskExhausted(_)));
    }
}
