/// Bounded retry with fixed backoff.
///
/// Shared by scratch cleanup and ledger persistence, both of which can hit
/// transient locks held by other processes (antivirus, indexers, a
/// spreadsheet still open in another program).
use std::thread;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        attempts: 5,
        delay: Duration::from_millis(100),
    };

    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Run `op` up to `policy.attempts` times, sleeping `policy.delay` between
/// failures. `on_error` runs after each failure before the next attempt and
/// may try to repair the condition (e.g. clear read-only bits).
///
/// Returns the last error when every attempt fails. Zero attempts is treated
/// as one.
pub fn retry_with_backoff<T, E, F, R>(policy: RetryPolicy, mut op: F, mut on_error: R) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    R: FnMut(&E),
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                debug!("Attempt {attempt}/{attempts} failed: {err}");
                on_error(&err);
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FAST: RetryPolicy = RetryPolicy {
        attempts: 5,
        delay: Duration::from_millis(1),
    };

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let repairs = Cell::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            FAST,
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("locked".to_string())
                } else {
                    Ok(7)
                }
            },
            |_| repairs.set(repairs.get() + 1),
        );
        assert_eq!(result, Ok(7));
        assert_eq!(calls.get(), 3);
        assert_eq!(repairs.get(), 2);
    }

    #[test]
    fn gives_up_after_attempt_limit() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry_with_backoff(
            FAST,
            || {
                calls.set(calls.get() + 1);
                Err(format!("failure {}", calls.get()))
            },
            |_| {},
        );
        assert_eq!(result, Err("failure 5".to_string()));
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let _: Result<(), String> = retry_with_backoff(
            policy,
            || {
                calls.set(calls.get() + 1);
                Err("no".into())
            },
            |_| {},
        );
        assert_eq!(calls.get(), 1);
    }
}
