/// Platform utilities: free-space probing, bounded retry and
/// scratch-directory lifecycle.

pub mod disk;
pub mod retry;
pub mod scratch;

pub use disk::{FreeSpace, SystemFreeSpace};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use scratch::{remove_dir_all_retry, remove_stale_subtrees, ScratchDir};
