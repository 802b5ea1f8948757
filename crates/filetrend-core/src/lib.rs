/// FileTrend Core: inventory, extraction, matching and trend engine.
///
/// This crate contains all business logic with zero UI dependencies.
/// It is designed to be driven by any frontend (CLI today) through the
/// event channel exposed by [`pipeline::start_run`].
///
/// # Modules
///
/// - [`model`]: Period tokens, file descriptors, inventory and trend records.
/// - [`extract`]: Path sanitising and queue-based archive expansion.
/// - [`reader`]: Format-polymorphic table reading with a streaming mode.
/// - [`analysis`]: Similarity ratio, identity matching and trend classification.
/// - [`ledger`]: The cross-period historical store.
/// - [`output`]: Period summaries, null details and ledger tables (CSV + XLSX).
/// - [`platform`]: Free-space probing, bounded retry and scratch directories.
/// - [`guard`]: The disk-exhaustion recovery state machine.
/// - [`pipeline`]: The single-worker orchestrator and its event stream.
pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod guard;
pub mod ledger;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod reader;

pub use config::RunConfig;
pub use error::{Error, Result};
