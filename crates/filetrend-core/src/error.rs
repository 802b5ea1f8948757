/// Error taxonomy for the core engine.
///
/// Per-file variants (`UnsupportedFormat`, `UnreadableTable`, `MissingCodec`)
/// are caught by the pipeline and recorded as zero-row entries. Archive
/// failures degrade to an unreadable descriptor. `DiskExhausted` only ever
/// reaches the space guard.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("unreadable table {}: {reason}", path.display())]
    UnreadableTable { path: PathBuf, reason: String },

    #[error("missing codec `{codec}` for {}", path.display())]
    MissingCodec { path: PathBuf, codec: &'static str },

    #[error("unsupported archive format: {}", path.display())]
    UnsupportedArchiveFormat { path: PathBuf },

    #[error("archive extraction failed for {}: {reason}", path.display())]
    ArchiveExtractionFailed { path: PathBuf, reason: String },

    #[error("disk exhausted: {0}")]
    DiskExhausted(#[source] std::io::Error),

    #[error("ledger load failed for {}: {reason}", path.display())]
    LedgerLoadFailed { path: PathBuf, reason: String },

    #[error("ledger save failed for {}: {source}", path.display())]
    LedgerSaveFailed {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("aborted after running out of disk space")]
    SpaceGuardAborted,

    #[error("cancelled")]
    Cancelled,

    #[error("run worker panicked")]
    WorkerPanicked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors that only concern a single input file and must never stop a period.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. }
                | Error::UnreadableTable { .. }
                | Error::MissingCodec { .. }
                | Error::Io(_)
        )
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::UnreadableTable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ArchiveExtractionFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Whether an I/O error means the target volume ran out of space.
///
/// Covers `ENOSPC` on Unix and `ERROR_DISK_FULL` / `ERROR_HANDLE_DISK_FULL`
/// on Windows, plus the portable `StorageFull` kind.
pub fn is_out_of_space(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::StorageFull {
        return true;
    }
    match err.raw_os_error() {
        #[cfg(unix)]
        Some(28) => true,
        #[cfg(windows)]
        Some(39) | Some(112) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn storage_full_kind_is_out_of_space() {
        let err = io::Error::new(io::ErrorKind::StorageFull, "full");
        assert!(is_out_of_space(&err));
    }

    #[cfg(unix)]
    #[test]
    fn enospc_is_out_of_space() {
        assert!(is_out_of_space(&io::Error::from_raw_os_error(28)));
    }

    #[test]
    fn other_errors_are_not_out_of_space() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(!is_out_of_space(&err));
    }

    #[test]
    fn per_file_classification() {
        assert!(Error::UnsupportedFormat { path: "a.bin".into() }.is_per_file());
        assert!(Error::unreadable("a.csv", "bad").is_per_file());
        assert!(!Error::Cancelled.is_per_file());
        assert!(!Error::DiskExhausted(io::Error::other("x")).is_per_file());
    }
}
