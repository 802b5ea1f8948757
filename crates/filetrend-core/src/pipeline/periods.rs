/// Period discovery: the `MMYYYY` folders directly under the base path.
use crate::model::PeriodId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A period folder found under the base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodDir {
    pub id: PeriodId,
    pub path: PathBuf,
}

/// List the period folders under `base`, oldest first.
///
/// Entries whose name is not a valid period token, and plain files, are
/// ignored. Six-digit names with a month outside `01..=12` are skipped
/// with a warning.
pub fn scan_periods(base: &Path) -> io::Result<Vec<PeriodDir>> {
    let mut periods = Vec::new();
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match PeriodId::parse(&name) {
            Some(id) => periods.push(PeriodDir {
                id,
                path: entry.path(),
            }),
            None if looks_like_period(&name) => {
                warn!("Skipping {}: month is not 01-12", entry.path().display())
            }
            None => debug!("Skipping non-period folder {}", entry.path().display()),
        }
    }
    periods.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(periods)
}

/// Six digits, so probably meant as a period even if the month is invalid.
fn looks_like_period(name: &str) -> bool {
    name.len() == 6 && name.bytes().all(|b| b.is_ascii_digit())
}
