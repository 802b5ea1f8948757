/// Per-period measurement: de-duplicate descriptors, read every file and
/// collect inventory rows plus null details.
use super::events::{percent, RunEvent};
use crate::error::{Error, Result};
use crate::model::size::file_size_kb;
use crate::model::{FileDescriptor, InventoryRow, NullDetail, PeriodId};
use crate::reader::read_table;
use crossbeam_channel::Sender;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// Rows and null details measured for one period.
#[derive(Debug, Default)]
pub struct PeriodInventory {
    pub rows: Vec<InventoryRow>,
    pub details: Vec<NullDetail>,
}

/// Keep the first descriptor for each base name, in discovery order.
pub fn dedup_by_name(descriptors: Vec<FileDescriptor>) -> Vec<FileDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|d| {
            let fresh = seen.insert(d.file_name());
            if !fresh {
                debug!("Duplicate name {} skipped: {}", d.file_name(), d.path.display());
            }
            fresh
        })
        .collect()
}

/// Measure every descriptor. Per-file failures become zero-row entries with
/// an error detail; only cancellation stops the period.
pub fn measure_period(
    period: &PeriodId,
    period_dir: &Path,
    descriptors: &[FileDescriptor],
    streaming_threshold: u64,
    cancel: &AtomicBool,
    tx: &Sender<RunEvent>,
) -> Result<PeriodInventory> {
    let mut inventory = PeriodInventory::default();
    let total = descriptors.len();

    for (idx, descriptor) in descriptors.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        let name = descriptor.display_name(period_dir);
        let source = descriptor.original_archive_path.display().to_string();

        let row_count = if descriptor.unreadable {
            inventory.details.push(failure_detail(&name, &source, "archive could not be expanded"));
            0
        } else {
            match read_table(&descriptor.path, streaming_threshold) {
                Ok(read) => {
                    if let Some(table) = read.table() {
                        inventory.details.extend(table.blank_cells().into_iter().map(|blank| NullDetail {
                            file_name: name.clone(),
                            path: source.clone(),
                            row: Some(blank.row_number),
                            affected_columns: blank.columns.join(", "),
                            error: String::new(),
                        }));
                    }
                    read.row_count()
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    if e.is_per_file() {
                        warn!("Period {period}: {name} ({source}) counted as empty: {e}");
                    } else {
                        error!("Period {period}: {name} ({source}) failed: {e}");
                    }
                    inventory.details.push(failure_detail(&name, &source, &e.to_string()));
                    0
                }
            }
        };

        inventory.rows.push(InventoryRow {
            ordinal: idx as u32 + 1,
            file_name: name,
            // Extracted entries report their own size, not the archive's.
            size_kb: file_size_kb(&descriptor.path).unwrap_or(0.0),
            row_count,
            period: period.clone(),
        });
        let _ = tx.send(RunEvent::ProgressPeriod(percent(idx + 1, total)));
    }

    Ok(inventory)
}

fn failure_detail(name: &str, source: &str, error: &str) -> NullDetail {
    NullDetail {
        file_name: name.to_string(),
        path: source.to_string(),
        row: None,
        affected_columns: String::new(),
        error: error.to_string(),
    }
}
