/// Archive expansion for one period folder.
///
/// The folder is walked in sorted order; every archive found is expanded
/// through a FIFO work queue (nested archives are appended to the queue,
/// never recursed into). The output is a flat, discovery-ordered list of
/// [`FileDescriptor`]s.
pub mod archive;
pub mod sanitize;

pub use archive::{extract_archive, is_archive_name, sniff, ArchiveKind, ExtractedEntry};
pub use sanitize::{safe_join, sanitize_entry_name};

use crate::error::{Error, Result};
use crate::model::FileDescriptor;
use jwalk::{Parallelism, WalkDir};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Archives nested deeper than this are inventoried as plain files.
pub const MAX_NESTING_DEPTH: usize = 32;

const MACOS_ARTIFACT_DIR: &str = "__MACOSX";

/// An archive waiting to be expanded.
struct Task {
    archive: PathBuf,
    /// The top-level file in the period folder this archive came from.
    original: PathBuf,
    /// Chain of entry names leading to `archive`; empty for top-level archives.
    internal: String,
    depth: usize,
}

/// Whether a file name is an OS or editor artifact that never counts as data.
pub fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with("~$") || name.eq_ignore_ascii_case(MACOS_ARTIFACT_DIR)
}

fn has_ignored_component(internal: &str) -> bool {
    internal.split('/').any(is_ignored_name)
}

/// Expand every file under `period_dir`, extracting archives into
/// subdirectories of `scratch`.
///
/// A failed archive is registered as an unreadable descriptor and the walk
/// goes on. [`Error::DiskExhausted`] and [`Error::Cancelled`] abort the
/// whole expansion.
pub fn expand_period(
    period_dir: &Path,
    scratch: &Path,
    output_dir_name: &str,
    cancel: &AtomicBool,
) -> Result<Vec<FileDescriptor>> {
    expand_period_checked(period_dir, scratch, output_dir_name, cancel, &|| Ok(()))
}

/// [`expand_period`], calling `check_space` before each archive is
/// extracted. An error from `check_space` aborts the expansion.
pub fn expand_period_checked(
    period_dir: &Path,
    scratch: &Path,
    output_dir_name: &str,
    cancel: &AtomicBool,
    check_space: &dyn Fn() -> Result<()>,
) -> Result<Vec<FileDescriptor>> {
    let mut descriptors = Vec::new();
    let mut extract_counter = 0usize;

    for path in walk_period(period_dir, output_dir_name) {
        check_cancel(cancel)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_ignored_name(&name) {
            continue;
        }
        if !is_archive_name(&name) {
            descriptors.push(FileDescriptor::plain(path));
            continue;
        }

        let mut queue = VecDeque::from([Task {
            archive: path.clone(),
            original: path,
            internal: String::new(),
            depth: 0,
        }]);

        while let Some(task) = queue.pop_front() {
            check_cancel(cancel)?;
            check_space()?;
            extract_counter += 1;
            let dest = scratch.join(format!("extract_{extract_counter}"));

            let entries = match extract_archive(&task.archive, &dest, cancel) {
                Ok(entries) => entries,
                Err(e @ (Error::Cancelled | Error::DiskExhausted(_))) => return Err(e),
                Err(e) => {
                    warn!(
                        "Could not expand {} (from {}): {e}",
                        task.archive.display(),
                        task.original.display()
                    );
                    descriptors.push(FileDescriptor::unreadable_archive(
                        task.archive,
                        task.original,
                        task.internal,
                    ));
                    continue;
                }
            };
            debug!("{} yielded {} entries", task.archive.display(), entries.len());

            for entry in entries {
                if has_ignored_component(&entry.internal) {
                    continue;
                }
                let internal = if task.internal.is_empty() {
                    entry.internal.clone()
                } else {
                    format!("{}/{}", task.internal, entry.internal)
                };

                if is_archive_name(&entry.internal) {
                    if task.depth < MAX_NESTING_DEPTH {
                        queue.push_back(Task {
                            archive: entry.path,
                            original: task.original.clone(),
                            internal,
                            depth: task.depth + 1,
                        });
                        continue;
                    }
                    warn!(
                        "Nesting limit reached at {internal} in {}; kept as a plain file",
                        task.original.display()
                    );
                }
                descriptors.push(FileDescriptor::extracted(
                    entry.path,
                    task.original.clone(),
                    internal,
                ));
            }
        }
    }

    Ok(descriptors)
}

/// Regular files under `period_dir` in sorted order, skipping the reserved
/// output folder and macOS artifact folders at any depth.
fn walk_period(period_dir: &Path, output_dir_name: &str) -> Vec<PathBuf> {
    let reserved = output_dir_name.to_string();
    let walker = WalkDir::new(period_dir)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(Parallelism::Serial)
        .process_read_dir(move |_depth, _path, _state, children| {
            children.retain(|child| match child {
                Ok(entry) => {
                    if !entry.file_type().is_dir() {
                        return true;
                    }
                    let name = entry.file_name().to_string_lossy();
                    !(name.eq_ignore_ascii_case(&reserved) || name.eq_ignore_ascii_case(MACOS_ARTIFACT_DIR))
                }
                Err(_) => true,
            });
        });

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry under {}: {e}", period_dir.display()),
        }
    }
    files
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn ignored_names() {
        assert!(is_ignored_name(".DS_Store"));
        assert!(is_ignored_name("~$budget.xlsx"));
        assert!(is_ignored_name("__MACOSX"));
        assert!(!is_ignored_name("budget.xlsx"));
        assert!(has_ignored_component("__MACOSX/._a.csv"));
        assert!(!has_ignored_component("data/a.csv"));
    }

    #[test]
    fn plain_files_in_sorted_order_without_reserved_folder() {
        let tmp = TempDir::new().unwrap();
        let period = tmp.path().join("012024");
        fs::create_dir_all(period.join("generated_summary")).unwrap();
        fs::create_dir_all(period.join("sub")).unwrap();
        fs::write(period.join("b.csv"), "a\n1\n").unwrap();
        fs::write(period.join("a.csv"), "a\n1\n").unwrap();
        fs::write(period.join("sub").join("c.csv"), "a\n1\n").unwrap();
        fs::write(period.join("generated_summary").join("summary_012024.csv"), "x").unwrap();
        fs::write(period.join("~$lock.xlsx"), "x").unwrap();

        let scratch = tmp.path().join("scratch");
        let found = expand_period(&period, &scratch, "generated_summary", &AtomicBool::new(false)).unwrap();
        let names: Vec<String> = found.iter().map(|d| d.display_name(&period)).collect();
        assert_eq!(names, vec!["a.csv", "b.csv", "sub/c.csv"]);
    }

    #[test]
    fn unreadable_archive_is_registered() {
        let tmp = TempDir::new().unwrap();
        let period = tmp.path().join("012024");
        fs::create_dir_all(&period).unwrap();
        fs::write(period.join("broken.zip"), "definitely not a zip").unwrap();

        let found = expand_period(&period, &tmp.path().join("s"), "out", &AtomicBool::new(false)).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].unreadable);
        assert_eq!(found[0].path, period.join("broken.zip"));
    }

    #[test]
    fn preset_cancel_flag_stops_immediately() {
        let tmp = TempDir::new().unwrap();
        let period = tmp.path().join("012024");
        fs::create_dir_all(&period).unwrap();
        fs::write(period.join("a.csv"), "a\n1\n").unwrap();

        let err = expand_period(&period, &tmp.path().join("s"), "out", &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn space_check_runs_only_for_archives() {
        let tmp = TempDir::new().unwrap();
        let period = tmp.path().join("012024");
        fs::create_dir_all(&period).unwrap();
        fs::write(period.join("a.csv"), "a\n1\n").unwrap();

        let full = || -> Result<()> {
            Err(Error::DiskExhausted(std::io::Error::new(std::io::ErrorKind::StorageFull, "full")))
        };
        let found = expand_period_checked(&period, &tmp.path().join("s"), "out", &AtomicBool::new(false), &full).unwrap();
        assert_eq!(found.len(), 1);

        fs::write(period.join("b.zip"), "not really a zip").unwrap();
        let err = expand_period_checked(&period, &tmp.path().join("s"), "out", &AtomicBool::new(false), &full).unwrap_err();
        assert!(matches!(err, Error::DiskExhausted(_)));
    }
}
