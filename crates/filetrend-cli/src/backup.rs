/// Backup of previous outputs before a run.
///
/// Existing ledger files and per-period output folders are moved into
/// `<dest>/<base name>_<YYYYMMDD_HHMMSS>/`, keeping their path relative to
/// the base folder, so a new run never mixes with stale results.
use anyhow::Context;
use filetrend_core::pipeline::scan_periods;
use filetrend_core::RunConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Move previous outputs under `dest`. Returns the backup folder, or
/// `None` when there was nothing to move.
pub fn backup_outputs(config: &RunConfig, dest: &Path) -> anyhow::Result<Option<PathBuf>> {
    let base = &config.base_path;
    let mut targets: Vec<PathBuf> = [config.ledger_xlsx_path(), config.ledger_csv_path()]
        .into_iter()
        .filter(|p| p.is_file())
        .collect();
    let periods = scan_periods(base).with_context(|| format!("Cannot list {}", base.display()))?;
    targets.extend(
        periods
            .iter()
            .map(|p| config.period_output_dir(p.id.as_str()))
            .filter(|dir| dir.is_dir()),
    );
    if targets.is_empty() {
        return Ok(None);
    }

    let base_name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "base".to_string());
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let root = dest.join(format!("{base_name}_{stamp}"));

    for source in targets {
        let rel = source.strip_prefix(base).unwrap_or(&source);
        let target = root.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        move_path(&source, &target)
            .with_context(|| format!("Cannot move {} to {}", source.display(), target.display()))?;
        info!("Backed up {} to {}", source.display(), target.display());
    }
    Ok(Some(root))
}

/// Rename, falling back to copy-and-delete across volumes.
fn move_path(source: &Path, target: &Path) -> io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    if source.is_dir() {
        copy_dir(source, target)?;
        fs::remove_dir_all(source)
    } else {
        fs::copy(source, target)?;
        fs::remove_file(source)
    }
}

fn copy_dir(source: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let to = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), to)?;
        }
    }
    Ok(())
}
