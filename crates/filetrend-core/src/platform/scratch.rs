/// Period-scoped scratch directories for archive extraction.
///
/// A [`ScratchDir`] is removed when dropped, on every exit path of a period
/// (success, per-file error, cancellation or abort).
use super::retry::{retry_with_backoff, RetryPolicy};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Owned scratch directory, deleted with bounded retry on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    policy: RetryPolicy,
}

impl ScratchDir {
    /// Create (or reuse) the directory at `path`.
    pub fn create(path: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&path)?;
        debug!("Scratch directory created: {}", path.display());
        Ok(Self {
            path,
            policy: RetryPolicy::DEFAULT,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the directory by deleting and recreating it.
    pub fn recreate(&self) -> io::Result<()> {
        remove_dir_all_retry(&self.path, self.policy)?;
        fs::create_dir_all(&self.path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = remove_dir_all_retry(&self.path, self.policy) {
            warn!("Could not remove scratch directory {}: {e}", self.path.display());
        }
    }
}

/// Remove a directory tree, retrying with read-only bits cleared between
/// attempts. A missing directory counts as success.
pub fn remove_dir_all_retry(path: &Path, policy: RetryPolicy) -> io::Result<()> {
    retry_with_backoff(
        policy,
        || match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        },
        |_| clear_readonly(path),
    )
}

/// Best-effort: make every entry under `root` writable.
#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(root: &Path) {
    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::Serial);
    for entry in walker.into_iter().flatten() {
        if let Ok(meta) = entry.metadata() {
            let mut perms = meta.permissions();
            if perms.readonly() {
                perms.set_readonly(false);
                let _ = fs::set_permissions(entry.path(), perms);
            }
        }
    }
}

/// Delete every subdirectory of `root` except the most recently modified one.
///
/// Returns the directories that were removed. Individual failures are
/// logged and skipped.
pub fn remove_stale_subtrees(root: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Cannot list scratch folder {}: {e}", root.display());
            }
            return Vec::new();
        }
    };

    let mut dirs: Vec<(PathBuf, SystemTime)> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (e.path(), modified)
        })
        .collect();

    // Newest first; the first entry survives.
    dirs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = Vec::new();
    for (dir, _) in dirs.into_iter().skip(1) {
        match remove_dir_all_retry(&dir, RetryPolicy::DEFAULT) {
            Ok(()) => {
                info!("Removed stale scratch directory {}", dir.display());
                removed.push(dir);
            }
            Err(e) => warn!("Could not remove stale scratch directory {}: {e}", dir.display()),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("period");
        {
            let scratch = ScratchDir::create(path.clone()).unwrap();
            fs::write(scratch.path().join("a.csv"), "x").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn recreate_empties_directory() {
        let tmp = TempDir::new().unwrap();
        let scratch = ScratchDir::create(tmp.path().join("p")).unwrap();
        fs::write(scratch.path().join("a.csv"), "x").unwrap();
        scratch.recreate().unwrap();
        assert!(scratch.path().exists());
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn removing_missing_directory_succeeds() {
        let tmp = TempDir::new().unwrap();
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        assert!(remove_dir_all_retry(&tmp.path().join("nope"), policy).is_ok());
    }

    #[test]
    fn read_only_files_are_removed() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("locked");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("ro.csv");
        fs::write(&file, "x").unwrap();
        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();

        remove_dir_all_retry(&dir, RetryPolicy::new(3, Duration::from_millis(1))).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn stale_subtrees_keep_newest() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("012024_old");
        let new = tmp.path().join("022024_new");
        fs::create_dir_all(&old).unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        fs::create_dir_all(&new).unwrap();
        fs::write(new.join("a.csv"), "x").unwrap();

        let removed = remove_stale_subtrees(tmp.path());
        assert_eq!(removed, vec![old.clone()]);
        assert!(!old.exists());
        assert!(new.exists());
    }
}
