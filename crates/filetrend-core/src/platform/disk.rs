/// Free-space probing for the volume that holds the scratch folder.
use std::io;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Source of free-space figures. Injected into the space guard so tests can
/// simulate a full disk.
pub trait FreeSpace: Send + Sync {
    /// Bytes available to this process on the volume containing `path`.
    fn available_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// Reads the system disk list and picks the mount point that is the longest
/// prefix of `path`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFreeSpace;

impl FreeSpace for SystemFreeSpace {
    fn available_bytes(&self, path: &Path) -> io::Result<u64> {
        let target = existing_ancestor(path);
        let target = target.canonicalize().unwrap_or(target);
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| d.available_space())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mounted volume contains {}", path.display()),
                )
            })
    }
}

/// The path itself if it exists, otherwise its closest existing ancestor.
fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}
