/// A file discovered in a period folder, possibly extracted from an archive.
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Where the content lives now (inside scratch for extracted files).
    pub path: PathBuf,
    /// The file users see in the period folder.
    pub original_archive_path: PathBuf,
    /// Entry path inside the archive chain, `/`-separated. Empty for plain files.
    pub internal_path: String,
    /// Set when this descriptor is an archive whose extraction failed.
    pub unreadable: bool,
}

impl FileDescriptor {
    /// A plain file found directly in the period folder.
    pub fn plain(path: PathBuf) -> Self {
        Self {
            original_archive_path: path.clone(),
            path,
            internal_path: String::new(),
            unreadable: false,
        }
    }

    /// A file extracted from `original` at `internal_path`.
    pub fn extracted(path: PathBuf, original: PathBuf, internal_path: String) -> Self {
        Self {
            path,
            original_archive_path: original,
            internal_path,
            unreadable: false,
        }
    }

    /// An archive that could not be expanded; it is inventoried as-is.
    pub fn unreadable_archive(path: PathBuf, original: PathBuf, internal_path: String) -> Self {
        Self {
            path,
            original_archive_path: original,
            internal_path,
            unreadable: true,
        }
    }

    pub fn is_extracted(&self) -> bool {
        !self.internal_path.is_empty()
    }

    /// Base name of `path`; used to de-duplicate within a period.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Name shown in reports: the archive-internal path for extracted files,
    /// otherwise the path relative to the period folder.
    pub fn display_name(&self, period_dir: &Path) -> String {
        if self.is_extracted() {
            return self.internal_path.replace('\\', "/");
        }
        let rel = self.path.strip_prefix(period_dir).unwrap_or(&self.path);
        rel.to_string_lossy().replace('\\', "/")
    }
}
