/// Single-archive extraction.
///
/// The container kind is decided from magic bytes, not the extension: the
/// extension only nominates candidates. Every entry name goes through the
/// sanitiser before anything is written.
use super::sanitize::safe_join;
use crate::error::{is_out_of_space, Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const TAR_MAGIC_OFFSET: usize = 257;
const SNIFF_LEN: u64 = 512;

/// Extensions that nominate a file for expansion (lower-case).
const CANDIDATE_SUFFIXES: &[&str] = &[
    ".zip", ".tar", ".tar.gz", ".tgz", ".gz", ".bz2", ".xz", ".7z",
];

/// Extensions that imply a tarball even without a `ustar` header (v7 tars).
const TAR_SUFFIXES: &[&str] = &[".tar", ".tgz", ".tar.gz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    CompressedTar(Compression),
    /// A single compressed stream that is not a tarball.
    Compressed(Compression),
    SevenZip,
}

/// A file written by an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub path: PathBuf,
    /// Sanitised entry name, `/`-separated.
    pub internal: String,
}

pub fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    CANDIDATE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

fn has_tar_suffix(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    TAR_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Identify the container kind of `path` from its leading bytes.
///
/// `Ok(None)` means the content matches no supported container.
pub fn sniff(path: &Path) -> io::Result<Option<ArchiveKind>> {
    let head = read_prefix(File::open(path)?, SNIFF_LEN)?;
    let name = file_name(path);

    let compression = if head.starts_with(&[0x1F, 0x8B]) {
        Some(Compression::Gzip)
    } else if head.starts_with(b"BZh") {
        Some(Compression::Bzip2)
    } else if head.starts_with(&[0xFD, b'7', b'z', b'X', b'Z', 0x00]) {
        Some(Compression::Xz)
    } else {
        None
    };

    if let Some(c) = compression {
        // Peek through the compression layer for a tar header.
        let inner = read_prefix(decoder(c, File::open(path)?), SNIFF_LEN).unwrap_or_default();
        let kind = if has_ustar_magic(&inner) || has_tar_suffix(&name) {
            ArchiveKind::CompressedTar(c)
        } else {
            ArchiveKind::Compressed(c)
        };
        return Ok(Some(kind));
    }

    if head.starts_with(b"PK") {
        return Ok(Some(ArchiveKind::Zip));
    }
    if head.starts_with(&[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C]) {
        return Ok(Some(ArchiveKind::SevenZip));
    }
    if has_ustar_magic(&head) || (has_tar_suffix(&name) && head.len() >= 512) {
        return Ok(Some(ArchiveKind::Tar));
    }
    Ok(None)
}

/// Extract `archive` into `dest`, returning the regular files written.
///
/// Out-of-space failures surface as [`Error::DiskExhausted`]; `cancel` is
/// polled before every entry.
pub fn extract_archive(archive: &Path, dest: &Path, cancel: &AtomicBool) -> Result<Vec<ExtractedEntry>> {
    let kind = sniff(archive)
        .map_err(|e| Error::extraction(archive, e))?
        .ok_or_else(|| Error::UnsupportedArchiveFormat {
            path: archive.to_path_buf(),
        })?;
    debug!("Extracting {} as {kind:?}", archive.display());

    fs::create_dir_all(dest).map_err(|e| write_failure(archive, e))?;
    let open = || File::open(archive).map(BufReader::new).map_err(|e| Error::extraction(archive, e));

    let mut written = Vec::new();
    match kind {
        ArchiveKind::Zip => extract_zip(archive, open()?, dest, cancel, &mut written)?,
        ArchiveKind::Tar => extract_tar(archive, open()?, dest, cancel, &mut written)?,
        ArchiveKind::CompressedTar(c) => {
            extract_tar(archive, decoder(c, open()?), dest, cancel, &mut written)?
        }
        ArchiveKind::Compressed(c) => {
            check_cancel(cancel)?;
            let name = single_stream_name(archive);
            let target = dest.join(&name);
            write_entry(archive, &mut decoder(c, open()?), &target)?;
            written.push(ExtractedEntry {
                path: target,
                internal: name,
            });
        }
        ArchiveKind::SevenZip => extract_sevenz(archive, dest, cancel, &mut written)?,
    }
    Ok(written)
}

fn extract_zip<R: Read + io::Seek>(
    archive: &Path,
    reader: R,
    dest: &Path,
    cancel: &AtomicBool,
    written: &mut Vec<ExtractedEntry>,
) -> Result<()> {
    let mut zip = zip::ZipArchive::new(reader).map_err(|e| Error::extraction(archive, e))?;
    for i in 0..zip.len() {
        check_cancel(cancel)?;
        let mut entry = zip.by_index(i).map_err(|e| Error::extraction(archive, e))?;
        let Some((target, internal)) = safe_join(dest, entry.name()) else {
            continue;
        };
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| write_failure(archive, e))?;
            continue;
        }
        write_entry(archive, &mut entry, &target)?;
        written.push(ExtractedEntry { path: target, internal });
    }
    Ok(())
}

fn extract_tar<R: Read>(
    archive: &Path,
    reader: R,
    dest: &Path,
    cancel: &AtomicBool,
    written: &mut Vec<ExtractedEntry>,
) -> Result<()> {
    let mut tar = tar::Archive::new(reader);
    let entries = tar.entries().map_err(|e| Error::extraction(archive, e))?;
    for entry in entries {
        check_cancel(cancel)?;
        let mut entry = entry.map_err(|e| Error::extraction(archive, e))?;
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            if let Some((target, _)) = safe_join(dest, &raw) {
                fs::create_dir_all(&target).map_err(|e| write_failure(archive, e))?;
            }
            continue;
        }
        // Links, devices and FIFOs are never materialised.
        if !kind.is_file() {
            continue;
        }
        let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let Some((target, internal)) = safe_join(dest, &raw) else {
            continue;
        };
        write_entry(archive, &mut entry, &target)?;
        written.push(ExtractedEntry { path: target, internal });
    }
    Ok(())
}

#[cfg(feature = "sevenz")]
fn extract_sevenz(
    archive: &Path,
    dest: &Path,
    cancel: &AtomicBool,
    written: &mut Vec<ExtractedEntry>,
) -> Result<()> {
    let mut failure: Option<Error> = None;
    sevenz_rust::decompress_file_with_extract_fn(archive, dest, |entry, reader, _| {
        if cancel.load(Ordering::Relaxed) {
            failure = Some(Error::Cancelled);
            return Ok(false);
        }
        if entry.is_directory() {
            return Ok(true);
        }
        let Some((target, internal)) = safe_join(dest, entry.name()) else {
            return Ok(true);
        };
        match write_entry(archive, reader, &target) {
            Ok(()) => {
                written.push(ExtractedEntry { path: target, internal });
                Ok(true)
            }
            Err(e) => {
                failure = Some(e);
                Ok(false)
            }
        }
    })
    .map_err(|e| Error::extraction(archive, e))?;
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(not(feature = "sevenz"))]
fn extract_sevenz(
    archive: &Path,
    _dest: &Path,
    _cancel: &AtomicBool,
    _written: &mut Vec<ExtractedEntry>,
) -> Result<()> {
    Err(Error::UnsupportedArchiveFormat {
        path: archive.to_path_buf(),
    })
}

fn write_entry<R: Read + ?Sized>(archive: &Path, reader: &mut R, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| write_failure(archive, e))?;
    }
    let mut out = File::create(target).map_err(|e| write_failure(archive, e))?;
    io::copy(reader, &mut out).map_err(|e| write_failure(archive, e))?;
    Ok(())
}

/// Out-of-space is never degraded to an extraction failure.
fn write_failure(archive: &Path, err: io::Error) -> Error {
    if is_out_of_space(&err) {
        Error::DiskExhausted(err)
    } else {
        Error::extraction(archive, err)
    }
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

fn decoder<'a, R: Read + 'a>(compression: Compression, reader: R) -> Box<dyn Read + 'a> {
    match compression {
        Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
    }
}

fn read_prefix<R: Read>(reader: R, len: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len as usize);
    reader.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

fn has_ustar_magic(head: &[u8]) -> bool {
    head.len() >= TAR_MAGIC_OFFSET + 5 && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar"
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Output name for a single compressed stream: the archive name minus its
/// compression suffix.
fn single_stream_name(archive: &Path) -> String {
    let name = file_name(archive);
    let lower = name.to_ascii_lowercase();
    for (suffix, replacement) in [
        (".tgz", ".tar"),
        (".tbz2", ".tar"),
        (".txz", ".tar"),
        (".gz", ""),
        (".bz2", ""),
        (".xz", ""),
    ] {
        if lower.ends_with(suffix) && name.len() > suffix.len() {
            return format!("{}{replacement}", &name[..name.len() - suffix.len()]);
        }
    }
    format!("{name}.out")
}
