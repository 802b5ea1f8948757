/// Archive entry name sanitising.
///
/// Entry names come from untrusted archives. Whatever the separator style,
/// a sanitised name is a relative path with no root, drive, `.` or `..`
/// segment, so joining it onto a destination can never leave it.
use std::path::{Path, PathBuf};

/// Normalise a raw entry name into a `/`-separated relative path.
///
/// Returns an empty string when nothing safe remains; callers must skip
/// such entries.
pub fn sanitize_entry_name(raw: &str) -> String {
    let normalised = raw.replace('\\', "/");
    let mut segments: Vec<String> = Vec::new();

    for (i, segment) in normalised.split('/').enumerate() {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        // Leading drive designator ("C:").
        if i == 0 && is_drive_designator(segment) {
            continue;
        }
        // A colon inside a segment can still form a drive-relative or
        // alternate-stream path on Windows.
        segments.push(segment.replace(':', "_"));
    }

    segments.join("/")
}

/// Join a sanitised entry name onto `dest`. `None` when the name is empty
/// after sanitising.
pub fn safe_join(dest: &Path, raw: &str) -> Option<(PathBuf, String)> {
    let clean = sanitize_entry_name(raw);
    if clean.is_empty() {
        return None;
    }
    let mut target = dest.to_path_buf();
    for segment in clean.split('/') {
        target.push(segment);
    }
    Some((target, clean))
}

fn is_drive_designator(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
