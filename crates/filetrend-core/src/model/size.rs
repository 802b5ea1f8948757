/// Size formatting utilities.
///
/// All internal sizes are `u64` bytes until they are reported, where the
/// inventory uses fractional kilobytes (bytes / 1024).

/// Convert a byte count to the kilobyte figure stored in inventory rows.
pub fn bytes_to_kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Size of the file at `path` in kilobytes, or `None` if it cannot be read.
pub fn file_size_kb(path: &std::path::Path) -> Option<f64> {
    std::fs::metadata(path).ok().map(|m| bytes_to_kb(m.len()))
}

/// Format a byte count into a human-readable string with appropriate unit.
///
/// Binary units (KB = 1024) with two decimals above one kilobyte.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.2} KB", b / KB)
    } else if b < GB {
        format!("{:.2} MB", b / MB)
    } else {
        format!("{:.2} GB", b / GB)
    }
}
