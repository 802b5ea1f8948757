/// Delimited text and plain log reading, plus the bounded-memory line
/// counter used by every streaming mode.
use super::Table;
use crate::error::{Error, Result};
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CHUNK: usize = 64 * 1024;

/// Number of lines in `path`, counting a final unterminated line.
pub fn count_lines(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; CHUNK];
    let mut lines = 0u64;
    let mut last = None;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        lines += memchr::memchr_iter(b'\n', &buf[..n]).count() as u64;
        last = Some(buf[n - 1]);
    }
    if matches!(last, Some(b) if b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

/// Parse a delimited file, trying UTF-8 then Latin-1 against each delimiter.
///
/// The first combination that yields more than one column wins. Failing
/// that, the first comma parse that succeeded is used.
pub fn read_delimited(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)?;
    let mut comma_fallback: Option<Table> = None;

    for (encoding, text) in decodings(&bytes) {
        for delimiter in DELIMITERS {
            let Some(table) = parse_with(&text, delimiter) else {
                continue;
            };
            if table.columns.len() > 1 {
                debug!(
                    "{} parsed as {encoding} with delimiter {:?}",
                    path.display(),
                    delimiter as char
                );
                return Ok(table);
            }
            if delimiter == b',' && comma_fallback.is_none() {
                comma_fallback = Some(table);
            }
        }
    }

    comma_fallback.ok_or_else(|| Error::unreadable(path, "no encoding and delimiter combination could be parsed"))
}

/// Tab-separated parse for `.log`/`.conf` files. Anything unparseable is an
/// empty table rather than an error.
pub fn read_log(path: &Path) -> Table {
    match fs::read(path) {
        Ok(bytes) => parse_with(&String::from_utf8_lossy(&bytes), b'\t').unwrap_or_default(),
        Err(e) => {
            debug!("Cannot read log {}: {e}", path.display());
            Table::empty()
        }
    }
}

fn decodings(bytes: &[u8]) -> Vec<(&'static str, Cow<'_, str>)> {
    let mut out = Vec::with_capacity(2);
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        out.push(("utf-8", Cow::Borrowed(text)));
    }
    let (latin, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    out.push(("latin-1", latin));
    out
}

/// `None` when the text has no header or a record is wider than the header.
fn parse_with(text: &str, delimiter: u8) -> Option<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers().ok()?.iter().map(|h| h.trim().to_string()).collect();
    if columns.is_empty() || (columns.len() == 1 && columns[0].is_empty()) {
        return None;
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        if record.len() > columns.len() {
            return None;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Some(Table::from_records(columns, rows))
}
