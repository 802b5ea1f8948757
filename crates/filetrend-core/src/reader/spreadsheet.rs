/// Spreadsheet reading via calamine, plus a row-only count for large
/// xlsx/xlsm workbooks that streams the first worksheet's XML.
use super::Table;
use crate::error::{Error, Result};
use calamine::{open_workbook, open_workbook_auto_from_rs, Data, Ods, Range, Reader, Xls, Xlsx};
use quick_xml::events::Event;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Xlsx,
    Xlsm,
    Xls,
    Ods,
}

/// Parse the first worksheet. When the extension-specific engine fails the
/// workbook is retried with content-sniffed detection.
pub fn read_sheet(path: &Path, kind: SheetKind) -> Result<Table> {
    let range = first_sheet(path, kind).or_else(|first| {
        debug!("{} did not open as {kind:?} ({first}); sniffing content", path.display());
        sniffed_first_sheet(path).map_err(|e| Error::unreadable(path, format!("{first}; auto-detect: {e}")))
    })?;
    Ok(range_to_table(&range))
}

/// Data-row count without building a table (header excluded).
pub fn count_rows(path: &Path, kind: SheetKind) -> Result<u64> {
    match kind {
        SheetKind::Xlsx | SheetKind::Xlsm => count_xlsx_rows(path),
        SheetKind::Xls | SheetKind::Ods => {
            let range = first_sheet(path, kind).map_err(|e| Error::unreadable(path, e))?;
            Ok((range.height() as u64).saturating_sub(1))
        }
    }
}

fn first_sheet(path: &Path, kind: SheetKind) -> std::result::Result<Range<Data>, String> {
    match kind {
        SheetKind::Xlsx | SheetKind::Xlsm => {
            first_range(open_workbook::<Xlsx<_>, _>(path).map_err(|e| e.to_string())?)
        }
        SheetKind::Xls => first_range(open_workbook::<Xls<_>, _>(path).map_err(|e| e.to_string())?),
        SheetKind::Ods => first_range(open_workbook::<Ods<_>, _>(path).map_err(|e| e.to_string())?),
    }
}

fn sniffed_first_sheet(path: &Path) -> std::result::Result<Range<Data>, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    first_range(workbook)
}

fn first_range<W, RS>(mut workbook: W) -> std::result::Result<Range<Data>, String>
where
    W: Reader<RS>,
    W::Error: Display,
    RS: Read + Seek,
{
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no worksheets".to_string())?
        .map_err(|e| e.to_string())
}

fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::empty();
    };
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell_text(cell) {
            name if name.is_empty() => format!("Unnamed: {i}"),
            name => name,
        })
        .collect();
    let data = rows.map(|row| row.iter().map(cell_text).collect()).collect();
    Table::from_records(columns, data)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Highest `<row r="…">` in the first worksheet, minus the header row.
fn count_xlsx_rows(path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| Error::unreadable(path, e))?;
    let sheet = first_worksheet_entry(&archive).ok_or_else(|| Error::unreadable(path, "workbook has no worksheets"))?;
    let entry = archive.by_name(&sheet).map_err(|e| Error::unreadable(path, e))?;

    let mut reader = quick_xml::Reader::from_reader(BufReader::new(entry));
    let mut buf = Vec::new();
    let mut seen = 0u64;
    let mut max_row = 0u64;
    loop {
        match reader.read_event_into(&mut buf).map_err(|e| Error::unreadable(path, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                seen += 1;
                let declared = e
                    .try_get_attribute("r")
                    .ok()
                    .flatten()
                    .and_then(|attr| std::str::from_utf8(&attr.value).ok()?.parse::<u64>().ok());
                max_row = max_row.max(declared.unwrap_or(seen));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    debug!("{} streamed: highest row {max_row}", path.display());
    Ok(max_row.saturating_sub(1))
}

fn first_worksheet_entry<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Option<String> {
    let mut sheets: Vec<&str> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml") && !n.contains("/_rels/"))
        .collect();
    // sheet2.xml before sheet10.xml
    sheets.sort_by_key(|n| (n.len(), *n));
    sheets.first().map(|s| s.to_string())
}
