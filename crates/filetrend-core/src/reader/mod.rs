/// Format-polymorphic table reading.
///
/// [`read_table`] dispatches on the file extension. Files above the
/// streaming threshold are counted without being materialised; smaller
/// files are parsed into a [`Table`] so blank cells can be reported.
#[cfg(feature = "parquet")]
pub mod columnar;
pub mod delimited;
pub mod html;
pub mod json;
pub mod spreadsheet;

use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Parsed tabular content. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A data row that has at least one blank cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankCells {
    /// Spreadsheet line number: data index + 2 (header is line 1).
    pub row_number: u64,
    pub columns: Vec<String>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table, padding short rows and truncating long ones to the
    /// header width.
    pub fn from_records(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Rows that are not blank across every column.
    pub fn row_count(&self) -> u64 {
        self.rows.iter().filter(|row| !is_blank_row(row)).count() as u64
    }

    pub fn blank_cells(&self) -> Vec<BlankCells> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let columns: Vec<String> = row
                    .iter()
                    .zip(&self.columns)
                    .filter(|(cell, _)| is_blank(cell))
                    .map(|(_, col)| col.clone())
                    .collect();
                (!columns.is_empty()).then(|| BlankCells {
                    row_number: i as u64 + 2,
                    columns,
                })
            })
            .collect()
    }
}

fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| is_blank(c))
}

/// Outcome of reading one file.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRead {
    /// Large file counted in streaming mode; no cell content available.
    Counted(u64),
    Parsed(Table),
}

impl TableRead {
    pub fn row_count(&self) -> u64 {
        match self {
            TableRead::Counted(n) => *n,
            TableRead::Parsed(table) => table.row_count(),
        }
    }

    pub fn table(&self) -> Option<&Table> {
        match self {
            TableRead::Counted(_) => None,
            TableRead::Parsed(table) => Some(table),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Delimited,
    Spreadsheet(spreadsheet::SheetKind),
    Json,
    Parquet,
    Html,
    PlainLog,
}

/// Map a file name to its reader. `None` for unsupported extensions.
pub fn detect_format(path: &Path) -> Option<TableFormat> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    let format = match ext.as_str() {
        "csv" | "tsv" | "txt" => TableFormat::Delimited,
        "xlsx" => TableFormat::Spreadsheet(spreadsheet::SheetKind::Xlsx),
        "xlsm" => TableFormat::Spreadsheet(spreadsheet::SheetKind::Xlsm),
        "xls" => TableFormat::Spreadsheet(spreadsheet::SheetKind::Xls),
        "ods" => TableFormat::Spreadsheet(spreadsheet::SheetKind::Ods),
        "json" => TableFormat::Json,
        "parquet" => TableFormat::Parquet,
        "html" | "htm" => TableFormat::Html,
        "log" | "conf" => TableFormat::PlainLog,
        _ => return None,
    };
    Some(format)
}

/// Read `path`, counting instead of parsing when it is larger than
/// `streaming_threshold` bytes.
pub fn read_table(path: &Path, streaming_threshold: u64) -> Result<TableRead> {
    let format = detect_format(path).ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let large = std::fs::metadata(path)?.len() > streaming_threshold;
    debug!("Reading {} as {format:?} (streaming: {large})", path.display());

    match format {
        TableFormat::Delimited if large => {
            Ok(TableRead::Counted(delimited::count_lines(path)?.saturating_sub(1)))
        }
        TableFormat::Delimited => delimited::read_delimited(path).map(TableRead::Parsed),
        TableFormat::Spreadsheet(kind) if large => spreadsheet::count_rows(path, kind).map(TableRead::Counted),
        TableFormat::Spreadsheet(kind) => spreadsheet::read_sheet(path, kind).map(TableRead::Parsed),
        TableFormat::Json if large => Ok(TableRead::Counted(delimited::count_lines(path)?)),
        TableFormat::Json => json::read_json(path).map(TableRead::Parsed),
        TableFormat::Parquet => read_parquet(path),
        TableFormat::Html => html::read_html(path).map(TableRead::Parsed),
        TableFormat::PlainLog if large => Ok(TableRead::Counted(delimited::count_lines(path)?)),
        TableFormat::PlainLog => Ok(TableRead::Parsed(delimited::read_log(path))),
    }
}

#[cfg(feature = "parquet")]
fn read_parquet(path: &Path) -> Result<TableRead> {
    columnar::read_parquet(path).map(TableRead::Parsed)
}

#[cfg(not(feature = "parquet"))]
fn read_parquet(path: &Path) -> Result<TableRead> {
    Err(Error::MissingCodec {
        path: path.to_path_buf(),
        codec: "parquet",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table(rows: &[&[&str]]) -> Table {
        Table::from_records(
            vec!["a".into(), "b".into()],
            rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        )
    }

    #[test]
    fn blank_rows_are_not_counted() {
        let t = table(&[&["1", "2"], &["", " "], &["3", ""]]);
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn blank_cells_use_spreadsheet_line_numbers() {
        let t = table(&[&["1", "2"], &["3", ""], &["", ""]]);
        let blanks = t.blank_cells();
        assert_eq!(blanks.len(), 2);
        assert_eq!(blanks[0].row_number, 3);
        assert_eq!(blanks[0].columns, vec!["b".to_string()]);
        assert_eq!(blanks[1].row_number, 4);
        assert_eq!(blanks[1].columns.len(), 2);
    }

    #[test]
    fn short_rows_are_padded() {
        let t = Table::from_records(vec!["a".into(), "b".into()], vec![vec!["1".into()]]);
        assert_eq!(t.rows[0], vec!["1".to_string(), String::new()]);
    }

    #[test]
    fn format_detection() {
        assert_eq!(detect_format(Path::new("x.CSV")), Some(TableFormat::Delimited));
        assert_eq!(detect_format(Path::new("x.htm")), Some(TableFormat::Html));
        assert_eq!(detect_format(Path::new("x.conf")), Some(TableFormat::PlainLog));
        assert_eq!(detect_format(Path::new("x.bin")), None);
        assert_eq!(detect_format(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_extension_is_typed_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob.bin");
        fs::write(&path, [0u8, 1, 2]).unwrap();
        let err = read_table(&path, 1024).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert!(err.is_per_file());
    }

    #[test]
    fn streaming_and_parsed_counts_agree() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rows.csv");
        let mut body = String::from("id,name\n");
        for i in 0..250 {
            body.push_str(&format!("{i},name{i}\n"));
        }
        fs::write(&path, body).unwrap();

        let parsed = read_table(&path, u64::MAX).unwrap();
        let streamed = read_table(&path, 0).unwrap();
        assert!(matches!(parsed, TableRead::Parsed(_)));
        assert!(matches!(streamed, TableRead::Counted(_)));
        assert_eq!(parsed.row_count(), 250);
        assert_eq!(streamed.row_count(), 250);
    }

    #[cfg(not(feature = "parquet"))]
    #[test]
    fn parquet_without_codec_is_missing_codec() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.parquet");
        fs::write(&path, b"PAR1").unwrap();
        assert!(matches!(
            read_table(&path, 1024).unwrap_err(),
            Error::MissingCodec { codec: "parquet", .. }
        ));
    }
}
