/// Tabular outputs: period summaries, null details and the ledger.
///
/// Every table is written as plain data (CSV and/or XLSX) and then described
/// by a [`WrittenTable`] so an optional [`TableFormatter`] can style it.
/// Nothing in this module styles cells.
pub mod summary;

pub use summary::{summary_table, write_null_details, write_period_summary, SUMMARY_COLUMNS};

use crate::error::{Error, Result};
use crate::platform::{retry_with_backoff, RetryPolicy};
use rust_xlsxwriter::Workbook;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Semantic kind of a written column, for downstream formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Ordinal,
    Text,
    Period,
    ByteSizeKb,
    RowCount,
    Percentage,
    Classification,
}

/// Description of a table the core has written.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenTable {
    pub path: PathBuf,
    pub columns: Vec<(String, ColumnKind)>,
}

/// Styling hook. Receives every written table after it is on disk.
pub trait TableFormatter: Send {
    fn format(&self, table: &WrittenTable) -> Result<()>;
}

/// A single output cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(u64),
    Float(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn opt_float(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Float)
    }

    pub fn opt_int(value: Option<u64>) -> Self {
        value.map_or(Cell::Empty, Cell::Int)
    }

    fn as_csv_field(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
            Cell::Float(x) => x.to_string(),
        }
    }
}

/// Column headers plus rows of cells, ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    pub columns: Vec<(String, ColumnKind)>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableData {
    pub fn new(columns: &[(&str, ColumnKind)]) -> Self {
        Self {
            columns: columns.iter().map(|(name, kind)| (name.to_string(), *kind)).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn describe(&self, path: &Path) -> WrittenTable {
        WrittenTable {
            path: path.to_path_buf(),
            columns: self.columns.clone(),
        }
    }
}

/// Write `table` as CSV at `path`, atomically.
pub fn write_csv(path: &Path, table: &TableData) -> Result<WrittenTable> {
    write_atomically(path, |tmp| {
        let mut writer = csv::Writer::from_writer(File::create(tmp)?);
        writer.write_record(table.columns.iter().map(|(name, _)| name.as_str()))?;
        for row in &table.rows {
            writer.write_record(row.iter().map(Cell::as_csv_field))?;
        }
        sync(writer)
    })?;
    Ok(table.describe(path))
}

/// Write `table` as a single-sheet XLSX workbook at `path`, atomically.
pub fn write_xlsx(path: &Path, table: &TableData) -> Result<WrittenTable> {
    write_atomically(path, |tmp| save_workbook(tmp, table))?;
    Ok(table.describe(path))
}

pub(crate) fn save_workbook(path: &Path, table: &TableData) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, (name, _)) in table.columns.iter().enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Int(n) => {
                    sheet.write_number(r, c, *n as f64)?;
                }
                Cell::Float(x) => {
                    sheet.write_number(r, c, *x)?;
                }
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

/// Flush and fsync a CSV writer backed by a file.
pub(crate) fn sync(writer: csv::Writer<File>) -> Result<()> {
    let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// `<target>.partial`, next to the target.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

/// Produce `target` by writing a sibling `.partial` file and renaming it
/// over the target with bounded retry. On any failure the previous target
/// is left untouched and the partial file is removed.
pub fn write_atomically<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let partial = stage(target, write)?;
    commit(&partial, target)
}

/// First half of [`write_atomically`]: write the `.partial` sibling of
/// `target` and return its path. The target is not touched.
pub(crate) fn stage<F>(target: &Path, write: F) -> Result<PathBuf>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(target);
    if let Err(e) = write(&partial) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    Ok(partial)
}

/// Second half of [`write_atomically`]: rename a staged file over `target`.
pub(crate) fn commit(partial: &Path, target: &Path) -> Result<()> {
    retry_with_backoff(RetryPolicy::DEFAULT, || fs::rename(partial, target), |_| {}).map_err(|e| {
        let _ = fs::remove_file(partial);
        Error::Io(e)
    })?;
    debug!("Wrote {}", target.display());
    Ok(())
}
