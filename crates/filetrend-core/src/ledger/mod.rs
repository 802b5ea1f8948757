/// The cross-period historical store.
///
/// Held in memory for the whole run, one generation of rows per period.
/// Persisted as `history.csv` (primary, serde) and `history.xlsx` (for
/// people); loading prefers the CSV and falls back to the workbook.
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::model::{PeriodId, TrendClass, TrendRecord};
use crate::output::{self, Cell, ColumnKind, TableData, WrittenTable};
use crate::reader::spreadsheet::{read_sheet, SheetKind};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::Path;
use tracing::{info, warn};

const COLUMNS: &[(&str, ColumnKind)] = &[
    ("Ordinal", ColumnKind::Ordinal),
    ("File name", ColumnKind::Text),
    ("Size KB", ColumnKind::ByteSizeKb),
    ("Row count", ColumnKind::RowCount),
    ("Period", ColumnKind::Period),
    ("Historical row trend %", ColumnKind::Percentage),
    ("Historical row trend", ColumnKind::Classification),
    ("Historical size trend %", ColumnKind::Percentage),
    ("Historical size trend", ColumnKind::Classification),
];

/// Ordinal through period; the historical columns may be absent.
const REQUIRED_COLUMNS: &[(&str, ColumnKind)] = COLUMNS.split_at(5).0;

/// One inventoried file in one period, with its historical comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(rename = "Ordinal")]
    pub ordinal: u32,
    #[serde(rename = "File name")]
    pub file_name: String,
    #[serde(rename = "Size KB")]
    pub size_kb: f64,
    #[serde(rename = "Row count")]
    pub row_count: u64,
    #[serde(rename = "Period")]
    pub period: PeriodId,
    #[serde(rename = "Historical row trend %", default)]
    pub historical_rows_pct: Option<f64>,
    #[serde(rename = "Historical row trend", default = "no_comparison", deserialize_with = "lenient_class")]
    pub historical_rows_class: TrendClass,
    #[serde(rename = "Historical size trend %", default)]
    pub historical_size_pct: Option<f64>,
    #[serde(rename = "Historical size trend", default = "no_comparison", deserialize_with = "lenient_class")]
    pub historical_size_class: TrendClass,
}

fn no_comparison() -> TrendClass {
    TrendClass::NoComparison
}

fn lenient_class<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<TrendClass, D::Error> {
    let label = String::deserialize(deserializer)?;
    Ok(TrendClass::from_label(&label))
}

impl LedgerRow {
    pub fn from_record(record: &TrendRecord) -> Self {
        Self {
            ordinal: record.row.ordinal,
            file_name: record.row.file_name.clone(),
            size_kb: record.row.size_kb,
            row_count: record.row.row_count,
            period: record.row.period.clone(),
            historical_rows_pct: record.historical_rows.percentage,
            historical_rows_class: record.historical_rows.class,
            historical_size_pct: record.historical_size.percentage,
            historical_size_class: record.historical_size.class,
        }
    }

    /// Rebuild a row from spreadsheet cells keyed by header. `None` when a
    /// required column is missing or malformed.
    fn from_cells(columns: &[String], cells: &[String]) -> Option<Self> {
        let get = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .and_then(|i| cells.get(i))
                .map(|s| s.trim())
        };
        let number = |name: &str| get(name).and_then(|s| s.parse::<f64>().ok());
        let token = get("Period")?;

        Some(Self {
            ordinal: number("Ordinal")? as u32,
            file_name: get("File name")?.to_string(),
            size_kb: number("Size KB")?,
            row_count: number("Row count")? as u64,
            period: PeriodId::parse(&format!("{token:0>6}"))?,
            historical_rows_pct: number("Historical row trend %"),
            historical_rows_class: TrendClass::from_label(get("Historical row trend").unwrap_or_default()),
            historical_size_pct: number("Historical size trend %"),
            historical_size_class: TrendClass::from_label(get("Historical size trend").unwrap_or_default()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<LedgerRow>) -> Self {
        Self { rows }
    }

    /// Load the store under the configured base. Absence or corruption of
    /// both files yields an empty ledger with a warning, never an error.
    pub fn load(config: &RunConfig) -> Self {
        let csv_path = config.ledger_csv_path();
        let xlsx_path = config.ledger_xlsx_path();

        if csv_path.exists() {
            match Self::load_csv(&csv_path) {
                Ok(ledger) => {
                    info!("Ledger loaded from {} ({} rows)", csv_path.display(), ledger.len());
                    return ledger;
                }
                Err(e) => warn!("{e}"),
            }
        }
        if xlsx_path.exists() {
            match Self::load_xlsx(&xlsx_path) {
                Ok(ledger) => {
                    info!("Ledger loaded from {} ({} rows)", xlsx_path.display(), ledger.len());
                    return ledger;
                }
                Err(e) => warn!("{e}"),
            }
        }
        Self::new()
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let failed = |reason: String| Error::LedgerLoadFailed {
            path: path.to_path_buf(),
            reason,
        };
        let mut reader = csv::Reader::from_path(path).map_err(|e| failed(e.to_string()))?;
        let headers = reader.headers().map_err(|e| failed(e.to_string()))?.clone();
        if let Some((missing, _)) = REQUIRED_COLUMNS
            .iter()
            .find(|(name, _)| !headers.iter().any(|h| h == *name))
        {
            return Err(failed(format!("missing column `{missing}`")));
        }
        let rows = reader
            .deserialize::<LedgerRow>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| failed(e.to_string()))?;
        Ok(Self { rows })
    }

    pub fn load_xlsx(path: &Path) -> Result<Self> {
        let failed = |reason: String| Error::LedgerLoadFailed {
            path: path.to_path_buf(),
            reason,
        };
        let table = read_sheet(path, SheetKind::Xlsx).map_err(|e| failed(e.to_string()))?;
        let rows = table
            .rows
            .iter()
            .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
            .enumerate()
            .map(|(i, cells)| {
                LedgerRow::from_cells(&table.columns, cells).ok_or_else(|| failed(format!("malformed row {}", i + 2)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace every row of `period` with `rows`. Rows whose period differs
    /// are re-tagged.
    pub fn upsert_period(&mut self, period: &PeriodId, rows: Vec<LedgerRow>) {
        self.rows.retain(|r| &r.period != period);
        self.rows.extend(rows.into_iter().map(|mut r| {
            r.period = period.clone();
            r
        }));
    }

    pub fn rows_for_period<'a>(&'a self, period: &'a PeriodId) -> impl Iterator<Item = &'a LedgerRow> + 'a {
        self.rows.iter().filter(move |r| &r.period == period)
    }

    pub fn rows_excluding<'a>(&'a self, period: &'a PeriodId) -> impl Iterator<Item = &'a LedgerRow> + 'a {
        self.rows.iter().filter(move |r| &r.period != period)
    }

    pub fn periods(&self) -> BTreeSet<PeriodId> {
        self.rows.iter().map(|r| r.period.clone()).collect()
    }

    /// Rewrite both store files. Both are staged before either replaces
    /// its predecessor, so a failure while writing leaves the previous pair
    /// intact.
    pub fn save(&self, config: &RunConfig) -> Result<Vec<WrittenTable>> {
        let csv_path = config.ledger_csv_path();
        let xlsx_path = config.ledger_xlsx_path();
        let saved = |path: &Path, e: Error| Error::LedgerSaveFailed {
            path: path.to_path_buf(),
            source: Box::new(e),
        };

        let csv_partial = output::stage(&csv_path, |tmp| {
            let mut writer = csv::Writer::from_writer(File::create(tmp)?);
            if self.rows.is_empty() {
                writer.write_record(COLUMNS.iter().map(|(name, _)| *name))?;
            }
            for row in &self.rows {
                writer.serialize(row)?;
            }
            output::sync(writer)
        })
        .map_err(|e| saved(&csv_path, e))?;

        let table = self.table();
        let xlsx_partial = match output::stage(&xlsx_path, |tmp| output::save_workbook(tmp, &table)) {
            Ok(partial) => partial,
            Err(e) => {
                let _ = fs::remove_file(&csv_partial);
                return Err(saved(&xlsx_path, e));
            }
        };

        output::commit(&csv_partial, &csv_path).map_err(|e| {
            let _ = fs::remove_file(&xlsx_partial);
            saved(&csv_path, e)
        })?;
        output::commit(&xlsx_partial, &xlsx_path).map_err(|e| {
            warn!("Ledger CSV was replaced but the XLSX was not; the CSV is authoritative");
            saved(&xlsx_path, e)
        })?;
        info!("Ledger saved: {} rows", self.rows.len());
        Ok(vec![table.describe(&csv_path), table.describe(&xlsx_path)])
    }

    fn table(&self) -> TableData {
        let mut table = TableData::new(COLUMNS);
        for row in &self.rows {
            table.push(vec![
                Cell::Int(u64::from(row.ordinal)),
                Cell::text(&row.file_name),
                Cell::Float(row.size_kb),
                Cell::Int(row.row_count),
                Cell::text(row.period.as_str()),
                Cell::opt_float(row.historical_rows_pct),
                Cell::text(row.historical_rows_class.label()),
                Cell::opt_float(row.historical_size_pct),
                Cell::text(row.historical_size_class.label()),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn row(period: &str, name: &str, rows: u64) -> LedgerRow {
        LedgerRow {
            ordinal: 1,
            file_name: name.to_string(),
            size_kb: 1.5,
            row_count: rows,
            period: PeriodId::parse(period).unwrap(),
            historical_rows_pct: None,
            historical_rows_class: TrendClass::NoComparison,
            historical_size_pct: Some(-12.5),
            historical_size_class: TrendClass::Moderate,
        }
    }

    #[test]
    fn upsert_replaces_only_that_period() {
        let p1 = PeriodId::parse("012024").unwrap();
        let p2 = PeriodId::parse("022024").unwrap();
        let mut ledger = Ledger::from_rows(vec![row("012024", "a.csv", 1), row("022024", "b.csv", 2)]);

        ledger.upsert_period(&p1, vec![row("012024", "c.csv", 3), row("012024", "d.csv", 4)]);
        assert_eq!(ledger.rows_for_period(&p1).count(), 2);
        assert_eq!(ledger.rows_for_period(&p2).count(), 1);
        assert!(ledger.rows_for_period(&p1).all(|r| r.file_name != "a.csv"));
    }

    #[test]
    fn upsert_is_idempotent() {
        let p1 = PeriodId::parse("012024").unwrap();
        let mut ledger = Ledger::new();
        let batch = vec![row("012024", "a.csv", 1), row("012024", "b.csv", 2)];
        ledger.upsert_period(&p1, batch.clone());
        let once = ledger.clone();
        ledger.upsert_period(&p1, batch);
        assert_eq!(ledger, once);
    }

    #[test]
    fn save_then_load_csv() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        let ledger = Ledger::from_rows(vec![row("012024", "a.csv", 10), row("022024", "b, with comma.csv", 20)]);

        let written = ledger.save(&config).unwrap();
        assert_eq!(written.len(), 2);
        assert!(config.ledger_xlsx_path().exists());
        assert_eq!(Ledger::load(&config), ledger);
    }

    #[test]
    fn falls_back_to_xlsx_when_csv_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        let ledger = Ledger::from_rows(vec![row("012024", "a.csv", 10)]);
        ledger.save(&config).unwrap();
        fs::write(config.ledger_csv_path(), "garbage\x00,\"unterminated\n").unwrap();

        let loaded = Ledger::load(&config);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.rows()[0].file_name, "a.csv");
        assert_eq!(loaded.rows()[0].period.as_str(), "012024");
        assert_eq!(loaded.rows()[0].historical_size_class, TrendClass::Moderate);
    }

    #[test]
    fn missing_or_corrupt_store_is_empty() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        assert!(Ledger::load(&config).is_empty());

        fs::write(config.ledger_csv_path(), "Ordinal,File name\nx,y\n").unwrap();
        fs::write(config.ledger_xlsx_path(), "not a workbook").unwrap();
        assert!(Ledger::load(&config).is_empty());
    }

    #[test]
    fn empty_ledger_still_writes_headers() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        Ledger::new().save(&config).unwrap();
        let text = fs::read_to_string(config.ledger_csv_path()).unwrap();
        assert!(text.starts_with("Ordinal,File name,Size KB,Row count,Period"));
        assert!(Ledger::load(&config).is_empty());
    }

    #[test]
    fn failed_save_keeps_previous_store() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        Ledger::from_rows(vec![row("012024", "a.csv", 10)]).save(&config).unwrap();
        let before = fs::read_to_string(config.ledger_csv_path()).unwrap();

        // A directory squatting on the partial path makes the write fail.
        fs::create_dir_all(output::partial_path(&config.ledger_csv_path())).unwrap();
        let err = Ledger::from_rows(vec![row("022024", "b.csv", 1)]).save(&config).unwrap_err();
        assert!(matches!(err, Error::LedgerSaveFailed { .. }));
        assert_eq!(fs::read_to_string(config.ledger_csv_path()).unwrap(), before);
    }

    #[test]
    fn failed_xlsx_keeps_previous_csv() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        Ledger::from_rows(vec![row("012024", "a.csv", 10)]).save(&config).unwrap();
        let before = fs::read_to_string(config.ledger_csv_path()).unwrap();

        fs::create_dir_all(output::partial_path(&config.ledger_xlsx_path())).unwrap();
        let err = Ledger::from_rows(vec![row("022024", "b.csv", 1)]).save(&config).unwrap_err();
        assert!(matches!(err, Error::LedgerSaveFailed { ref path, .. } if *path == config.ledger_xlsx_path()));
        assert_eq!(fs::read_to_string(config.ledger_csv_path()).unwrap(), before);
        assert!(!output::partial_path(&config.ledger_csv_path()).exists());
        assert_eq!(Ledger::load(&config).rows()[0].file_name, "a.csv");
    }
}
