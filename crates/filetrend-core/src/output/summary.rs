/// Per-period outputs: the summary table (CSV + XLSX) and the null-detail
/// CSV. Historical-comparison columns are ledger-only and never appear here.
use super::{sync, write_atomically, write_csv, write_xlsx, Cell, ColumnKind, TableData, WrittenTable};
use crate::config::RunConfig;
use crate::error::Result;
use crate::model::{NullDetail, PeriodId, TrendRecord};
use std::fs::File;

pub const SUMMARY_COLUMNS: &[(&str, ColumnKind)] = &[
    ("Ordinal", ColumnKind::Ordinal),
    ("File name", ColumnKind::Text),
    ("Size KB", ColumnKind::ByteSizeKb),
    ("Row count", ColumnKind::RowCount),
    ("Previous file name", ColumnKind::Text),
    ("Previous size KB", ColumnKind::ByteSizeKb),
    ("Previous row count", ColumnKind::RowCount),
    ("Row trend % vs previous", ColumnKind::Percentage),
    ("Row trend vs previous", ColumnKind::Classification),
    ("Size trend % vs previous", ColumnKind::Percentage),
    ("Size trend vs previous", ColumnKind::Classification),
    ("Period", ColumnKind::Period),
];

const NULL_DETAIL_COLUMNS: &[(&str, ColumnKind)] = &[
    ("File name", ColumnKind::Text),
    ("Path", ColumnKind::Text),
    ("Row", ColumnKind::Ordinal),
    ("Affected columns", ColumnKind::Text),
    ("Error", ColumnKind::Text),
];

pub fn summary_table(records: &[TrendRecord]) -> TableData {
    let mut table = TableData::new(SUMMARY_COLUMNS);
    for rec in records {
        let prev = rec.previous.as_ref();
        table.push(vec![
            Cell::Int(u64::from(rec.row.ordinal)),
            Cell::text(&rec.row.file_name),
            Cell::Float(rec.row.size_kb),
            Cell::Int(rec.row.row_count),
            prev.map_or(Cell::Empty, |m| Cell::text(&m.file_name)),
            Cell::opt_float(prev.map(|m| m.size_kb)),
            Cell::opt_int(prev.map(|m| m.row_count)),
            Cell::opt_float(rec.previous_rows.percentage),
            Cell::text(rec.previous_rows.class.label()),
            Cell::opt_float(rec.previous_size.percentage),
            Cell::text(rec.previous_size.class.label()),
            Cell::text(rec.row.period.as_str()),
        ]);
    }
    table
}

/// Write `summary_<period>.csv` and `summary_<period>.xlsx` into the
/// period's output folder.
pub fn write_period_summary(
    config: &RunConfig,
    period: &PeriodId,
    records: &[TrendRecord],
) -> Result<Vec<WrittenTable>> {
    let dir = config.period_output_dir(period.as_str());
    let table = summary_table(records);
    let stem = format!("summary_{period}");
    Ok(vec![
        write_csv(&dir.join(format!("{stem}.csv")), &table)?,
        write_xlsx(&dir.join(format!("{stem}.xlsx")), &table)?,
    ])
}

/// Write the null-detail CSV for a period. Returns `None` when there is
/// nothing to report; no file is created in that case.
pub fn write_null_details(
    config: &RunConfig,
    period: &PeriodId,
    details: &[NullDetail],
) -> Result<Option<WrittenTable>> {
    if details.is_empty() {
        return Ok(None);
    }
    let path = config
        .period_output_dir(period.as_str())
        .join(&config.null_details_file_name);
    write_atomically(&path, |tmp| {
        let mut writer = csv::Writer::from_writer(File::create(tmp)?);
        for detail in details {
            writer.serialize(detail)?;
        }
        sync(writer)
    })?;
    Ok(Some(TableData::new(NULL_DETAIL_COLUMNS).describe(&path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InventoryRow, MatchedFile, Trend, TrendClass};
    use std::fs;
    use tempfile::TempDir;

    fn record(period: &PeriodId) -> TrendRecord {
        TrendRecord {
            row: InventoryRow {
                ordinal: 1,
                file_name: "sales.csv".into(),
                size_kb: 2.5,
                row_count: 120,
                period: period.clone(),
            },
            previous: Some(MatchedFile {
                file_name: "sales_old.csv".into(),
                size_kb: 2.0,
                row_count: 100,
            }),
            previous_rows: Trend {
                reference: Some(100.0),
                percentage: Some(20.0),
                class: TrendClass::Moderate,
            },
            previous_size: Trend {
                reference: Some(2.0),
                percentage: None,
                class: TrendClass::Slight,
            },
            historical_rows: Trend::NONE,
            historical_size: Trend::NONE,
        }
    }

    #[test]
    fn summary_has_no_historical_columns() {
        assert!(SUMMARY_COLUMNS.iter().all(|(name, _)| !name.contains("istorical")));
        let period = PeriodId::parse("022024").unwrap();
        let table = summary_table(&[record(&period)]);
        assert_eq!(table.rows[0].len(), SUMMARY_COLUMNS.len());
        assert_eq!(table.rows[0][8], Cell::text("Moderate Change"));
    }

    #[test]
    fn period_outputs_land_in_output_folder() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        let period = PeriodId::parse("022024").unwrap();

        let written = write_period_summary(&config, &period, &[record(&period)]).unwrap();
        let dir = tmp.path().join("022024").join("generated_summary");
        assert_eq!(written[0].path, dir.join("summary_022024.csv"));
        assert!(dir.join("summary_022024.xlsx").exists());
        let csv = fs::read_to_string(dir.join("summary_022024.csv")).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("1,sales.csv,2.5,120,sales_old.csv,2,100,20,Moderate Change,,Slight Change,022024"));
    }

    #[test]
    fn null_details_only_written_when_present() {
        let tmp = TempDir::new().unwrap();
        let config = RunConfig::new(tmp.path());
        let period = PeriodId::parse("022024").unwrap();
        assert!(write_null_details(&config, &period, &[]).unwrap().is_none());

        let details = vec![NullDetail {
            file_name: "a.csv".into(),
            path: "/x/a.csv".into(),
            row: Some(3),
            affected_columns: "b, c".into(),
            error: String::new(),
        }];
        let written = write_null_details(&config, &period, &details).unwrap().unwrap();
        let text = fs::read_to_string(&written.path).unwrap();
        assert_eq!(text, "File name,Path,Row,Affected columns,Error\na.csv,/x/a.csv,3,\"b, c\",\n");
    }
}
