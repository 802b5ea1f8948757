/// Trend classification and per-period enrichment.
use super::matcher::{historical_mean, match_previous};
use crate::ledger::{Ledger, LedgerRow};
use crate::model::{InventoryRow, MatchedFile, PeriodId, Trend, TrendClass, TrendRecord};

/// Round to two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Compare `current` against `reference`.
///
/// Missing or zero reference: no comparison. Either side below `floor`:
/// slight change with no percentage. Otherwise the rounded percentage
/// delta picks the bucket (≤10 slight, ≤30 moderate, ≤50 high, else
/// critical).
pub fn classify(current: f64, reference: Option<f64>, floor: f64) -> Trend {
    let Some(base) = reference.filter(|r| *r != 0.0) else {
        return Trend {
            reference,
            ..Trend::NONE
        };
    };
    if current < floor || base < floor {
        return Trend {
            reference,
            percentage: None,
            class: TrendClass::Slight,
        };
    }
    let pct = round2(100.0 * (current - base) / base);
    let magnitude = pct.abs();
    let class = if magnitude <= 10.0 {
        TrendClass::Slight
    } else if magnitude <= 30.0 {
        TrendClass::Moderate
    } else if magnitude <= 50.0 {
        TrendClass::High
    } else {
        TrendClass::Critical
    };
    Trend {
        reference,
        percentage: Some(pct),
        class,
    }
}

/// Enrich a period's inventory with previous-period and historical trends.
///
/// `previous` is the period scanned immediately before `current`; the
/// historical pool is every ledger row outside `current`.
pub fn build_trend_records(
    rows: &[InventoryRow],
    ledger: &Ledger,
    current: &PeriodId,
    previous: Option<&PeriodId>,
    floor: u32,
    threshold: f64,
) -> Vec<TrendRecord> {
    let floor = f64::from(floor);
    let previous_pool: Vec<&LedgerRow> = previous
        .map(|p| ledger.rows_for_period(p).collect())
        .unwrap_or_default();
    let history_pool: Vec<&LedgerRow> = ledger.rows_excluding(current).collect();

    rows.iter()
        .map(|row| {
            let matched = match_previous(&row.file_name, &previous_pool, threshold);
            let history = historical_mean(&row.file_name, &history_pool, threshold);
            let rows_now = row.row_count as f64;

            TrendRecord {
                row: row.clone(),
                previous: matched.map(|m| MatchedFile {
                    file_name: m.file_name.clone(),
                    size_kb: m.size_kb,
                    row_count: m.row_count,
                }),
                previous_rows: classify(rows_now, matched.map(|m| m.row_count as f64), floor),
                previous_size: classify(row.size_kb, matched.map(|m| m.size_kb), floor),
                historical_rows: classify(rows_now, history.map(|h| h.rows), floor),
                historical_size: classify(row.size_kb, history.map(|h| h.size_kb), floor),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(105.0, Some(5.0), TrendClass::Slight)]
    #[case(125.0, Some(25.0), TrendClass::Moderate)]
    #[case(145.0, Some(45.0), TrendClass::High)]
    #[case(175.0, Some(75.0), TrendClass::Critical)]
    #[case(95.0, Some(-5.0), TrendClass::Slight)]
    #[case(55.0, Some(-45.0), TrendClass::High)]
    #[case(110.0, Some(10.0), TrendClass::Slight)]
    #[case(130.0, Some(30.0), TrendClass::Moderate)]
    #[case(150.0, Some(50.0), TrendClass::High)]
    fn buckets_against_reference_of_100(
        #[case] current: f64,
        #[case] pct: Option<f64>,
        #[case] class: TrendClass,
    ) {
        let trend = classify(current, Some(100.0), 10.0);
        assert_eq!(trend.percentage, pct);
        assert_eq!(trend.class, class);
        assert_eq!(trend.reference, Some(100.0));
    }

    #[rstest]
    #[case(5.0, Some(100.0))]
    #[case(100.0, Some(5.0))]
    #[case(9.99, Some(9.0))]
    fn below_floor_is_slight_without_percentage(#[case] current: f64, #[case] reference: Option<f64>) {
        let trend = classify(current, reference, 10.0);
        assert_eq!(trend.class, TrendClass::Slight);
        assert_eq!(trend.percentage, None);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(0.0))]
    fn missing_or_zero_reference_is_no_comparison(#[case] reference: Option<f64>) {
        let trend = classify(50.0, reference, 10.0);
        assert_eq!(trend.class, TrendClass::NoComparison);
        assert_eq!(trend.percentage, None);
    }

    #[test]
    fn percentage_is_rounded_to_two_decimals() {
        assert_eq!(classify(200.0, Some(300.0), 10.0).percentage, Some(-33.33));
        assert_eq!(round2(12.345_678), 12.35);
    }

    #[test]
    fn exact_ties_round_to_even() {
        assert_eq!(round2(10.125), 10.12);
        assert_eq!(round2(10.375), 10.38);
        assert_eq!(round2(-10.125), -10.12);
        assert_eq!(classify(801.0, Some(800.0), 10.0).percentage, Some(0.12));
        assert_eq!(classify(130.0, Some(100.0), 10.0).class, TrendClass::Moderate);
    }

    fn ledger_row(period: &str, name: &str, rows: u64, size_kb: f64) -> LedgerRow {
        LedgerRow {
            ordinal: 1,
            file_name: name.into(),
            size_kb,
            row_count: rows,
            period: PeriodId::parse(period).unwrap(),
            historical_rows_pct: None,
            historical_rows_class: TrendClass::NoComparison,
            historical_size_pct: None,
            historical_size_class: TrendClass::NoComparison,
        }
    }

    #[test]
    fn records_use_previous_period_and_history() {
        let ledger = Ledger::from_rows(vec![
            ledger_row("122023", "sales.csv", 50, 10.0),
            ledger_row("012024", "sales.csv", 100, 20.0),
            ledger_row("012024", "other.csv", 5, 1.0),
            // Stale rows of the current period never count as history.
            ledger_row("022024", "sales.csv", 999, 999.0),
        ]);
        let current = PeriodId::parse("022024").unwrap();
        let previous = PeriodId::parse("012024").unwrap();
        let rows = vec![InventoryRow {
            ordinal: 1,
            file_name: "sales.csv".into(),
            size_kb: 30.0,
            row_count: 150,
            period: current.clone(),
        }];

        let out = build_trend_records(&rows, &ledger, &current, Some(&previous), 10, 0.8);
        let rec = &out[0];
        assert_eq!(rec.previous.as_ref().unwrap().row_count, 100);
        assert_eq!(rec.previous_rows.percentage, Some(50.0));
        assert_eq!(rec.previous_rows.class, TrendClass::High);
        assert_eq!(rec.previous_size.percentage, Some(50.0));
        // History: mean of 50 and 100 rows, 10 and 20 KB.
        assert_eq!(rec.historical_rows.reference, Some(75.0));
        assert_eq!(rec.historical_rows.percentage, Some(100.0));
        assert_eq!(rec.historical_rows.class, TrendClass::Critical);
        assert_eq!(rec.historical_size.reference, Some(15.0));
    }

    #[test]
    fn first_period_has_no_previous_comparison() {
        let current = PeriodId::parse("012024").unwrap();
        let rows = vec![InventoryRow {
            ordinal: 1,
            file_name: "a.csv".into(),
            size_kb: 1.0,
            row_count: 20,
            period: current.clone(),
        }];
        let out = build_trend_records(&rows, &Ledger::new(), &current, None, 10, 0.8);
        assert!(out[0].previous.is_none());
        assert_eq!(out[0].previous_rows, Trend::NONE);
        assert_eq!(out[0].historical_size, Trend::NONE);
    }
}
