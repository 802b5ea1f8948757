/// Cross-period identity matching.
///
/// A current-period file name is resolved against ledger rows: an exact
/// name wins outright (the most recently recorded one on duplicates);
/// otherwise the candidate with the highest similarity at or above the
/// threshold is taken.
use super::similarity::similarity;
use crate::ledger::LedgerRow;

/// Best counterpart for `name` in `pool`, or `None`.
pub fn match_previous<'a>(name: &str, pool: &[&'a LedgerRow], threshold: f64) -> Option<&'a LedgerRow> {
    if let Some(exact) = pool.iter().rev().find(|r| r.file_name == name) {
        return Some(*exact);
    }

    let mut best: Option<(&'a LedgerRow, f64)> = None;
    for &candidate in pool {
        let score = similarity(&candidate.file_name, name);
        if score >= threshold && best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best.map(|(row, _)| row)
}

/// Mean row count and mean size over every pooled row whose name matches
/// `name` exactly or by similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalMean {
    pub rows: f64,
    pub size_kb: f64,
    pub samples: usize,
}

pub fn historical_mean(name: &str, pool: &[&LedgerRow], threshold: f64) -> Option<HistoricalMean> {
    let (mut rows, mut size, mut samples) = (0.0, 0.0, 0usize);
    for row in pool
        .iter()
        .filter(|r| r.file_name == name || similarity(&r.file_name, name) >= threshold)
    {
        rows += row.row_count as f64;
        size += row.size_kb;
        samples += 1;
    }
    (samples > 0).then(|| HistoricalMean {
        rows: rows / samples as f64,
        size_kb: size / samples as f64,
        samples,
    })
}
