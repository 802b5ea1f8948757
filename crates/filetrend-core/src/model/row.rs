/// Inventory and trend records.
use super::period::PeriodId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One distinct file observed in a period.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRow {
    /// 1-based position in discovery order within the period.
    pub ordinal: u32,
    pub file_name: String,
    pub size_kb: f64,
    pub row_count: u64,
    pub period: PeriodId,
}

/// Severity bucket of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendClass {
    #[serde(rename = "Slight Change")]
    Slight,
    #[serde(rename = "Moderate Change")]
    Moderate,
    #[serde(rename = "High Change")]
    High,
    #[serde(rename = "Critical Change")]
    Critical,
    #[serde(rename = "No comparison")]
    NoComparison,
}

impl TrendClass {
    pub fn label(self) -> &'static str {
        match self {
            TrendClass::Slight => "Slight Change",
            TrendClass::Moderate => "Moderate Change",
            TrendClass::High => "High Change",
            TrendClass::Critical => "Critical Change",
            TrendClass::NoComparison => "No comparison",
        }
    }

    /// Inverse of [`label`](Self::label); unknown text reads as no comparison.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Slight Change" => TrendClass::Slight,
            "Moderate Change" => TrendClass::Moderate,
            "High Change" => TrendClass::High,
            "Critical Change" => TrendClass::Critical,
            _ => TrendClass::NoComparison,
        }
    }
}

impl fmt::Display for TrendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One comparison of a current metric against a reference value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub reference: Option<f64>,
    pub percentage: Option<f64>,
    pub class: TrendClass,
}

impl Trend {
    pub const NONE: Trend = Trend {
        reference: None,
        percentage: None,
        class: TrendClass::NoComparison,
    };
}

impl Default for Trend {
    fn default() -> Self {
        Trend::NONE
    }
}

/// The counterpart a file was matched to in another period.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedFile {
    pub file_name: String,
    pub size_kb: f64,
    pub row_count: u64,
}

/// An inventory row enriched with previous-period and historical trends.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRecord {
    pub row: InventoryRow,
    pub previous: Option<MatchedFile>,
    pub previous_rows: Trend,
    pub previous_size: Trend,
    pub historical_rows: Trend,
    pub historical_size: Trend,
}

/// A blank-cell location or an unreadable file, for the null-detail output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NullDetail {
    #[serde(rename = "File name")]
    pub file_name: String,
    #[serde(rename = "Path")]
    pub path: String,
    /// Spreadsheet line number (header is line 1). `None` for unreadable files.
    #[serde(rename = "Row")]
    pub row: Option<u64>,
    #[serde(rename = "Affected columns")]
    pub affected_columns: String,
    #[serde(rename = "Error")]
    pub error: String,
}
