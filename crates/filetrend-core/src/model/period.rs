/// Period tokens: `MMYYYY` folder names.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A validated `MMYYYY` period token.
///
/// Ordering is chronological (year, then month), so `122023` sorts before
/// `012024`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeriodId {
    token: String,
    month: u8,
    year: u16,
}

impl PeriodId {
    /// Parse a folder name. Returns `None` unless it is six ASCII digits with
    /// a month in `01..=12`.
    pub fn parse(token: &str) -> Option<Self> {
        if token.len() != 6 || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let month: u8 = token[..2].parse().ok()?;
        let year: u16 = token[2..].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self {
            token: token.to_string(),
            month,
            year,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    /// `MM/YYYY`, for log lines and reports.
    pub fn label(&self) -> String {
        format!("{:02}/{:04}", self.month, self.year)
    }
}

impl Ord for PeriodId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month).cmp(&(other.year, other.month))
    }
}

impl PartialOrd for PeriodId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl FromStr for PeriodId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeriodId::parse(s).ok_or_else(|| format!("invalid period token `{s}`"))
    }
}

impl Serialize for PeriodId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.token)
    }
}

impl<'de> Deserialize<'de> for PeriodId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Spreadsheet round-trips can drop the leading zero ("12024").
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.trim();
        let padded = if trimmed.len() == 5 {
            format!("0{trimmed}")
        } else {
            trimmed.to_string()
        };
        PeriodId::parse(&padded).ok_or_else(|| serde::de::Error::custom(format!("invalid period `{raw}`")))
    }
}
