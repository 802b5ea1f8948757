/// Run configuration.
///
/// Every field has a default so a JSON config file only needs to name what
/// it overrides. Command-line flags are applied on top by the driver.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Files larger than this are counted by streaming instead of parsed (10 MiB).
pub const DEFAULT_STREAMING_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Minimum free space on the scratch volume before extraction resumes (200 MiB).
pub const DEFAULT_MIN_FREE_BYTES: u64 = 200 * 1024 * 1024;

/// Name of the per-period folder holding generated summaries. Never scanned as input.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "generated_summary";

/// Folder created under `scratch_root` for extraction. Only this folder is
/// ever cleaned up; the rest of `scratch_root` is left alone.
pub const SCRATCH_DIR_NAME: &str = "filetrend_scratch";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Directory containing the `MMYYYY` period folders.
    pub base_path: PathBuf,
    /// Values below this floor are too small to classify beyond "Slight Change".
    pub row_floor: u32,
    /// Where the run's scratch folder is created. See [`RunConfig::scratch_dir`].
    pub scratch_root: PathBuf,
    pub streaming_threshold_bytes: u64,
    pub similarity_threshold: f64,
    pub min_free_bytes: u64,
    /// Space-guard recoveries allowed per period before aborting.
    pub max_space_recoveries: u32,
    pub output_dir_name: String,
    /// Ledger file stem; `.csv` and `.xlsx` are appended.
    pub ledger_file_stem: String,
    pub null_details_file_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            row_floor: 10,
            scratch_root: std::env::temp_dir(),
            streaming_threshold_bytes: DEFAULT_STREAMING_THRESHOLD,
            similarity_threshold: 0.8,
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
            max_space_recoveries: 5,
            output_dir_name: DEFAULT_OUTPUT_DIR_NAME.to_string(),
            ledger_file_stem: "history".to_string(),
            null_details_file_name: "null_details.csv".to_string(),
        }
    }
}

impl RunConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_row_floor(mut self, floor: u32) -> Self {
        self.row_floor = floor;
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    pub fn with_streaming_threshold(mut self, bytes: u64) -> Self {
        self.streaming_threshold_bytes = bytes;
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    /// `<scratch_root>/filetrend_scratch`: each period extracts into its own
    /// subdirectory, and the whole folder is removed when the run ends.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_root.join(SCRATCH_DIR_NAME)
    }

    pub fn ledger_csv_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.csv", self.ledger_file_stem))
    }

    pub fn ledger_xlsx_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.xlsx", self.ledger_file_stem))
    }

    /// `<base>/<period>/<output_dir_name>`.
    pub fn period_output_dir(&self, period: &str) -> PathBuf {
        self.base_path.join(period).join(&self.output_dir_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.row_floor, 10);
        assert_eq!(cfg.streaming_threshold_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.min_free_bytes, 200 * 1024 * 1024);
        assert!((cfg.similarity_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RunConfig =
            serde_json::from_str(r#"{ "base_path": "/data", "row_floor": 25 }"#).unwrap();
        assert_eq!(cfg.base_path, PathBuf::from("/data"));
        assert_eq!(cfg.row_floor, 25);
        assert_eq!(cfg.output_dir_name, DEFAULT_OUTPUT_DIR_NAME);
    }

    #[test]
    fn output_paths_are_under_base() {
        let cfg = RunConfig::new("/data");
        assert_eq!(cfg.ledger_csv_path(), PathBuf::from("/data/history.csv"));
        assert_eq!(
            cfg.period_output_dir("012024"),
            PathBuf::from("/data/012024/generated_summary")
        );
    }

    #[test]
    fn scratch_dir_is_a_dedicated_child() {
        let cfg = RunConfig::new("/data").with_scratch_root("/home/me/Desktop");
        assert_eq!(cfg.scratch_dir(), PathBuf::from("/home/me/Desktop/filetrend_scratch"));
        assert_eq!(RunConfig::default().scratch_dir(), std::env::temp_dir().join(SCRATCH_DIR_NAME));
    }
}
