/// Data model for FileTrend.
///
/// Explicit records for everything that flows between components: period
/// tokens, extracted-file descriptors, per-file inventory rows and their
/// trend enrichment.
pub mod descriptor;
pub mod period;
pub mod row;
pub mod size;

pub use descriptor::FileDescriptor;
pub use period::PeriodId;
pub use row::{InventoryRow, MatchedFile, NullDetail, Trend, TrendClass, TrendRecord};
