pub mod aggregate;
pub mod analysis;
pub mod compare;
pub mod error;
pub mod export;
pub mod record;
pub mod report;
pub mod view;

pub use aggregate::aggregate;
pub use analysis::{Analysis, AnalysisType};
pub use compare::{compare, Comparison, ComparisonSummary, Side};
pub use error::EngineError;
pub use export::{export_file_name, export_rows};
pub use record::{Classification, FileInfo, PredictionRow, Probabilities, ResultRecord, Statistics};
pub use report::{explain, Report};
pub use view::{project, RowFilter, SortDirection, SortKey, SortSpec, ViewState};
