use chrono::NaiveDate;
use csv::{Terminator, WriterBuilder};

use crate::analysis::AnalysisType;
use crate::error::EngineError;
use crate::record::ResultRecord;
use crate::report;

pub const EXPORT_HEADERS: [&str; 8] = [
    "Row",
    "Prediction",
    "Confidence",
    "Confirmed_Prob",
    "Candidate_Prob",
    "FalsePositive_Prob",
    "Analysis",
    "SourceFile",
];

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Dumps every row of `record` as CSV, in the record's own row order.
///
/// Fields that happen to contain a comma or quote are quoted, so the output
/// always parses back into the same columns.
pub fn export_rows(record: &ResultRecord) -> Result<String, EngineError> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b',')
        .terminator(Terminator::Any(b'\n'))
        .from_writer(vec![]);

    wtr.write_record(EXPORT_HEADERS)?;

    for row in &record.predictions {
        let source = row
            .source_file
            .as_deref()
            .unwrap_or(record.file_info.filename.as_str());
        wtr.write_record([
            row.original_row.to_string().as_str(),
            row.prediction.label(),
            percent(row.confidence).as_str(),
            percent(row.probabilities.confirmed).as_str(),
            percent(row.probabilities.candidate).as_str(),
            percent(row.probabilities.false_positive).as_str(),
            report::title(row.prediction),
            source,
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| EngineError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| EngineError::Export(e.to_string()))
}

/// Download name for an export, e.g. `batch_XGBoost_2024-06-01.csv`.
pub fn export_file_name(analysis: AnalysisType, model_used: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}_{}.csv",
        analysis,
        model_used,
        date.format("%Y-%m-%d")
    )
}
