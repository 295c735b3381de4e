use crate::error::EngineError;
use crate::record::{FileInfo, PredictionRow, ResultRecord, Statistics};

/// Merges the results of a batch into a single record.
///
/// Rows of the `i`-th input (1-based) are re-labelled `"{i}-{original_row}"`
/// and tagged with the input's filename; output rows are the inputs' rows
/// concatenated in input order. Counts are summed and percentages recomputed
/// from the sums. Plots and the feature count come from the first input.
pub fn aggregate(
    records: &[ResultRecord],
    model_override: Option<&str>,
) -> Result<ResultRecord, EngineError> {
    let first = records.first().ok_or(EngineError::EmptyBatch)?;

    let statistics = records
        .iter()
        .try_fold(Statistics::empty(), |acc, r| acc.checked_add(&r.statistics))
        .ok_or_else(|| EngineError::malformed("statistics: batch counts overflow"))?;
    let rows_processed = records
        .iter()
        .try_fold(0u64, |acc, r| acc.checked_add(r.file_info.rows_processed))
        .ok_or_else(|| EngineError::malformed("file_info.rows_processed: batch total overflows"))?;

    let predictions: Vec<PredictionRow> = records
        .iter()
        .enumerate()
        .flat_map(|(index, record)| {
            let batch = index + 1;
            record.predictions.iter().map(move |row| PredictionRow {
                row: format!("{}-{}", batch, row.original_row),
                source_file: Some(record.file_info.filename.clone()),
                ..row.clone()
            })
        })
        .collect();

    log::debug!(
        "Aggregated {} records into {} rows ({} predictions)",
        records.len(),
        predictions.len(),
        statistics.total_predictions
    );

    Ok(ResultRecord {
        model_used: model_override
            .map(str::to_string)
            .unwrap_or_else(|| first.model_used.clone()),
        file_info: FileInfo {
            filename: format!("{} files", records.len()),
            rows_processed,
            features_used: first.file_info.features_used,
        },
        statistics,
        predictions,
        visualizations: first.visualizations.clone(),
    })
}
