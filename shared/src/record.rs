//! Result records as returned by the classification backend, and the
//! validation that turns a loosely shaped JSON payload into one.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};

use crate::error::EngineError;

/// Three-way label assigned to every classified row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    #[strum(to_string = "CONFIRMED")]
    Confirmed,
    #[strum(to_string = "CANDIDATE")]
    Candidate,
    #[strum(to_string = "FALSE_POSITIVE", serialize = "FALSE POSITIVE")]
    FalsePositive,
}

impl Classification {
    /// Numeric code used by the classification backend.
    pub fn code(self) -> u8 {
        match self {
            Classification::FalsePositive => 0,
            Classification::Candidate => 1,
            Classification::Confirmed => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Classification::FalsePositive),
            1 => Some(Classification::Candidate),
            2 => Some(Classification::Confirmed),
            _ => None,
        }
    }

    /// Plain label, without glyphs.
    pub fn label(self) -> &'static str {
        match self {
            Classification::Confirmed => "CONFIRMED",
            Classification::Candidate => "CANDIDATE",
            Classification::FalsePositive => "FALSE POSITIVE",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Classification::Confirmed => "🌍",
            Classification::Candidate => "🔍",
            Classification::FalsePositive => "❌",
        }
    }

    /// Decorated label as shown in tables, e.g. `🔍 CANDIDATE`.
    pub fn display_label(self) -> String {
        format!("{} {}", self.glyph(), self.label())
    }

    pub fn color(self) -> &'static str {
        match self {
            Classification::Confirmed => "#4CAF50",
            Classification::Candidate => "#FF9800",
            Classification::FalsePositive => "#f44336",
        }
    }

    /// Parses either a plain or a decorated label (`❌ FALSE POSITIVE`).
    pub fn parse_label(label: &str) -> Option<Self> {
        let plain: String = label.chars().filter(|c| c.is_ascii()).collect();
        Classification::from_str(plain.trim().to_ascii_uppercase().as_str()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probabilities {
    pub confirmed: f64,
    pub candidate: f64,
    pub false_positive: f64,
}

/// Allowed drift of a row's probabilities from summing to 1.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 0.01;

impl Probabilities {
    pub fn get(&self, class: Classification) -> f64 {
        match class {
            Classification::Confirmed => self.confirmed,
            Classification::Candidate => self.candidate,
            Classification::FalsePositive => self.false_positive,
        }
    }

    pub fn total(&self) -> f64 {
        Classification::iter().map(|class| self.get(class)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    pub row: String,
    pub original_row: u64,
    pub prediction: Classification,
    pub confidence: f64,
    pub probabilities: Probabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl PredictionRow {
    /// Row as it appears in a single-file result.
    pub fn new(
        original_row: u64,
        prediction: Classification,
        confidence: f64,
        probabilities: Probabilities,
    ) -> Self {
        Self {
            row: original_row.to_string(),
            original_row,
            prediction,
            confidence,
            probabilities,
            source_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub rows_processed: u64,
    pub features_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub total_predictions: u64,
    pub confirmed_count: u64,
    pub candidate_count: u64,
    pub false_positive_count: u64,
    pub confirmed_percentage: f64,
    pub candidate_percentage: f64,
    pub false_positive_percentage: f64,
}

/// `100 * count / total`, or 0 for an empty total.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

impl Statistics {
    /// `None` when the counts do not fit a `u64` total.
    pub fn from_counts(confirmed: u64, candidate: u64, false_positive: u64) -> Option<Self> {
        let total = confirmed.checked_add(candidate)?.checked_add(false_positive)?;
        Some(Self {
            total_predictions: total,
            confirmed_count: confirmed,
            candidate_count: candidate,
            false_positive_count: false_positive,
            confirmed_percentage: percentage(confirmed, total),
            candidate_percentage: percentage(candidate, total),
            false_positive_percentage: percentage(false_positive, total),
        })
    }

    pub fn empty() -> Self {
        Self {
            total_predictions: 0,
            confirmed_count: 0,
            candidate_count: 0,
            false_positive_count: 0,
            confirmed_percentage: 0.0,
            candidate_percentage: 0.0,
            false_positive_percentage: 0.0,
        }
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a PredictionRow>) -> Self {
        let (mut confirmed, mut candidate, mut false_positive) = (0u64, 0u64, 0u64);
        for row in rows {
            match row.prediction {
                Classification::Confirmed => confirmed += 1,
                Classification::Candidate => candidate += 1,
                Classification::FalsePositive => false_positive += 1,
            }
        }
        // Bounded by the number of rows held in memory.
        Self::from_counts(confirmed, candidate, false_positive).unwrap_or_else(Self::empty)
    }

    /// Counts are summed and percentages recomputed; percentages are never
    /// added. `None` on overflow.
    pub fn checked_add(&self, other: &Statistics) -> Option<Statistics> {
        Statistics::from_counts(
            self.confirmed_count.checked_add(other.confirmed_count)?,
            self.candidate_count.checked_add(other.candidate_count)?,
            self.false_positive_count
                .checked_add(other.false_positive_count)?,
        )
    }
}

/// One inference run's output. Only constructed through validation or by the
/// engine itself, so every field is present and consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResultRecord")]
pub struct ResultRecord {
    pub model_used: String,
    pub file_info: FileInfo,
    pub statistics: Statistics,
    pub predictions: Vec<PredictionRow>,
    pub visualizations: BTreeMap<String, String>,
}

impl ResultRecord {
    /// Builds a record whose statistics are counted from its rows.
    pub fn from_rows(
        model_used: impl Into<String>,
        filename: impl Into<String>,
        features_used: u64,
        predictions: Vec<PredictionRow>,
    ) -> Self {
        Self {
            model_used: model_used.into(),
            file_info: FileInfo {
                filename: filename.into(),
                rows_processed: predictions.len() as u64,
                features_used,
            },
            statistics: Statistics::from_rows(&predictions),
            predictions,
            visualizations: BTreeMap::new(),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, EngineError> {
        let raw: RawResultRecord = serde_json::from_value(value)
            .map_err(|e| EngineError::malformed(format!("payload shape: {}", e)))?;
        ResultRecord::try_from(raw)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, EngineError> {
        let raw: RawResultRecord = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::malformed(format!("payload shape: {}", e)))?;
        ResultRecord::try_from(raw)
    }

    pub fn summary_message(&self) -> String {
        format!(
            "Analysis complete: {} confirmed, {} candidates, {} false positives.",
            self.statistics.confirmed_count,
            self.statistics.candidate_count,
            self.statistics.false_positive_count
        )
    }

    /// Looks a row up by its display identity (`"3"` or `"2-3"`).
    pub fn find_row(&self, row: &str) -> Option<&PredictionRow> {
        self.predictions.iter().find(|p| p.row == row)
    }
}

// Payload shapes as they arrive over the wire. Every field is optional here so
// that a missing one is reported by name instead of as a serde error.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResultRecord {
    pub model_used: Option<String>,
    pub file_info: Option<RawFileInfo>,
    pub statistics: Option<RawStatistics>,
    pub predictions: Option<Vec<RawPredictionRow>>,
    #[serde(default)]
    pub visualizations: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFileInfo {
    pub filename: Option<String>,
    pub rows_processed: Option<u64>,
    pub features_used: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatistics {
    pub total_predictions: Option<u64>,
    pub confirmed_count: Option<u64>,
    pub candidate_count: Option<u64>,
    pub false_positive_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRowId {
    Index(u64),
    Label(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPredictionRow {
    pub row: Option<RawRowId>,
    #[serde(alias = "originalRow")]
    pub original_row: Option<u64>,
    pub prediction: Option<String>,
    pub prediction_code: Option<u8>,
    pub confidence: Option<f64>,
    pub probabilities: Option<RawProbabilities>,
    #[serde(alias = "sourceFile")]
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProbabilities {
    pub confirmed: Option<f64>,
    pub candidate: Option<f64>,
    pub false_positive: Option<f64>,
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, EngineError> {
    value.ok_or_else(|| EngineError::malformed(field))
}

fn unit_interval(value: Option<f64>, field: &str) -> Result<f64, EngineError> {
    let value = require(value, field)?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::malformed(format!("{} out of range [0, 1]", field)))
    }
}

impl TryFrom<RawFileInfo> for FileInfo {
    type Error = EngineError;

    fn try_from(raw: RawFileInfo) -> Result<Self, Self::Error> {
        Ok(FileInfo {
            filename: require(raw.filename, "file_info.filename")?,
            rows_processed: require(raw.rows_processed, "file_info.rows_processed")?,
            features_used: require(raw.features_used, "file_info.features_used")?,
        })
    }
}

impl TryFrom<RawStatistics> for Statistics {
    type Error = EngineError;

    fn try_from(raw: RawStatistics) -> Result<Self, Self::Error> {
        let total = require(raw.total_predictions, "statistics.total_predictions")?;
        let stats = Statistics::from_counts(
            require(raw.confirmed_count, "statistics.confirmed_count")?,
            require(raw.candidate_count, "statistics.candidate_count")?,
            require(raw.false_positive_count, "statistics.false_positive_count")?,
        )
        .ok_or_else(|| EngineError::malformed("statistics counts overflow"))?;
        if stats.total_predictions != total {
            return Err(EngineError::malformed(format!(
                "statistics counts sum to {} but total_predictions is {}",
                stats.total_predictions, total
            )));
        }
        Ok(stats)
    }
}

impl RawPredictionRow {
    fn validate(self, index: usize) -> Result<PredictionRow, EngineError> {
        let field = |name: &str| format!("predictions[{}].{}", index, name);

        let (row, original_row) = match (self.row, self.original_row) {
            (Some(RawRowId::Index(n)), original) => (n.to_string(), original.unwrap_or(n)),
            (Some(RawRowId::Label(label)), Some(original)) => (label, original),
            (Some(RawRowId::Label(label)), None) => {
                let original = label
                    .parse::<u64>()
                    .map_err(|_| EngineError::malformed(field("original_row")))?;
                (label, original)
            }
            (None, Some(original)) => (original.to_string(), original),
            (None, None) => return Err(EngineError::malformed(field("row"))),
        };
        if original_row == 0 {
            return Err(EngineError::malformed(format!(
                "{} must be 1-based",
                field("original_row")
            )));
        }

        let prediction = match (self.prediction_code, self.prediction.as_deref()) {
            (Some(code), _) => Classification::from_code(code),
            (None, Some(label)) => Classification::parse_label(label),
            (None, None) => None,
        }
        .ok_or_else(|| EngineError::malformed(field("prediction")))?;

        let raw_probabilities = require(self.probabilities, &field("probabilities"))?;
        let probabilities = Probabilities {
            confirmed: unit_interval(
                raw_probabilities.confirmed,
                &field("probabilities.confirmed"),
            )?,
            candidate: unit_interval(
                raw_probabilities.candidate,
                &field("probabilities.candidate"),
            )?,
            false_positive: unit_interval(
                raw_probabilities.false_positive,
                &field("probabilities.false_positive"),
            )?,
        };
        if (probabilities.total() - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(EngineError::malformed(format!(
                "{} sum to {} instead of 1",
                field("probabilities"),
                probabilities.total()
            )));
        }

        Ok(PredictionRow {
            row,
            original_row,
            prediction,
            confidence: unit_interval(self.confidence, &field("confidence"))?,
            probabilities,
            source_file: self.source_file,
        })
    }
}

impl TryFrom<RawResultRecord> for ResultRecord {
    type Error = EngineError;

    fn try_from(raw: RawResultRecord) -> Result<Self, Self::Error> {
        let model_used = require(raw.model_used, "model_used")?;
        let file_info = FileInfo::try_from(require(raw.file_info, "file_info")?)?;
        let statistics = Statistics::try_from(require(raw.statistics, "statistics")?)?;
        let predictions = require(raw.predictions, "predictions")?
            .into_iter()
            .enumerate()
            .map(|(index, row)| row.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        // Plots that failed to render come through as null and are dropped.
        let visualizations = raw
            .visualizations
            .into_iter()
            .filter_map(|(name, image)| image.map(|image| (name, image)))
            .collect();

        Ok(ResultRecord {
            model_used,
            file_info,
            statistics,
            predictions,
            visualizations,
        })
    }
}
