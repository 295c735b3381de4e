use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::record::ResultRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[display(fmt = "a")]
    A,
    #[display(fmt = "b")]
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountDelta {
    pub magnitude: u64,
    /// `None` when both sides have the same count.
    pub larger: Option<Side>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComparisonSummary {
    pub confirmed_count_delta: CountDelta,
    /// `None` when either side has no predictions, since a rate of zero
    /// predictions says nothing about the model.
    pub higher_confirmed_rate: Option<Side>,
    pub total_coverage: u64,
}

impl ComparisonSummary {
    /// The side with the higher confirmed rate, for callers that cannot
    /// proceed without it.
    pub fn require_higher_confirmed_rate(&self) -> Result<Side, EngineError> {
        self.higher_confirmed_rate.ok_or_else(|| {
            EngineError::IncompatibleComparison(
                "one side has no predictions, so its confirmed rate is undefined".to_string(),
            )
        })
    }
}

pub fn compare(a: &ResultRecord, b: &ResultRecord) -> ComparisonSummary {
    let (a_stats, b_stats) = (&a.statistics, &b.statistics);

    let larger = match a_stats.confirmed_count.cmp(&b_stats.confirmed_count) {
        std::cmp::Ordering::Greater => Some(Side::A),
        std::cmp::Ordering::Less => Some(Side::B),
        std::cmp::Ordering::Equal => None,
    };

    let higher_confirmed_rate = if a_stats.total_predictions == 0 || b_stats.total_predictions == 0
    {
        None
    } else if b_stats.confirmed_percentage > a_stats.confirmed_percentage {
        Some(Side::B)
    } else {
        Some(Side::A)
    };

    ComparisonSummary {
        confirmed_count_delta: CountDelta {
            magnitude: a_stats.confirmed_count.abs_diff(b_stats.confirmed_count),
            larger,
        },
        higher_confirmed_rate,
        total_coverage: a_stats
            .total_predictions
            .saturating_add(b_stats.total_predictions),
    }
}

/// One side of a comparison: a record and the label it is displayed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparedRun {
    pub label: String,
    pub record: ResultRecord,
}

/// Two independent runs shown side by side. Their rows are never merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub a: ComparedRun,
    pub b: ComparedRun,
    pub summary: ComparisonSummary,
}

impl Comparison {
    /// A missing label falls back to the record's `model_used`.
    pub fn new(
        a: ResultRecord,
        label_a: Option<String>,
        b: ResultRecord,
        label_b: Option<String>,
    ) -> Self {
        let summary = compare(&a, &b);
        Self {
            a: ComparedRun {
                label: label_a.unwrap_or_else(|| a.model_used.clone()),
                record: a,
            },
            b: ComparedRun {
                label: label_b.unwrap_or_else(|| b.model_used.clone()),
                record: b,
            },
            summary,
        }
    }

    pub fn side(&self, side: Side) -> &ComparedRun {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    /// Label of the run with the higher confirmed rate.
    pub fn higher_confirmed_rate_label(&self) -> Result<&str, EngineError> {
        let side = self.summary.require_higher_confirmed_rate()?;
        Ok(self.side(side).label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Classification, PredictionRow, Probabilities, Statistics};

    fn record(model: &str, confirmed: u64, candidate: u64, false_positive: u64) -> ResultRecord {
        let probabilities = Probabilities {
            confirmed: 0.5,
            candidate: 0.25,
            false_positive: 0.25,
        };
        let labels = std::iter::repeat(Classification::Confirmed)
            .take(confirmed as usize)
            .chain(std::iter::repeat(Classification::Candidate).take(candidate as usize))
            .chain(std::iter::repeat(Classification::FalsePositive).take(false_positive as usize));
        let rows = labels
            .enumerate()
            .map(|(i, class)| PredictionRow::new(i as u64 + 1, class, 0.5, probabilities))
            .collect();
        ResultRecord::from_rows(model, format!("{}.csv", model), 6, rows)
    }

    #[test]
    fn test_delta_and_coverage() {
        let a = record("XGBoost", 6, 3, 1);
        let b = record("CatBoost", 1, 1, 3);
        let summary = compare(&a, &b);
        assert_eq!(summary.confirmed_count_delta.magnitude, 5);
        assert_eq!(summary.confirmed_count_delta.larger, Some(Side::A));
        assert_eq!(summary.higher_confirmed_rate, Some(Side::A));
        assert_eq!(summary.total_coverage, 15);
    }

    #[test]
    fn test_delta_is_symmetric() {
        let a = record("XGBoost", 2, 3, 1);
        let b = record("CatBoost", 7, 0, 0);
        let ab = compare(&a, &b);
        let ba = compare(&b, &a);
        assert_eq!(
            ab.confirmed_count_delta.magnitude,
            ba.confirmed_count_delta.magnitude
        );
        assert_eq!(ab.confirmed_count_delta.larger, Some(Side::B));
        assert_eq!(ba.confirmed_count_delta.larger, Some(Side::A));
    }

    #[test]
    fn test_rate_tie_goes_to_a() {
        let a = record("XGBoost", 1, 1, 0);
        let b = record("CatBoost", 2, 2, 0);
        let summary = compare(&a, &b);
        assert_eq!(summary.higher_confirmed_rate, Some(Side::A));
        assert_eq!(summary.confirmed_count_delta.larger, Some(Side::B));
    }

    #[test]
    fn test_zero_total_flags_insight() {
        let a = record("XGBoost", 0, 0, 0);
        let b = record("CatBoost", 2, 1, 0);
        let summary = compare(&a, &b);
        assert_eq!(summary.higher_confirmed_rate, None);
        assert_eq!(summary.confirmed_count_delta.magnitude, 2);
        assert_eq!(summary.total_coverage, 3);
        assert!(matches!(
            summary.require_higher_confirmed_rate(),
            Err(EngineError::IncompatibleComparison(_))
        ));
    }

    #[test]
    fn test_labels_default_to_model() {
        let comparison = Comparison::new(
            record("XGBoost", 1, 0, 0),
            None,
            record("CatBoost", 3, 0, 1),
            Some("Batch two".to_string()),
        );
        assert_eq!(comparison.a.label, "XGBoost");
        assert_eq!(comparison.b.label, "Batch two");
        assert_eq!(comparison.higher_confirmed_rate_label().unwrap(), "XGBoost");
        assert_eq!(comparison.a.record.predictions.len(), 1);
        assert_eq!(comparison.b.record.predictions.len(), 4);
    }

    #[test]
    fn test_coverage_saturates() {
        let mut a = record("XGBoost", 1, 0, 0);
        a.statistics = Statistics::from_counts(u64::MAX, 0, 0).unwrap();
        let b = record("CatBoost", 2, 0, 0);
        let summary = compare(&a, &b);
        assert_eq!(summary.total_coverage, u64::MAX);
        assert_eq!(summary.confirmed_count_delta.magnitude, u64::MAX - 2);
        assert_eq!(summary.higher_confirmed_rate, Some(Side::A));
    }
}
