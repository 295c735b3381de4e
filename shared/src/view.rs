use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::record::{Classification, PredictionRow, ResultRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFilter {
    #[default]
    All,
    #[serde(alias = "confirmed")]
    ConfirmedOnly,
    #[serde(alias = "candidate")]
    CandidateOnly,
    #[serde(alias = "false_positive")]
    FalsePositiveOnly,
}

impl RowFilter {
    pub fn matches(self, class: Classification) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::ConfirmedOnly => class == Classification::Confirmed,
            RowFilter::CandidateOnly => class == Classification::Candidate,
            RowFilter::FalsePositiveOnly => class == Classification::FalsePositive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Row,
    Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Selecting the active key flips the direction, any other key starts
    /// ascending.
    pub fn toggle(self, key: SortKey) -> Self {
        let direction = match (self.key == key, self.direction) {
            (true, SortDirection::Asc) => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        Self { key, direction }
    }

    fn compare(&self, a: &PredictionRow, b: &PredictionRow) -> Ordering {
        let ordering = match self.key {
            // Numeric, so "10-3" never sorts before "2-7".
            SortKey::Row => a.original_row.cmp(&b.original_row),
            SortKey::Confidence => a.confidence.total_cmp(&b.confidence),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Filter and sort state held by whoever renders a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewState {
    pub filter: RowFilter,
    pub sort: SortSpec,
}

impl ViewState {
    pub fn select_sort(&mut self, key: SortKey) {
        self.sort = self.sort.toggle(key);
    }

    pub fn apply<'a>(&self, record: &'a ResultRecord) -> Vec<&'a PredictionRow> {
        project(record, self.filter, self.sort)
    }
}

/// Filtered, stably sorted projection of a record's rows. The record itself is
/// left untouched, so this can be re-run with any state at any time.
pub fn project(record: &ResultRecord, filter: RowFilter, sort: SortSpec) -> Vec<&PredictionRow> {
    let mut rows: Vec<&PredictionRow> = record
        .predictions
        .iter()
        .filter(|row| filter.matches(row.prediction))
        .collect();
    // `sort_by` is stable; reversing the comparator keeps equal rows in input
    // order for descending sorts too.
    rows.sort_by(|a, b| sort.compare(a, b));

    log::debug!(
        "Projected {} of {} rows ({:?}, {:?})",
        rows.len(),
        record.predictions.len(),
        filter,
        sort
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::record::Probabilities;

    fn row(original_row: u64, prediction: Classification, confidence: f64) -> PredictionRow {
        PredictionRow::new(
            original_row,
            prediction,
            confidence,
            Probabilities {
                confirmed: 0.3,
                candidate: 0.3,
                false_positive: 0.4,
            },
        )
    }

    fn sample() -> ResultRecord {
        ResultRecord::from_rows(
            "XGBoost",
            "sample.csv",
            4,
            vec![
                row(1, Classification::Confirmed, 0.8),
                row(2, Classification::Candidate, 0.5),
                row(3, Classification::Confirmed, 0.5),
                row(4, Classification::FalsePositive, 0.9),
                row(5, Classification::Confirmed, 0.5),
            ],
        )
    }

    fn ids(rows: &[&PredictionRow]) -> Vec<u64> {
        rows.iter().map(|r| r.original_row).collect()
    }

    #[test]
    fn test_all_filter_by_row_is_idempotent() {
        let record = sample();
        let spec = SortSpec::default();
        let first = project(&record, RowFilter::All, spec);
        let second = project(&record, RowFilter::All, spec);
        assert_eq!(first, second);
        assert_eq!(ids(&first), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_filters_match_exact_tag() {
        let record = sample();
        let spec = SortSpec::default();
        assert_eq!(
            ids(&project(&record, RowFilter::ConfirmedOnly, spec)),
            vec![1, 3, 5]
        );
        assert_eq!(ids(&project(&record, RowFilter::CandidateOnly, spec)), vec![2]);
        assert_eq!(
            ids(&project(&record, RowFilter::FalsePositiveOnly, spec)),
            vec![4]
        );
    }

    #[test]
    fn test_confidence_sort_is_stable_both_ways() {
        let record = sample();
        let asc = project(
            &record,
            RowFilter::All,
            SortSpec::new(SortKey::Confidence, SortDirection::Asc),
        );
        assert_eq!(ids(&asc), vec![2, 3, 5, 1, 4]);

        let desc = project(
            &record,
            RowFilter::All,
            SortSpec::new(SortKey::Confidence, SortDirection::Desc),
        );
        assert_eq!(ids(&desc), vec![4, 1, 2, 3, 5]);
    }

    #[test]
    fn test_row_sort_uses_original_row_across_batches() {
        let first = ResultRecord::from_rows(
            "XGBoost",
            "a.csv",
            4,
            (1..=10)
                .map(|n| row(n, Classification::Candidate, 0.5))
                .collect(),
        );
        let second = ResultRecord::from_rows(
            "XGBoost",
            "b.csv",
            4,
            vec![row(2, Classification::Candidate, 0.5)],
        );
        let merged = aggregate(&[first, second], None).unwrap();
        let rows = project(
            &merged,
            RowFilter::All,
            SortSpec::new(SortKey::Row, SortDirection::Asc),
        );
        let labels: Vec<&str> = rows.iter().map(|r| r.row.as_str()).collect();
        assert_eq!(&labels[..4], &["1-1", "1-2", "2-2", "1-3"]);
        assert_eq!(labels[10], "1-10");
    }

    #[test]
    fn test_projection_leaves_record_untouched() {
        let record = sample();
        let before = record.clone();
        let _ = project(
            &record,
            RowFilter::ConfirmedOnly,
            SortSpec::new(SortKey::Confidence, SortDirection::Desc),
        );
        assert_eq!(record, before);
    }

    #[test]
    fn test_sort_toggle() {
        let mut state = ViewState::default();
        assert_eq!(state.sort, SortSpec::new(SortKey::Row, SortDirection::Asc));

        state.select_sort(SortKey::Row);
        assert_eq!(state.sort, SortSpec::new(SortKey::Row, SortDirection::Desc));

        state.select_sort(SortKey::Row);
        assert_eq!(state.sort, SortSpec::new(SortKey::Row, SortDirection::Asc));

        state.select_sort(SortKey::Row);
        state.select_sort(SortKey::Confidence);
        assert_eq!(
            state.sort,
            SortSpec::new(SortKey::Confidence, SortDirection::Asc)
        );
    }

    #[test]
    fn test_view_state_applies_filter_and_sort() {
        let record = sample();
        let mut state = ViewState {
            filter: RowFilter::ConfirmedOnly,
            ..ViewState::default()
        };
        assert_eq!(ids(&state.apply(&record)), vec![1, 3, 5]);

        state.select_sort(SortKey::Confidence);
        assert_eq!(ids(&state.apply(&record)), vec![3, 5, 1]);

        state.select_sort(SortKey::Confidence);
        assert_eq!(ids(&state.apply(&record)), vec![1, 3, 5]);
    }

    #[test]
    fn test_filter_names_deserialize() {
        let filter: RowFilter = serde_json::from_str("\"false_positive\"").unwrap();
        assert_eq!(filter, RowFilter::FalsePositiveOnly);
        let filter: RowFilter = serde_json::from_str("\"confirmed_only\"").unwrap();
        assert_eq!(filter, RowFilter::ConfirmedOnly);
    }
}
