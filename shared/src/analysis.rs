use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::aggregate::aggregate;
use crate::compare::{Comparison, Side};
use crate::error::EngineError;
use crate::record::{FileInfo, ResultRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnalysisType {
    Single,
    Batch,
    Comparison,
}

/// What a finished analysis hands to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "analysis_type", rename_all = "lowercase")]
pub enum Analysis {
    Single {
        result: ResultRecord,
    },
    Batch {
        result: ResultRecord,
        files: Vec<FileInfo>,
    },
    Comparison {
        comparison: Comparison,
    },
}

impl Analysis {
    /// One result is shown as is, several are merged into a batch.
    pub fn from_results(
        mut results: Vec<ResultRecord>,
        model_override: Option<&str>,
    ) -> Result<Self, EngineError> {
        match results.len() {
            0 => Err(EngineError::EmptyBatch),
            1 => Ok(Analysis::Single {
                result: results.remove(0),
            }),
            _ => {
                let result = aggregate(&results, model_override)?;
                let files = results.into_iter().map(|r| r.file_info).collect();
                Ok(Analysis::Batch { result, files })
            }
        }
    }

    pub fn comparison(
        a: ResultRecord,
        label_a: Option<String>,
        b: ResultRecord,
        label_b: Option<String>,
    ) -> Self {
        Analysis::Comparison {
            comparison: Comparison::new(a, label_a, b, label_b),
        }
    }

    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            Analysis::Single { .. } => AnalysisType::Single,
            Analysis::Batch { .. } => AnalysisType::Batch,
            Analysis::Comparison { .. } => AnalysisType::Comparison,
        }
    }

    /// The record rows are read from. A comparison has two, so it needs a
    /// side; single and batch analyses ignore it.
    pub fn record(&self, side: Option<Side>) -> Option<&ResultRecord> {
        match (self, side) {
            (Analysis::Single { result } | Analysis::Batch { result, .. }, _) => Some(result),
            (Analysis::Comparison { comparison }, Some(side)) => {
                Some(&comparison.side(side).record)
            }
            (Analysis::Comparison { .. }, None) => None,
        }
    }
}
