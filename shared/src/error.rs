#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot aggregate an empty batch")]
    EmptyBatch,
    #[error("Comparison insight is undefined: {0}")]
    IncompatibleComparison(String),
    #[error("Malformed record: {field}")]
    MalformedRecord { field: String },
    #[error("Export failed: {0}")]
    Export(String),
}

impl EngineError {
    pub fn malformed(field: impl Into<String>) -> Self {
        EngineError::MalformedRecord {
            field: field.into(),
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Export(err.to_string())
    }
}
