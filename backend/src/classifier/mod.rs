pub mod client;
pub mod upload;

use shared::{EngineError, ResultRecord};

use upload::UploadedFile;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Cannot connect to classifier at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx answer from the classifier, kept verbatim for the caller.
    #[error("Classifier returned {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("Classifier response rejected: {0}")]
    Malformed(#[from] EngineError),
}

/// The classification backend: one request per uploaded dataset.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        upload: &UploadedFile,
        model_id: &str,
    ) -> Result<ResultRecord, ClassifierError>;

    async fn health(&self) -> bool;

    async fn available_models(&self) -> Result<Vec<String>, ClassifierError>;
}
