use std::sync::Arc;

use futures::future::try_join_all;
use shared::{Analysis, EngineError, ResultRecord};

use crate::cache::result_cache::ResultCache;
use crate::classifier::upload::UploadedFile;
use crate::classifier::{Classifier, ClassifierError};
use crate::config::AppConfig;
use crate::error::ApiError;

/// Runs uploads through the classifier and hands the results to the engine.
#[derive(Clone)]
pub struct AnalysisService {
    classifier: Arc<dyn Classifier>,
    cache: ResultCache,
    config: Arc<AppConfig>,
}

impl AnalysisService {
    pub fn new(classifier: Arc<dyn Classifier>, cache: ResultCache, config: Arc<AppConfig>) -> Self {
        Self {
            classifier,
            cache,
            config,
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub async fn cached_results(&self) -> u64 {
        self.cache.len().await
    }

    fn check_model(&self, model_id: &str) -> Result<(), ApiError> {
        if self.config.classifier.models.contains_key(model_id) {
            Ok(())
        } else {
            let known: Vec<&str> = self
                .config
                .classifier
                .models
                .keys()
                .map(String::as_str)
                .collect();
            Err(ApiError::BadRequest(format!(
                "Unknown model '{}', expected one of: {}",
                model_id,
                known.join(", ")
            )))
        }
    }

    fn check_size(&self, upload: &UploadedFile) -> Result<(), ApiError> {
        if upload.size() > self.config.limits.max_file_bytes {
            return Err(ApiError::PayloadTooLarge(upload.filename.clone()));
        }
        Ok(())
    }

    pub async fn classify(
        &self,
        upload: &UploadedFile,
        model_id: &str,
    ) -> Result<ResultRecord, ClassifierError> {
        if let Some(record) = self.cache.get(upload, model_id).await {
            log::info!("Using cached result for {} ({})", upload.filename, model_id);
            return Ok(record);
        }
        let record = self.classifier.classify(upload, model_id).await?;
        self.cache.insert(upload, model_id, record.clone()).await;
        Ok(record)
    }

    /// Classifies every upload concurrently. Either all of them succeed or the
    /// first failure is returned and nothing is aggregated.
    pub async fn classify_all(
        &self,
        uploads: &[UploadedFile],
        model_id: &str,
    ) -> Result<Vec<ResultRecord>, ClassifierError> {
        try_join_all(uploads.iter().map(|upload| self.classify(upload, model_id))).await
    }

    /// One upload gives a single analysis, several a merged batch.
    pub async fn analyze(
        &self,
        uploads: &[UploadedFile],
        model_id: &str,
    ) -> Result<Analysis, ApiError> {
        if uploads.is_empty() {
            return Err(EngineError::EmptyBatch.into());
        }
        if uploads.len() > self.config.limits.max_batch_files {
            return Err(ApiError::BadRequest(format!(
                "At most {} files can be analyzed together",
                self.config.limits.max_batch_files
            )));
        }
        self.check_model(model_id)?;
        for upload in uploads {
            self.check_size(upload)?;
        }

        let results = self.classify_all(uploads, model_id).await.map_err(|e| {
            log::error!("Batch of {} files failed: {}", uploads.len(), e);
            e
        })?;
        let model_name = self.config.display_name(model_id);
        Ok(Analysis::from_results(results, Some(&model_name))?)
    }

    /// Two independent runs, each with its own model. Neither is aggregated.
    pub async fn compare(
        &self,
        first: (&UploadedFile, &str),
        second: (&UploadedFile, &str),
    ) -> Result<Analysis, ApiError> {
        for (upload, model_id) in [first, second] {
            self.check_model(model_id)?;
            self.check_size(upload)?;
        }

        let (a, b) = futures::try_join!(
            self.classify(first.0, first.1),
            self.classify(second.0, second.1)
        )?;

        Ok(Analysis::comparison(
            a,
            Some(self.config.display_name(first.1)),
            b,
            Some(self.config.display_name(second.1)),
        ))
    }
}
