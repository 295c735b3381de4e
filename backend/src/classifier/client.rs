use std::time::Duration;

use log::{error, info, warn};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use shared::ResultRecord;

use super::upload::UploadedFile;
use super::{Classifier, ClassifierError};
use crate::config::ClassifierConfig;

#[derive(Clone)]
pub struct HttpClassifier {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    available_models: Vec<String>,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        upload: &UploadedFile,
        model_id: &str,
    ) -> Result<ResultRecord, ClassifierError> {
        let url = self.endpoint("/api/predict");
        info!(
            "Sending prediction request for {} ({} bytes) with model: {}",
            upload.filename,
            upload.size(),
            model_id
        );

        let part = Part::bytes(upload.content.clone())
            .file_name(upload.filename.clone())
            .mime_str("text/csv")?;
        let form = Form::new()
            .part("file", part)
            .text("model_type", model_id.to_string());

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| {
                if source.is_connect() {
                    ClassifierError::Unreachable {
                        url: url.clone(),
                        source,
                    }
                } else {
                    ClassifierError::Transport(source)
                }
            })?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            error!(
                "Classifier rejected {} with {}: {}",
                upload.filename, status, body
            );
            return Err(ClassifierError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let record = ResultRecord::from_slice(&body).map_err(|e| {
            error!("Malformed classifier response for {}: {}", upload.filename, e);
            ClassifierError::Malformed(e)
        })?;
        info!(
            "Prediction complete for {}: {}",
            upload.filename,
            record.summary_message()
        );
        Ok(record)
    }

    async fn health(&self) -> bool {
        match self.http.get(self.endpoint("/")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Classifier at {} is not reachable: {}", self.base_url, e);
                false
            }
        }
    }

    async fn available_models(&self) -> Result<Vec<String>, ClassifierError> {
        let response = self.http.get(self.endpoint("/api/models")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Backend {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let models: ModelsResponse = response.json().await?;
        Ok(models.available_models)
    }
}
