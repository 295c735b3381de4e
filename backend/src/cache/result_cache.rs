use moka::future::Cache;
use moka::policy::EvictionPolicy;
use shared::ResultRecord;

use crate::classifier::upload::UploadedFile;

/// Classification results keyed by model and upload content, so an identical
/// file is not sent to the classifier twice. Least recently used entries are
/// evicted first.
#[derive(Clone)]
pub struct ResultCache {
    inner: Cache<String, ResultRecord>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity as u64)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { inner }
    }

    pub fn cache_key(upload: &UploadedFile, model_id: &str) -> String {
        format!("{}/{}", model_id, upload.content_hash())
    }

    /// Cached record for this upload. The stored filename is replaced by the
    /// upload's, since the same content may arrive under another name.
    pub async fn get(&self, upload: &UploadedFile, model_id: &str) -> Option<ResultRecord> {
        let key = Self::cache_key(upload, model_id);
        self.inner.get(&key).await.map(|mut record| {
            record.file_info.filename = upload.filename.clone();
            record
        })
    }

    pub async fn insert(&self, upload: &UploadedFile, model_id: &str, record: ResultRecord) {
        let key = Self::cache_key(upload, model_id);
        log::debug!("Caching result {}", key);
        self.inner.insert(key, record).await;
        // Apply eviction now so the bound holds between requests.
        self.inner.run_pending_tasks().await;
    }

    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
