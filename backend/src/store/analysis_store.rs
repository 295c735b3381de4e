use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::Serialize;
use shared::Analysis;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StoredAnalysis {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub analysis: Analysis,
}

/// Finished analyses plus the one currently on display. Handlers receive the
/// store through app data rather than reaching for global state.
pub trait AnalysisStore: Send + Sync {
    /// Stores `analysis` and makes it the current one.
    fn insert(&self, analysis: Analysis) -> Arc<StoredAnalysis>;

    fn get(&self, id: Uuid) -> Option<Arc<StoredAnalysis>>;

    fn current(&self) -> Option<Arc<StoredAnalysis>>;

    /// Returns false when `id` is unknown.
    fn set_current(&self, id: Uuid) -> bool;
}

pub struct InMemoryAnalysisStore {
    analyses: Cache<Uuid, Arc<StoredAnalysis>>,
    current: RwLock<Option<Uuid>>,
}

impl InMemoryAnalysisStore {
    pub fn new(capacity: usize) -> Self {
        let analyses = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            analyses,
            current: RwLock::new(None),
        }
    }
}

impl AnalysisStore for InMemoryAnalysisStore {
    fn insert(&self, analysis: Analysis) -> Arc<StoredAnalysis> {
        let stored = Arc::new(StoredAnalysis {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            analysis,
        });

        self.analyses.insert(stored.id, stored.clone());
        self.analyses.run_pending_tasks();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(stored.id);

        log::info!(
            "Stored {} analysis {}",
            stored.analysis.analysis_type(),
            stored.id
        );
        stored
    }

    fn get(&self, id: Uuid) -> Option<Arc<StoredAnalysis>> {
        self.analyses.get(&id)
    }

    fn current(&self) -> Option<Arc<StoredAnalysis>> {
        let current = *self.current.read().unwrap_or_else(PoisonError::into_inner);
        current.and_then(|id| self.analyses.get(&id))
    }

    fn set_current(&self, id: Uuid) -> bool {
        if !self.analyses.contains_key(&id) {
            return false;
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ResultRecord;

    fn analysis(filename: &str) -> Analysis {
        Analysis::from_results(
            vec![ResultRecord::from_rows("CatBoost", filename, 2, Vec::new())],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_becomes_current() {
        let store = InMemoryAnalysisStore::new(8);
        assert!(store.current().is_none());

        let first = store.insert(analysis("a.csv"));
        let second = store.insert(analysis("b.csv"));
        assert_eq!(store.current().unwrap().id, second.id);

        assert!(store.set_current(first.id));
        assert_eq!(store.current().unwrap().id, first.id);
        assert!(!store.set_current(Uuid::new_v4()));
        assert_eq!(store.get(second.id).unwrap().id, second.id);
    }

    #[test]
    fn test_capacity_drops_least_recent() {
        let store = InMemoryAnalysisStore::new(2);
        let first = store.insert(analysis("a.csv"));
        let _ = store.insert(analysis("b.csv"));
        let third = store.insert(analysis("c.csv"));

        assert!(store.get(first.id).is_none());
        assert!(!store.set_current(first.id));
        assert_eq!(store.current().unwrap().id, third.id);
    }
}
