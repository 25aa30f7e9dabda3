//! Submission state storage.
//!
//! The engine tracks every submission from acceptance through its final
//! verdict. `MemoryStore` keeps everything in-process; `ArchiveStore`
//! writes through to the SQLite submissions table so results survive a
//! restart.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use fraudlens_cache::ResultCache;
use fraudlens_common::types::Submission;

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn put(&self, submission: &Submission) -> Result<()>;
    async fn get(&self, submission_id: &str) -> Result<Option<Submission>>;
    /// Most recent first.
    async fn list(&self, limit: usize) -> Result<Vec<Submission>>;
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    by_id: HashMap<String, Submission>,
    order: Vec<String>,
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn put(&self, submission: &Submission) -> Result<()> {
        let mut state = self.inner.write().expect("submission store lock poisoned");
        if !state.by_id.contains_key(&submission.id) {
            state.order.push(submission.id.clone());
        }
        state.by_id.insert(submission.id.clone(), submission.clone());
        Ok(())
    }

    async fn get(&self, submission_id: &str) -> Result<Option<Submission>> {
        let state = self.inner.read().expect("submission store lock poisoned");
        Ok(state.by_id.get(submission_id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Submission>> {
        let state = self.inner.read().expect("submission store lock poisoned");
        Ok(state
            .order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.by_id.get(id).cloned())
            .collect())
    }
}

/// Persistent store backed by the cache database.
pub struct ArchiveStore {
    cache: ResultCache,
}

impl ArchiveStore {
    pub fn new(cache: ResultCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SubmissionStore for ArchiveStore {
    async fn put(&self, submission: &Submission) -> Result<()> {
        self.cache.save_submission(submission).await
    }

    async fn get(&self, submission_id: &str) -> Result<Option<Submission>> {
        self.cache.load_submission(submission_id).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<Submission>> {
        self.cache.list_submissions(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlens_common::types::{Modality, SubmissionStatus};

    #[tokio::test]
    async fn memory_store_lists_newest_first() {
        let store = MemoryStore::default();
        for id in ["scan-a", "scan-b", "scan-c"] {
            store
                .put(&Submission::accepted(id, Modality::Text))
                .await
                .unwrap();
        }

        let listed = store.list(2).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["scan-c", "scan-b"]);
    }

    #[tokio::test]
    async fn memory_store_overwrites_without_duplicating() {
        let store = MemoryStore::default();
        let mut submission = Submission::accepted("scan-a", Modality::Text);
        store.put(&submission).await.unwrap();

        submission.status = SubmissionStatus::Complete;
        store.put(&submission).await.unwrap();

        let listed = store.list(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, SubmissionStatus::Complete);
    }
}
