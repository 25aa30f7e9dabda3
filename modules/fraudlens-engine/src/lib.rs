//! Submission gateway, pipeline orchestration, and the public facade.
//!
//! An [`Engine`] accepts image, voice, and text submissions, runs each
//! through its analysis pipeline on a spawned task, and exposes the
//! resulting event stream, stored submissions, cache, and correlation
//! graph queries. Identical content short-circuits to a cached replay
//! instead of re-running the collaborators.

pub mod collaborators;
pub mod fallback;
mod pipeline;
mod replay;
pub mod store;
pub mod testing;
pub mod verdict;

use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use fraudlens_cache::{fingerprint_bytes, fingerprint_text, CacheStats, ResultCache};
use fraudlens_common::config::Config;
use fraudlens_common::types::{new_submission_id, Modality, Submission};
use fraudlens_events::{EventKind, EventLog, EventRecord};
use fraudlens_graph::{
    CorrelationGraph, GraphClient, GraphView, MemoryGraph, Neo4jGraph, NetworkView, ThreatItem,
};
use futures::Stream;
use serde_json::json;
use tracing::info;

pub use collaborators::{Collaborators, MediaPayload};
pub use store::{ArchiveStore, MemoryStore, SubmissionStore};

use pipeline::Orchestrator;

/// What a caller hands to [`Engine::submit`].
#[derive(Debug, Clone)]
pub enum SubmissionInput {
    Image(MediaPayload),
    Voice(MediaPayload),
    Text(String),
}

impl SubmissionInput {
    pub fn modality(&self) -> Modality {
        match self {
            SubmissionInput::Image(_) => Modality::Image,
            SubmissionInput::Voice(_) => Modality::Voice,
            SubmissionInput::Text(_) => Modality::Text,
        }
    }

    /// Content fingerprint used as the cache key. Byte payloads hash
    /// their raw bytes; URLs and text hash the normalized string.
    pub fn fingerprint(&self) -> String {
        match self {
            SubmissionInput::Image(media) | SubmissionInput::Voice(media) => match media {
                MediaPayload::Bytes { data, .. } => fingerprint_bytes(data),
                MediaPayload::Url(url) => fingerprint_text(url),
            },
            SubmissionInput::Text(text) => fingerprint_text(text),
        }
    }

    pub fn preview(&self) -> String {
        match self {
            SubmissionInput::Image(media) | SubmissionInput::Voice(media) => media.preview(),
            SubmissionInput::Text(text) => text.clone(),
        }
    }
}

/// The engine facade. Cheap to clone; all submissions share the event
/// log, cache, graph, and store behind it.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Orchestrator>,
}

impl Engine {
    pub fn new(
        collaborators: Collaborators,
        graph: Arc<dyn CorrelationGraph>,
        cache: ResultCache,
        store: Arc<dyn SubmissionStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Orchestrator {
                collaborators,
                events: EventLog::new(),
                graph,
                cache,
                store,
            }),
        }
    }

    /// Wire an engine from environment configuration: Neo4j when
    /// credentials are present (in-memory graph otherwise), the SQLite
    /// cache file, and the archive-backed submission store.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let graph: Arc<dyn CorrelationGraph> = match (&config.neo4j_uri, &config.neo4j_password) {
            (Some(uri), Some(password)) => {
                let client = GraphClient::connect(uri, &config.neo4j_user, password).await?;
                Arc::new(Neo4jGraph::new(client))
            }
            _ => {
                info!("neo4j not configured, correlation graph is in-memory");
                Arc::new(MemoryGraph::new())
            }
        };
        let cache = ResultCache::open(&config.cache_db_path).await?;
        let store = Arc::new(ArchiveStore::new(cache.clone()));
        Ok(Self::new(Collaborators::fallback_only(), graph, cache, store))
    }

    /// Accept a submission and return its id immediately. The pipeline
    /// (or a cached replay) runs on a spawned task; callers follow
    /// progress through [`Engine::stream_events`].
    pub async fn submit(&self, input: SubmissionInput) -> Result<String> {
        let fingerprint = input.fingerprint();
        let submission_id = new_submission_id();
        let modality = input.modality();

        self.inner
            .store
            .put(&Submission::accepted(&submission_id, modality))
            .await?;

        if let Some(entry) = self.inner.cache.get(&fingerprint).await? {
            info!(%submission_id, %fingerprint, "cache hit, replaying stored result");
            let orchestrator = Arc::clone(&self.inner);
            let id = submission_id.clone();
            tokio::spawn(async move {
                replay::replay(&orchestrator, id, entry).await;
            });
        } else {
            self.inner.events.append(
                &submission_id,
                EventKind::ScanStarted,
                json!({ "scan_id": &submission_id, "type": modality.as_str() }),
            )?;
            let orchestrator = Arc::clone(&self.inner);
            let id = submission_id.clone();
            tokio::spawn(async move {
                orchestrator.run(id, input, fingerprint).await;
            });
        }

        Ok(submission_id)
    }

    /// Full backlog plus live events for one submission; the stream
    /// ends after the terminal `complete` event.
    pub fn stream_events(
        &self,
        submission_id: &str,
    ) -> Pin<Box<dyn Stream<Item = EventRecord> + Send>> {
        self.inner.events.subscribe(submission_id)
    }

    pub async fn result(&self, submission_id: &str) -> Result<Option<Submission>> {
        self.inner.store.get(submission_id).await
    }

    pub async fn list_submissions(&self, limit: usize) -> Result<Vec<Submission>> {
        self.inner.store.list(limit).await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.inner.cache.stats().await
    }

    /// Drop every cached result, returning how many were removed.
    pub async fn cache_clear(&self) -> Result<u64> {
        self.inner.cache.clear().await
    }

    pub async fn scan_graph(&self, submission_id: &str) -> Result<Option<GraphView>> {
        self.inner.graph.scan_graph(submission_id).await
    }

    pub async fn entity_network(&self, value: &str) -> Result<NetworkView> {
        self.inner.graph.entity_network(value).await
    }

    pub async fn recent_threats(&self, limit: usize) -> Result<Vec<ThreatItem>> {
        self.inner.graph.recent_threats(limit).await
    }
}
