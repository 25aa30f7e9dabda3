use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use fraudlens_common::{Modality, Submission};
use fraudlens_events::EventRecord;

const PREVIEW_MAX: usize = 200;

/// One cached result, keyed uniquely by fingerprint.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub modality: Modality,
    pub result: Submission,
    pub event_sequence: Vec<EventRecord>,
    pub input_preview: String,
    pub created_at: DateTime<Utc>,
    pub hit_count: i64,
    pub last_hit_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub total_entries: i64,
    pub total_hits: i64,
    pub by_modality: HashMap<String, i64>,
}

/// Optional replicated backing store for multi-instance deployments.
/// Mirror failures are logged and dropped; reads never consult the remote.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    async fn mirror(&self, entry: &CacheEntry) -> Result<()>;
    async fn purge(&self) -> Result<()>;
}

/// SQLite-backed result cache plus the completed-submission archive.
#[derive(Clone)]
pub struct ResultCache {
    pool: SqlitePool,
    remote: Option<Arc<dyn RemoteMirror>>,
}

impl ResultCache {
    /// Open (or create) the cache database at the given path. WAL mode.
    pub async fn open(path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .with_context(|| format!("invalid cache path {path}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to open cache db at {path}"))?;
        let cache = Self { pool, remote: None };
        cache.create_tables().await?;
        info!(path, "result cache ready");
        Ok(cache)
    }

    /// In-memory cache for tests. Single connection: each SQLite :memory:
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory cache")?;
        let cache = Self { pool, remote: None };
        cache.create_tables().await?;
        Ok(cache)
    }

    /// Attach a remote mirror. Writes are synced asynchronously, best effort.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteMirror>) -> Self {
        self.remote = Some(remote);
        self
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scan_cache (
                fingerprint TEXT PRIMARY KEY,
                modality TEXT NOT NULL,
                input_preview TEXT NOT NULL DEFAULT '',
                result TEXT NOT NULL,
                event_sequence TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0,
                last_hit_at INTEGER
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cache_modality
             ON scan_cache(modality, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS submissions (
                submission_id TEXT PRIMARY KEY,
                modality TEXT NOT NULL,
                result TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_submissions_created
             ON submissions(created_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Cache read/write ---

    /// Look up a cached result. A hit increments hit_count and stamps
    /// last_hit_at; the returned entry reflects the incremented counters.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT modality, input_preview, result, event_sequence, created_at, hit_count
             FROM scan_cache WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let now = Utc::now();
        sqlx::query(
            "UPDATE scan_cache SET hit_count = hit_count + 1, last_hit_at = ?
             WHERE fingerprint = ?",
        )
        .bind(now.timestamp_millis())
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        let modality: String = row.try_get("modality")?;
        let result_json: String = row.try_get("result")?;
        let events_json: String = row.try_get("event_sequence")?;
        let created_at_ms: i64 = row.try_get("created_at")?;
        let hit_count: i64 = row.try_get("hit_count")?;

        Ok(Some(CacheEntry {
            fingerprint: fingerprint.to_string(),
            modality: modality.parse()?,
            result: serde_json::from_str(&result_json).context("corrupt cached result")?,
            event_sequence: serde_json::from_str(&events_json)
                .context("corrupt cached event sequence")?,
            input_preview: row.try_get("input_preview")?,
            created_at: DateTime::from_timestamp_millis(created_at_ms).unwrap_or(now),
            hit_count: hit_count + 1,
            last_hit_at: Some(now),
        }))
    }

    /// Store a result. Last write wins: at most one entry per fingerprint.
    pub async fn put(
        &self,
        fingerprint: &str,
        modality: Modality,
        result: &Submission,
        event_sequence: &[EventRecord],
        input_preview: &str,
    ) -> Result<()> {
        let created_at = Utc::now();
        let preview: String = input_preview.chars().take(PREVIEW_MAX).collect();

        sqlx::query(
            "INSERT OR REPLACE INTO scan_cache
             (fingerprint, modality, input_preview, result, event_sequence, created_at, hit_count, last_hit_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, NULL)",
        )
        .bind(fingerprint)
        .bind(modality.as_str())
        .bind(&preview)
        .bind(serde_json::to_string(result)?)
        .bind(serde_json::to_string(event_sequence)?)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if let Some(remote) = &self.remote {
            let remote = remote.clone();
            let entry = CacheEntry {
                fingerprint: fingerprint.to_string(),
                modality,
                result: result.clone(),
                event_sequence: event_sequence.to_vec(),
                input_preview: preview,
                created_at,
                hit_count: 0,
                last_hit_at: None,
            };
            tokio::spawn(async move {
                if let Err(e) = remote.mirror(&entry).await {
                    warn!(error = %e, fingerprint = %entry.fingerprint, "remote cache sync failed (non-fatal)");
                }
            });
        }

        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(hit_count), 0) AS hits FROM scan_cache",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_entries: i64 = row.try_get("total")?;
        let total_hits: i64 = row.try_get("hits")?;

        let rows = sqlx::query("SELECT modality, COUNT(*) AS n FROM scan_cache GROUP BY modality")
            .fetch_all(&self.pool)
            .await?;
        let mut by_modality = HashMap::new();
        for row in rows {
            let modality: String = row.try_get("modality")?;
            let n: i64 = row.try_get("n")?;
            by_modality.insert(modality, n);
        }

        Ok(CacheStats {
            total_entries,
            total_hits,
            by_modality,
        })
    }

    /// Delete every cache entry. Returns the number deleted.
    pub async fn clear(&self) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM scan_cache")
            .execute(&self.pool)
            .await?
            .rows_affected();

        if let Some(remote) = &self.remote {
            let remote = remote.clone();
            tokio::spawn(async move {
                if let Err(e) = remote.purge().await {
                    warn!(error = %e, "remote cache purge failed (non-fatal)");
                }
            });
        }

        Ok(deleted)
    }

    // --- Completed-submission archive ---

    /// Persist a completed submission so results survive restarts.
    pub async fn save_submission(&self, submission: &Submission) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO submissions (submission_id, modality, result, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&submission.id)
        .bind(submission.modality.as_str())
        .bind(serde_json::to_string(submission)?)
        .bind(submission.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_submission(&self, submission_id: &str) -> Result<Option<Submission>> {
        let row = sqlx::query("SELECT result FROM submissions WHERE submission_id = ?")
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let json: String = row.try_get("result")?;
                Ok(Some(
                    serde_json::from_str(&json).context("corrupt archived submission")?,
                ))
            }
            None => Ok(None),
        }
    }

    /// Archived submissions, most recent first.
    pub async fn list_submissions(&self, limit: usize) -> Result<Vec<Submission>> {
        let rows = sqlx::query(
            "SELECT result FROM submissions ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut submissions = Vec::with_capacity(rows.len());
        for row in rows {
            let json: String = row.try_get("result")?;
            submissions.push(serde_json::from_str(&json).context("corrupt archived submission")?);
        }
        Ok(submissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fraudlens_events::EventKind;
    use serde_json::json;

    fn submission(id: &str) -> Submission {
        Submission::accepted(id, Modality::Text)
    }

    fn events(id: &str) -> Vec<EventRecord> {
        vec![
            EventRecord {
                submission_id: id.to_string(),
                seq: 0,
                kind: EventKind::ScanStarted,
                payload: json!({"scan_id": id}),
                ts: Utc::now(),
            },
            EventRecord {
                submission_id: id.to_string(),
                seq: 1,
                kind: EventKind::Complete,
                payload: json!({"scan_id": id}),
                ts: Utc::now(),
            },
        ]
    }

    #[tokio::test]
    async fn miss_then_hit_round_trip() {
        let cache = ResultCache::in_memory().await.unwrap();
        assert!(cache.get("fp-a").await.unwrap().is_none());

        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &events("scan-a"), "hello")
            .await
            .unwrap();

        let entry = cache.get("fp-a").await.unwrap().unwrap();
        assert_eq!(entry.result.id, "scan-a");
        assert_eq!(entry.event_sequence.len(), 2);
        assert_eq!(entry.input_preview, "hello");
        assert_eq!(entry.hit_count, 1);
        assert!(entry.last_hit_at.is_some());
    }

    #[tokio::test]
    async fn every_hit_increments_hit_count() {
        let cache = ResultCache::in_memory().await.unwrap();
        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &[], "")
            .await
            .unwrap();

        for expected in 1..=3 {
            let entry = cache.get("fp-a").await.unwrap().unwrap();
            assert_eq!(entry.hit_count, expected);
        }

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_hits, 3);
    }

    #[tokio::test]
    async fn overwrite_is_last_write_wins() {
        let cache = ResultCache::in_memory().await.unwrap();
        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &[], "first")
            .await
            .unwrap();
        cache
            .put("fp-a", Modality::Text, &submission("scan-b"), &[], "second")
            .await
            .unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 1);

        let entry = cache.get("fp-a").await.unwrap().unwrap();
        assert_eq!(entry.result.id, "scan-b");
        assert_eq!(entry.input_preview, "second");
    }

    #[tokio::test]
    async fn stats_group_by_modality() {
        let cache = ResultCache::in_memory().await.unwrap();
        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &[], "")
            .await
            .unwrap();
        cache
            .put("fp-b", Modality::Text, &submission("scan-b"), &[], "")
            .await
            .unwrap();
        cache
            .put(
                "fp-c",
                Modality::Image,
                &Submission::accepted("scan-c", Modality::Image),
                &[],
                "",
            )
            .await
            .unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.by_modality["text"], 2);
        assert_eq!(stats.by_modality["image"], 1);
    }

    #[tokio::test]
    async fn clear_reports_deleted_count() {
        let cache = ResultCache::in_memory().await.unwrap();
        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &[], "")
            .await
            .unwrap();
        cache
            .put("fp-b", Modality::Text, &submission("scan-b"), &[], "")
            .await
            .unwrap();

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.stats().await.unwrap().total_entries, 0);
        assert!(cache.get("fp-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn preview_is_truncated() {
        let cache = ResultCache::in_memory().await.unwrap();
        let long = "x".repeat(500);
        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &[], &long)
            .await
            .unwrap();
        let entry = cache.get("fp-a").await.unwrap().unwrap();
        assert_eq!(entry.input_preview.len(), 200);
    }

    struct FailingMirror;

    #[async_trait]
    impl RemoteMirror for FailingMirror {
        async fn mirror(&self, _entry: &CacheEntry) -> Result<()> {
            anyhow::bail!("remote unreachable")
        }
        async fn purge(&self) -> Result<()> {
            anyhow::bail!("remote unreachable")
        }
    }

    struct CountingMirror(AtomicUsize);

    #[async_trait]
    impl RemoteMirror for CountingMirror {
        async fn mirror(&self, _entry: &CacheEntry) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn purge(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn remote_mirror_failure_is_non_fatal() {
        let cache = ResultCache::in_memory()
            .await
            .unwrap()
            .with_remote(Arc::new(FailingMirror));
        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &[], "")
            .await
            .unwrap();
        // Local read still works despite the failed sync.
        assert!(cache.get("fp-a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remote_mirror_receives_writes() {
        let mirror = Arc::new(CountingMirror(AtomicUsize::new(0)));
        let cache = ResultCache::in_memory()
            .await
            .unwrap()
            .with_remote(mirror.clone());
        cache
            .put("fp-a", Modality::Text, &submission("scan-a"), &[], "")
            .await
            .unwrap();

        // The sync is fire-and-forget; give the spawned task a moment.
        for _ in 0..50 {
            if mirror.0.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("mirror never received the write");
    }

    #[tokio::test]
    async fn archive_round_trip_and_listing() {
        let cache = ResultCache::in_memory().await.unwrap();
        assert!(cache.load_submission("scan-a").await.unwrap().is_none());

        let mut a = submission("scan-a");
        a.created_at = Utc::now() - chrono::Duration::seconds(10);
        let b = submission("scan-b");
        cache.save_submission(&a).await.unwrap();
        cache.save_submission(&b).await.unwrap();

        let loaded = cache.load_submission("scan-a").await.unwrap().unwrap();
        assert_eq!(loaded.id, "scan-a");

        let listed = cache.list_submissions(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "scan-b", "most recent first");
    }
}
