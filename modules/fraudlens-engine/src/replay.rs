//! Cached-result replay.
//!
//! A cache hit re-emits the stored event sequence for the new
//! submission id with per-kind pacing delays, so a consumer watching
//! the stream sees the same progression a fresh run would produce,
//! just faster. The cached sequence ends at the verdict; replay
//! finalizes the submission itself and appends its own terminal event.

use std::time::Duration;

use anyhow::Result;
use fraudlens_cache::CacheEntry;
use fraudlens_common::types::SubmissionStatus;
use fraudlens_events::EventKind;
use serde_json::json;
use tracing::{error, info};

use crate::pipeline::Orchestrator;

fn replay_delay(kind: EventKind) -> Duration {
    let ms = match kind {
        EventKind::ScanStarted => 100,
        EventKind::Step => 300,
        EventKind::VisionComplete => 800,
        EventKind::VoiceComplete => 800,
        EventKind::EntitiesComplete => 600,
        EventKind::ReputationComplete => 700,
        EventKind::ResearchComplete => 500,
        EventKind::Verdict => 400,
        EventKind::Complete => 200,
    };
    Duration::from_millis(ms)
}

/// Rewrite any top-level scan id in a cached payload to the replaying
/// submission's id. Payloads are otherwise re-emitted verbatim.
fn rebind_payload(mut payload: serde_json::Value, submission_id: &str) -> serde_json::Value {
    if let Some(object) = payload.as_object_mut() {
        if object.contains_key("scan_id") {
            object.insert("scan_id".to_string(), json!(submission_id));
        }
    }
    payload
}

pub(crate) async fn replay(orchestrator: &Orchestrator, submission_id: String, entry: CacheEntry) {
    if let Err(e) = replay_inner(orchestrator, &submission_id, entry).await {
        error!(%submission_id, error = %e, "replay stopped on storage failure");
    }
}

async fn replay_inner(
    orchestrator: &Orchestrator,
    submission_id: &str,
    entry: CacheEntry,
) -> Result<()> {
    for event in &entry.event_sequence {
        tokio::time::sleep(replay_delay(event.kind)).await;
        orchestrator.events.append(
            submission_id,
            event.kind,
            rebind_payload(event.payload.clone(), submission_id),
        )?;
    }

    let mut result = entry.result;
    result.id = submission_id.to_string();
    result.status = SubmissionStatus::Complete;
    // Keep the acceptance time written at submit, not the cached run's.
    if let Some(accepted) = orchestrator.store.get(submission_id).await? {
        result.created_at = accepted.created_at;
    }
    orchestrator.store.put(&result).await?;

    tokio::time::sleep(replay_delay(EventKind::Complete)).await;
    orchestrator.events.append(
        submission_id,
        EventKind::Complete,
        json!({ "scan_id": submission_id, "cached": true }),
    )?;
    info!(%submission_id, fingerprint = %entry.fingerprint, "replayed cached result");
    Ok(())
}
