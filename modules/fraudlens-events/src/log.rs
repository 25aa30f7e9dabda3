use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use chrono::Utc;
use futures::Stream;
use tokio::sync::Notify;

use crate::types::{EventKind, EventRecord};

/// In-process event log, one append-only sequence per submission.
///
/// Appends come from a single writer per submission; readers subscribe with
/// `subscribe()` and are woken through a `Notify` rather than a polling loop.
#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<RwLock<HashMap<String, Arc<SubmissionLog>>>>,
}

#[derive(Default)]
struct SubmissionLog {
    events: RwLock<Vec<EventRecord>>,
    notify: Notify,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning the next sequence number.
    /// Fails if the submission already has its terminal `complete` event.
    pub fn append(
        &self,
        submission_id: &str,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<u64> {
        let log = self.entry(submission_id);
        let mut events = log.events.write().expect("event log lock poisoned");

        if events.last().is_some_and(|e| e.kind == EventKind::Complete) {
            bail!("submission {submission_id} is complete, no further events accepted");
        }

        let seq = events.len() as u64;
        events.push(EventRecord {
            submission_id: submission_id.to_string(),
            seq,
            kind,
            payload,
            ts: Utc::now(),
        });
        drop(events);

        log.notify.notify_waiters();
        Ok(seq)
    }

    /// Snapshot of every event appended so far, in sequence order.
    pub fn events(&self, submission_id: &str) -> Vec<EventRecord> {
        match self
            .inner
            .read()
            .expect("event log lock poisoned")
            .get(submission_id)
        {
            Some(log) => log.events.read().expect("event log lock poisoned").clone(),
            None => Vec::new(),
        }
    }

    /// Whether the submission has reached its terminal event.
    pub fn is_complete(&self, submission_id: &str) -> bool {
        self.events(submission_id)
            .last()
            .is_some_and(|e| e.kind == EventKind::Complete)
    }

    /// Subscribe to a submission's events. Always starts from index 0 (full
    /// backlog), then waits for new appends, and ends after yielding the
    /// `complete` event. Subscribing before the first append is fine.
    pub fn subscribe(
        &self,
        submission_id: &str,
    ) -> Pin<Box<dyn Stream<Item = EventRecord> + Send>> {
        let log = self.entry(submission_id);

        Box::pin(async_stream::stream! {
            let mut next = 0usize;
            loop {
                // Register the waiter before snapshotting, so an append that
                // lands between snapshot and await still wakes us.
                let notified = log.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let batch: Vec<EventRecord> = {
                    let events = log.events.read().expect("event log lock poisoned");
                    events[next..].to_vec()
                };

                if batch.is_empty() {
                    notified.await;
                    continue;
                }

                for event in batch {
                    next += 1;
                    let terminal = event.kind == EventKind::Complete;
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }
        })
    }

    fn entry(&self, submission_id: &str) -> Arc<SubmissionLog> {
        if let Some(log) = self
            .inner
            .read()
            .expect("event log lock poisoned")
            .get(submission_id)
        {
            return log.clone();
        }
        self.inner
            .write()
            .expect("event log lock poisoned")
            .entry(submission_id.to_string())
            .or_default()
            .clone()
    }
}
