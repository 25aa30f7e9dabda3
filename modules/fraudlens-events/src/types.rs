use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire-stable event types. One `Complete` per submission, appended last.
///
/// The vocabulary is closed; stream consumers key on these names. Graph
/// persistence has no `*_complete` counterpart: it produces no payload a
/// consumer renders, so it reports progress with a `Step` only and the
/// terminal `Complete` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ScanStarted,
    Step,
    VisionComplete,
    VoiceComplete,
    EntitiesComplete,
    ReputationComplete,
    ResearchComplete,
    Verdict,
    Complete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ScanStarted => "scan_started",
            EventKind::Step => "step",
            EventKind::VisionComplete => "vision_complete",
            EventKind::VoiceComplete => "voice_complete",
            EventKind::EntitiesComplete => "entities_complete",
            EventKind::ReputationComplete => "reputation_complete",
            EventKind::ResearchComplete => "research_complete",
            EventKind::Verdict => "verdict",
            EventKind::Complete => "complete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event as stored in the log. The log assigns `seq` and `ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub submission_id: String,
    pub seq: u64,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_wire_names() {
        assert_eq!(EventKind::ScanStarted.as_str(), "scan_started");
        assert_eq!(EventKind::ReputationComplete.as_str(), "reputation_complete");
        assert_eq!(
            serde_json::to_value(EventKind::Complete).unwrap(),
            serde_json::json!("complete")
        );
        let back: EventKind = serde_json::from_str("\"vision_complete\"").unwrap();
        assert_eq!(back, EventKind::VisionComplete);
    }
}
