use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fraudlens_common::{Modality, Verdict};

/// One persisted report, created per submission that reached the verdict stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub submission_id: String,
    pub modality: Modality,
    pub verdict_level: String,
    pub confidence: f32,
    pub explanation: String,
    pub scam_type: String,
    pub created_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn from_verdict(submission_id: &str, modality: Modality, verdict: &Verdict) -> Self {
        Self {
            submission_id: submission_id.to_string(),
            modality,
            verdict_level: verdict.level.to_string(),
            confidence: verdict.confidence,
            explanation: verdict.explanation.clone(),
            scam_type: verdict.scam_type.clone(),
            created_at: Utc::now(),
        }
    }
}

/// A corroborating web finding attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Also the merge key of the linked Source node.
    pub source_name: String,
    pub url: String,
    pub snippet: String,
    pub found_by: String,
}

impl EvidenceRecord {
    /// Hostname of the evidence URL, empty when unparseable.
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

// --- Visualization views ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, label: &str) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: label.to_string(),
        }
    }
}

/// Star subgraph of one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Cross-report network around one entity value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub total_reports: i64,
}

/// One row of the most-corroborated-indicators query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatItem {
    pub entity: String,
    pub entity_type: String,
    pub reports: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
}
