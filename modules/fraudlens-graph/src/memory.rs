use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use fraudlens_common::EntityLabel;

use crate::types::{
    EvidenceRecord, GraphEdge, GraphNode, GraphView, NetworkView, ReportRecord, ThreatItem,
};
use crate::{entity_node_label, CorrelationGraph};

/// In-memory correlation graph. Same observable semantics as the Neo4j
/// backend; the single mutex makes every entity upsert atomic.
#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Keyed by submission id, insertion-ordered separately for stable views.
    reports: HashMap<String, ReportRecord>,
    report_order: Vec<String>,
    /// Keyed by entity value — the canonical identity.
    entities: HashMap<String, EntityRow>,
    /// One edge per add_entity call. Duplicates preserved.
    contains: Vec<ContainsEdge>,
    evidence: Vec<EvidenceRow>,
    sources: HashMap<String, String>, // name -> domain
}

struct EntityRow {
    label: EntityLabel,
    first_seen: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
    report_count: i64,
}

struct ContainsEdge {
    report_id: String,
    value: String,
    entity_type: EntityLabel,
}

struct EvidenceRow {
    report_id: String,
    #[allow(dead_code)] // parity with the Neo4j evidence node, unused in views
    entity: String,
    record: EvidenceRecord,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("graph lock poisoned")
    }
}

#[async_trait]
impl CorrelationGraph for MemoryGraph {
    async fn create_report(&self, report: &ReportRecord) -> Result<()> {
        let mut state = self.lock();
        let id = report.submission_id.clone();
        if state.reports.insert(id.clone(), report.clone()).is_none() {
            state.report_order.push(id);
        }
        Ok(())
    }

    async fn add_entity(
        &self,
        submission_id: &str,
        value: &str,
        label: EntityLabel,
    ) -> Result<()> {
        let mut state = self.lock();
        if !state.reports.contains_key(submission_id) {
            warn!(submission_id, "add_entity for unknown report, skipping");
            return Ok(());
        }

        let now = Utc::now();
        state
            .entities
            .entry(value.to_string())
            .and_modify(|row| {
                row.report_count += 1;
                row.last_seen = Some(now);
            })
            .or_insert(EntityRow {
                label,
                first_seen: now,
                last_seen: None,
                report_count: 1,
            });

        state.contains.push(ContainsEdge {
            report_id: submission_id.to_string(),
            value: value.to_string(),
            entity_type: label,
        });
        Ok(())
    }

    async fn add_evidence(
        &self,
        submission_id: &str,
        entity: &str,
        evidence: &EvidenceRecord,
    ) -> Result<()> {
        let mut state = self.lock();
        if !state.reports.contains_key(submission_id) {
            warn!(submission_id, "add_evidence for unknown report, skipping");
            return Ok(());
        }
        state
            .sources
            .entry(evidence.source_name.clone())
            .or_insert_with(|| evidence.domain());
        state.evidence.push(EvidenceRow {
            report_id: submission_id.to_string(),
            entity: entity.to_string(),
            record: evidence.clone(),
        });
        Ok(())
    }

    async fn scan_graph(&self, submission_id: &str) -> Result<Option<GraphView>> {
        let state = self.lock();
        let Some(report) = state.reports.get(submission_id) else {
            return Ok(None);
        };

        let mut view = GraphView::default();
        view.nodes.push(GraphNode {
            id: submission_id.to_string(),
            label: format!("Scan: {}", report.modality),
            kind: "report".to_string(),
            verdict: Some(report.verdict_level.clone()),
            report_count: None,
        });

        let mut seen = Vec::new();
        for edge in state.contains.iter().filter(|e| e.report_id == submission_id) {
            if seen.contains(&&edge.value) {
                continue;
            }
            seen.push(&edge.value);
            let count = state
                .entities
                .get(&edge.value)
                .map(|r| r.report_count)
                .unwrap_or(1);
            let ent_id = format!("ent-{}", edge.value);
            view.nodes.push(GraphNode {
                id: ent_id.clone(),
                label: edge.value.clone(),
                kind: edge.entity_type.as_str().to_string(),
                verdict: None,
                report_count: Some(count),
            });
            view.edges
                .push(GraphEdge::new(submission_id, ent_id, "CONTAINS"));
        }

        for (i, row) in state
            .evidence
            .iter()
            .filter(|e| e.report_id == submission_id)
            .enumerate()
        {
            let ev_id = format!("ev-{submission_id}-{i}");
            let label = if row.record.snippet.is_empty() {
                row.record.url.clone()
            } else {
                row.record.snippet.clone()
            };
            view.nodes.push(GraphNode {
                id: ev_id.clone(),
                label,
                kind: "evidence".to_string(),
                verdict: None,
                report_count: None,
            });
            view.edges
                .push(GraphEdge::new(submission_id, ev_id.clone(), "HAS_EVIDENCE"));

            let src_id = format!("src-{}", row.record.source_name);
            if !view.nodes.iter().any(|n| n.id == src_id) {
                view.nodes.push(GraphNode {
                    id: src_id.clone(),
                    label: row.record.source_name.clone(),
                    kind: "source".to_string(),
                    verdict: None,
                    report_count: None,
                });
            }
            view.edges.push(GraphEdge::new(ev_id, src_id, "FROM_SOURCE"));
        }

        Ok(Some(view))
    }

    async fn entity_network(&self, value: &str) -> Result<NetworkView> {
        let state = self.lock();
        let mut view = NetworkView::default();
        view.total_reports = state
            .entities
            .get(value)
            .map(|r| r.report_count)
            .unwrap_or(0);

        // Reports containing the entity, in report insertion order.
        let mut report_ids: Vec<&String> = Vec::new();
        for id in &state.report_order {
            if state
                .contains
                .iter()
                .any(|e| &e.report_id == id && e.value == value)
            {
                report_ids.push(id);
            }
        }

        for id in &report_ids {
            let report = &state.reports[*id];
            view.nodes.push(GraphNode {
                id: (*id).clone(),
                label: format!("{} scan", report.modality),
                kind: "report".to_string(),
                verdict: Some(report.verdict_level.clone()),
                report_count: None,
            });
            view.edges
                .push(GraphEdge::new(value, (*id).clone(), "REPORTED_IN"));

            let mut linked: Vec<&str> = Vec::new();
            for edge in state
                .contains
                .iter()
                .filter(|e| &e.report_id == *id && e.value != value)
            {
                if linked.contains(&edge.value.as_str()) {
                    continue;
                }
                linked.push(&edge.value);
                if !view.nodes.iter().any(|n| n.id == edge.value) {
                    view.nodes.push(GraphNode {
                        id: edge.value.clone(),
                        label: edge.value.clone(),
                        kind: "entity".to_string(),
                        verdict: None,
                        report_count: None,
                    });
                }
                view.edges
                    .push(GraphEdge::new((*id).clone(), edge.value.clone(), "LINKED"));
            }
        }

        view.nodes.insert(
            0,
            GraphNode {
                id: value.to_string(),
                label: value.to_string(),
                kind: "entity".to_string(),
                verdict: None,
                report_count: Some(view.total_reports),
            },
        );
        Ok(view)
    }

    async fn recent_threats(&self, limit: usize) -> Result<Vec<ThreatItem>> {
        let state = self.lock();
        let mut threats: Vec<ThreatItem> = state
            .entities
            .iter()
            .filter(|(_, row)| row.report_count > 1)
            .map(|(value, row)| ThreatItem {
                entity: value.clone(),
                entity_type: entity_node_label(row.label).to_string(),
                reports: row.report_count,
                first_seen: Some(row.first_seen),
            })
            .collect();
        threats.sort_by(|a, b| b.reports.cmp(&a.reports).then(a.entity.cmp(&b.entity)));
        threats.truncate(limit);
        Ok(threats)
    }

    async fn clear(&self) -> Result<()> {
        *self.lock() = State::default();
        Ok(())
    }
}
