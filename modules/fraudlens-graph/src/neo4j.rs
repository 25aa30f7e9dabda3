use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::query;
use tracing::warn;

use fraudlens_common::EntityLabel;

use crate::types::{
    EvidenceRecord, GraphEdge, GraphNode, GraphView, NetworkView, ReportRecord, ThreatItem,
};
use crate::{entity_node_label, CorrelationGraph, GraphClient};

/// Neo4j-backed correlation graph.
///
/// The entity upsert is a single MERGE statement, so create-if-absent-else-
/// increment is atomic at the storage layer even when two pipelines finish
/// concurrently with the same value.
pub struct Neo4jGraph {
    client: GraphClient,
}

impl Neo4jGraph {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CorrelationGraph for Neo4jGraph {
    async fn create_report(&self, report: &ReportRecord) -> Result<()> {
        let q = query(
            "CREATE (r:ScamReport {
                scanId: $scan_id,
                type: $modality,
                verdict: $verdict_level,
                confidence: $confidence,
                explanation: $explanation,
                scamType: $scam_type,
                createdAt: $created_at
            })",
        )
        .param("scan_id", report.submission_id.as_str())
        .param("modality", report.modality.as_str())
        .param("verdict_level", report.verdict_level.as_str())
        .param("confidence", report.confidence as f64)
        .param("explanation", report.explanation.as_str())
        .param("scam_type", report.scam_type.as_str())
        .param("created_at", format_datetime(&report.created_at));

        self.client.graph.run(q).await?;
        Ok(())
    }

    async fn add_entity(
        &self,
        submission_id: &str,
        value: &str,
        label: EntityLabel,
    ) -> Result<()> {
        let node_label = entity_node_label(label);

        // MERGE keys on value so the same indicator across scans lands on one
        // node. The CONTAINS edge is CREATEd unconditionally per call.
        let cypher = format!(
            "MATCH (r:ScamReport {{scanId: $scan_id}})
             MERGE (e:{node_label} {{value: $value}})
             ON CREATE SET e.firstSeen = $now, e.reportCount = 1
             ON MATCH SET e.reportCount = e.reportCount + 1, e.lastSeen = $now
             CREATE (r)-[:CONTAINS {{entityType: $entity_type}}]->(e)"
        );
        let q = query(&cypher)
            .param("scan_id", submission_id)
            .param("value", value)
            .param("entity_type", label.as_str())
            .param("now", format_datetime(&Utc::now()));

        self.client.graph.run(q).await?;
        Ok(())
    }

    async fn add_evidence(
        &self,
        submission_id: &str,
        entity: &str,
        evidence: &EvidenceRecord,
    ) -> Result<()> {
        let q = query(
            "MATCH (r:ScamReport {scanId: $scan_id})
             CREATE (ev:Evidence {
                 entity: $entity,
                 snippet: $snippet,
                 url: $url,
                 sourceName: $source_name,
                 foundBy: $found_by,
                 createdAt: $now
             })
             CREATE (r)-[:HAS_EVIDENCE]->(ev)
             MERGE (s:Source {name: $source_name})
             ON CREATE SET s.domain = $domain
             CREATE (ev)-[:FROM_SOURCE]->(s)",
        )
        .param("scan_id", submission_id)
        .param("entity", entity)
        .param("snippet", truncate(&evidence.snippet, 500))
        .param("url", evidence.url.as_str())
        .param("source_name", evidence.source_name.as_str())
        .param("found_by", evidence.found_by.as_str())
        .param("domain", evidence.domain())
        .param("now", format_datetime(&Utc::now()));

        self.client.graph.run(q).await?;
        Ok(())
    }

    async fn scan_graph(&self, submission_id: &str) -> Result<Option<GraphView>> {
        let q = query(
            "MATCH (r:ScamReport {scanId: $scan_id}) RETURN r.type AS modality, r.verdict AS verdict",
        )
        .param("scan_id", submission_id);

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Ok(None);
        };
        let modality: String = row.get("modality").unwrap_or_default();
        let verdict: String = row.get("verdict").unwrap_or_default();

        let mut view = GraphView::default();
        view.nodes.push(GraphNode {
            id: submission_id.to_string(),
            label: format!("Scan: {modality}"),
            kind: "report".to_string(),
            verdict: Some(verdict),
            report_count: None,
        });

        let q = query(
            "MATCH (r:ScamReport {scanId: $scan_id})-[c:CONTAINS]->(e)
             RETURN DISTINCT e.value AS value, c.entityType AS entity_type,
                    e.reportCount AS report_count",
        )
        .param("scan_id", submission_id);
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            let value: String = row.get("value").unwrap_or_default();
            let entity_type: String = row.get("entity_type").unwrap_or_default();
            let report_count: i64 = row.get("report_count").unwrap_or(1);
            let ent_id = format!("ent-{value}");
            view.nodes.push(GraphNode {
                id: ent_id.clone(),
                label: value,
                kind: entity_type,
                verdict: None,
                report_count: Some(report_count),
            });
            view.edges
                .push(GraphEdge::new(submission_id, ent_id, "CONTAINS"));
        }

        let q = query(
            "MATCH (r:ScamReport {scanId: $scan_id})-[:HAS_EVIDENCE]->(ev)-[:FROM_SOURCE]->(s)
             RETURN ev.snippet AS snippet, ev.url AS url, s.name AS source",
        )
        .param("scan_id", submission_id);
        let mut stream = self.client.graph.execute(q).await?;
        let mut ev_idx = 0usize;
        while let Some(row) = stream.next().await? {
            let snippet: String = row.get("snippet").unwrap_or_default();
            let url: String = row.get("url").unwrap_or_default();
            let source: String = row.get("source").unwrap_or_default();

            let ev_id = format!("ev-{submission_id}-{ev_idx}");
            ev_idx += 1;
            view.nodes.push(GraphNode {
                id: ev_id.clone(),
                label: if snippet.is_empty() { url } else { snippet },
                kind: "evidence".to_string(),
                verdict: None,
                report_count: None,
            });
            view.edges
                .push(GraphEdge::new(submission_id, ev_id.clone(), "HAS_EVIDENCE"));

            let src_id = format!("src-{source}");
            if !view.nodes.iter().any(|n| n.id == src_id) {
                view.nodes.push(GraphNode {
                    id: src_id.clone(),
                    label: source,
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
        let mut view = NetworkView::default();

        let q = query(
            "MATCH (e {value: $value})<-[:CONTAINS]-(r:ScamReport)
             RETURN DISTINCT r.scanId AS scan_id, r.type AS modality,
                    r.verdict AS verdict, e.reportCount AS total",
        )
        .param("value", value);
        let mut stream = self.client.graph.execute(q).await?;
        let mut report_ids = Vec::new();
        while let Some(row) = stream.next().await? {
            let scan_id: String = row.get("scan_id").unwrap_or_default();
            let modality: String = row.get("modality").unwrap_or_default();
            let verdict: String = row.get("verdict").unwrap_or_default();
            view.total_reports = row.get("total").unwrap_or(0);

            view.nodes.push(GraphNode {
                id: scan_id.clone(),
                label: format!("{modality} scan"),
                kind: "report".to_string(),
                verdict: Some(verdict),
                report_count: None,
            });
            view.edges
                .push(GraphEdge::new(value, scan_id.clone(), "REPORTED_IN"));
            report_ids.push(scan_id);
        }

        let q = query(
            "MATCH (e {value: $value})<-[:CONTAINS]-(r:ScamReport)-[:CONTAINS]->(other)
             WHERE other.value <> $value
             RETURN DISTINCT r.scanId AS scan_id, other.value AS other_value",
        )
        .param("value", value);
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            let scan_id: String = row.get("scan_id").unwrap_or_default();
            let other_value: String = row.get("other_value").unwrap_or_default();
            if !view.nodes.iter().any(|n| n.id == other_value) {
                view.nodes.push(GraphNode {
                    id: other_value.clone(),
                    label: other_value.clone(),
                    kind: "entity".to_string(),
                    verdict: None,
                    report_count: None,
                });
            }
            view.edges.push(GraphEdge::new(scan_id, other_value, "LINKED"));
        }

        // Queried entity as center node, first.
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
        let q = query(
            "MATCH (e)<-[:CONTAINS]-(:ScamReport)
             WHERE e.reportCount > 1
             RETURN DISTINCT e.value AS entity, labels(e)[0] AS entity_type,
                    e.reportCount AS reports, e.firstSeen AS first_seen
             ORDER BY e.reportCount DESC
             LIMIT $limit",
        )
        .param("limit", limit as i64);

        let mut stream = self.client.graph.execute(q).await?;
        let mut threats = Vec::new();
        while let Some(row) = stream.next().await? {
            let first_seen: String = row.get("first_seen").unwrap_or_default();
            threats.push(ThreatItem {
                entity: row.get("entity").unwrap_or_default(),
                entity_type: row.get("entity_type").unwrap_or_default(),
                reports: row.get("reports").unwrap_or(0),
                first_seen: parse_datetime(&first_seen),
            });
        }
        Ok(threats)
    }

    async fn clear(&self) -> Result<()> {
        warn!("clearing entire correlation graph");
        self.client
            .graph
            .run(query("MATCH (n) DETACH DELETE n"))
            .await?;
        Ok(())
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}
