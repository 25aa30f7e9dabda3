//! Entity-correlation graph: reports, entities, evidence, sources.
//!
//! Entities are merged on write (upsert by value), so separate submissions
//! sharing a phone number, URL, or company name become linkable the moment the
//! second one is persisted. Two backends: Neo4j for production, in-memory for
//! tests and keyless deployments.

mod client;
mod memory;
mod neo4j;
mod types;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use memory::MemoryGraph;
pub use neo4j::Neo4jGraph;
pub use types::{
    EvidenceRecord, GraphEdge, GraphNode, GraphView, NetworkView, ReportRecord, ThreatItem,
};

use anyhow::Result;
use async_trait::async_trait;
use fraudlens_common::EntityLabel;

/// Write/read surface of the correlation graph.
///
/// `add_entity` must be atomic per entity value: create-if-absent with
/// report_count = 1, else increment report_count and touch last_seen. Both
/// backends guarantee this (single Cypher MERGE / single mutex-held update),
/// so concurrent pipelines never lose an increment. The CONTAINS edge is added
/// unconditionally on every call; repeated extraction of the same value within
/// one report keeps its repeat edges.
#[async_trait]
pub trait CorrelationGraph: Send + Sync {
    async fn create_report(&self, report: &ReportRecord) -> Result<()>;

    async fn add_entity(&self, submission_id: &str, value: &str, label: EntityLabel)
        -> Result<()>;

    async fn add_evidence(
        &self,
        submission_id: &str,
        entity: &str,
        evidence: &EvidenceRecord,
    ) -> Result<()>;

    /// Star subgraph of one report (entities, evidence, sources).
    /// `None` when the report is unknown.
    async fn scan_graph(&self, submission_id: &str) -> Result<Option<GraphView>>;

    /// Every report containing the entity, plus each report's other entities.
    /// Unknown entities yield an empty network around the queried value.
    async fn entity_network(&self, value: &str) -> Result<NetworkView>;

    /// Entities seen in more than one report, most corroborated first.
    async fn recent_threats(&self, limit: usize) -> Result<Vec<ThreatItem>>;

    /// Administrative wipe. Test/ops only.
    async fn clear(&self) -> Result<()>;
}

/// Neo4j node label for an entity type. Unlisted labels collapse to `Entity`.
pub(crate) fn entity_node_label(label: EntityLabel) -> &'static str {
    match label {
        EntityLabel::PhoneNumber => "PhoneNumber",
        EntityLabel::Url => "URL",
        EntityLabel::CompanyName => "CompanyImpersonated",
        EntityLabel::DollarAmount => "DollarAmount",
        EntityLabel::EmailAddress => "EmailAddress",
        _ => "Entity",
    }
}
