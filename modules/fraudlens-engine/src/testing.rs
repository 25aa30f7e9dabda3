//! Scripted collaborators for tests.
//!
//! Each mock returns a fixed response and counts its calls, so tests
//! can assert both pipeline output and how often a collaborator was
//! actually consulted (cache-hit tests rely on the latter).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use fraudlens_common::types::{
    Classification, EntityLabel, ExtractedEntity, ReputationReport, ResearchReport, Verdict,
    VerdictLevel, VisualAnalysis, VoiceAnalysis,
};
use serde_json::json;

use crate::collaborators::{
    DeepResearcher, EntityExtractor, MediaPayload, ReputationChecker, VerdictAggregator,
    VisionAnalyzer, VoiceAnalyzer,
};
use crate::verdict::VerdictSignals;

pub struct MockVision {
    response: VisualAnalysis,
    calls: AtomicUsize,
}

impl MockVision {
    pub fn new(response: VisualAnalysis) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionAnalyzer for MockVision {
    async fn analyze_image(&self, _image: &MediaPayload) -> Result<VisualAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Always errors, for degraded-completion tests.
pub struct FailingVision;

#[async_trait]
impl VisionAnalyzer for FailingVision {
    async fn analyze_image(&self, _image: &MediaPayload) -> Result<VisualAnalysis> {
        bail!("vision service unavailable")
    }
}

pub struct MockVoice {
    response: VoiceAnalysis,
    calls: AtomicUsize,
}

impl MockVoice {
    pub fn new(response: VoiceAnalysis) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceAnalyzer for MockVoice {
    async fn analyze_voice(&self, _audio: &MediaPayload) -> Result<VoiceAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

pub struct MockExtractor {
    entities: Vec<ExtractedEntity>,
    classification: Classification,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new(entities: Vec<ExtractedEntity>) -> Self {
        Self {
            entities,
            classification: Classification::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_classification(mut self, predicted_class: &str, confidence: f32) -> Self {
        self.classification = Classification {
            predicted_class: predicted_class.to_string(),
            confidence,
        };
        self
    }

    /// Extraction calls only; classification is not counted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityExtractor for MockExtractor {
    async fn extract(&self, _text: &str) -> Result<Vec<ExtractedEntity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entities.clone())
    }

    async fn classify(&self, _text: &str) -> Result<Classification> {
        Ok(self.classification.clone())
    }
}

/// Answers every lookup with a fixed reply, erroring for the entities
/// named in `fail_for`.
pub struct MockReputation {
    answer: String,
    fail_for: HashSet<String>,
    calls: AtomicUsize,
}

impl MockReputation {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail_for: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, entity: &str) -> Self {
        self.fail_for.insert(entity.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReputationChecker for MockReputation {
    async fn check(&self, entity: &str, label: EntityLabel) -> Result<ReputationReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.contains(entity) {
            bail!("reputation lookup timed out");
        }
        Ok(ReputationReport {
            entity: entity.to_string(),
            entity_type: label,
            answer: self.answer.clone(),
            sources: vec![],
        })
    }
}

pub struct MockResearcher {
    calls: AtomicUsize,
}

impl MockResearcher {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockResearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeepResearcher for MockResearcher {
    async fn research(&self, entity: &str, label: EntityLabel) -> Result<ResearchReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResearchReport {
            entity: entity.to_string(),
            entity_type: label,
            findings: json!({ "status": "no further activity found" }),
        })
    }
}

/// Returns a verdict with an impossible confidence, which the engine
/// must reject in favor of the deterministic synthesizer.
pub struct MalformedAggregator;

#[async_trait]
impl VerdictAggregator for MalformedAggregator {
    async fn aggregate(&self, _signals: &VerdictSignals<'_>) -> Result<Verdict> {
        Ok(Verdict {
            level: VerdictLevel::Red,
            confidence: 7.5,
            explanation: "certainly a scam".to_string(),
            scam_type: "unknown".to_string(),
            red_flags: vec![],
            recommended_action: String::new(),
            should_alert_family: true,
            analyzed_by: Some("mock-aggregator".to_string()),
        })
    }
}
