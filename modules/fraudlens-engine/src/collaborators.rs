//! Trait seams for the external analysis collaborators.
//!
//! Each stage of the pipeline talks to its collaborator through one of
//! these traits. Every slot except the entity extractor is optional; a
//! missing collaborator makes the pipeline skip or fall back, never
//! fail. The extractor slot is always populated because the regex
//! fallback gives us a working extractor with no external service.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use fraudlens_common::types::{
    Classification, EntityLabel, ExtractedEntity, ReputationReport, ResearchReport, Verdict,
    VisualAnalysis, VoiceAnalysis,
};

use crate::fallback::RegexExtractor;
use crate::verdict::VerdictSignals;

/// Raw media handed to a vision or voice collaborator.
#[derive(Debug, Clone)]
pub enum MediaPayload {
    Bytes {
        data: Vec<u8>,
        filename: Option<String>,
    },
    Url(String),
}

impl MediaPayload {
    /// Short human-readable description used for cache previews.
    pub fn preview(&self) -> String {
        match self {
            MediaPayload::Bytes { data, filename } => filename
                .clone()
                .unwrap_or_else(|| format!("<{} bytes>", data.len())),
            MediaPayload::Url(url) => url.clone(),
        }
    }
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze_image(&self, image: &MediaPayload) -> Result<VisualAnalysis>;
}

#[async_trait]
pub trait VoiceAnalyzer: Send + Sync {
    async fn analyze_voice(&self, audio: &MediaPayload) -> Result<VoiceAnalysis>;
}

/// Structured entity extraction plus scam-type classification over text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedEntity>>;
    async fn classify(&self, text: &str) -> Result<Classification>;
}

#[async_trait]
pub trait ReputationChecker: Send + Sync {
    async fn check(&self, entity: &str, label: EntityLabel) -> Result<ReputationReport>;
}

#[async_trait]
pub trait DeepResearcher: Send + Sync {
    async fn research(&self, entity: &str, label: EntityLabel) -> Result<ResearchReport>;
}

/// Optional model-backed verdict synthesis. When absent, or when the
/// aggregator errors or returns an out-of-range verdict, the engine
/// uses [`crate::verdict::synthesize_verdict`] instead.
#[async_trait]
pub trait VerdictAggregator: Send + Sync {
    async fn aggregate(&self, signals: &VerdictSignals<'_>) -> Result<Verdict>;
}

/// The full collaborator set wired into an engine instance.
#[derive(Clone)]
pub struct Collaborators {
    pub vision: Option<Arc<dyn VisionAnalyzer>>,
    pub voice: Option<Arc<dyn VoiceAnalyzer>>,
    pub extractor: Arc<dyn EntityExtractor>,
    pub reputation: Option<Arc<dyn ReputationChecker>>,
    pub research: Option<Arc<dyn DeepResearcher>>,
    pub aggregator: Option<Arc<dyn VerdictAggregator>>,
}

impl Collaborators {
    pub fn new(extractor: Arc<dyn EntityExtractor>) -> Self {
        Self {
            vision: None,
            voice: None,
            extractor,
            reputation: None,
            research: None,
            aggregator: None,
        }
    }

    /// A collaborator set that needs no external services at all.
    pub fn fallback_only() -> Self {
        Self::new(Arc::new(RegexExtractor::default()))
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionAnalyzer>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_voice(mut self, voice: Arc<dyn VoiceAnalyzer>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_reputation(mut self, reputation: Arc<dyn ReputationChecker>) -> Self {
        self.reputation = Some(reputation);
        self
    }

    pub fn with_research(mut self, research: Arc<dyn DeepResearcher>) -> Self {
        self.research = Some(research);
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn VerdictAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }
}
