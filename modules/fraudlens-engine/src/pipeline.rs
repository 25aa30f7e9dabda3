//! The per-submission pipeline.
//!
//! One orchestrator task owns a submission from `running` to `complete`.
//! Collaborator failures are caught at each stage boundary and turned
//! into error-flagged stage output; nothing a collaborator does can
//! abort the submission. Only storage failures (event log, submission
//! store) end the task early, and those are logged.

use std::sync::Arc;

use anyhow::Result;
use fraudlens_cache::ResultCache;
use fraudlens_common::types::{
    Classification, ExtractedEntity, ReputationReport, ResearchReport, StageResult, Submission,
    SubmissionStatus, Verdict, VisualAnalysis, VoiceAnalysis,
};
use fraudlens_common::FraudLensError;
use fraudlens_events::{EventKind, EventLog};
use fraudlens_graph::{CorrelationGraph, EvidenceRecord, ReportRecord};
use futures::future::join_all;
use serde_json::json;
use tracing::{error, info, warn};

use crate::collaborators::Collaborators;
use crate::store::SubmissionStore;
use crate::verdict::{is_well_formed, synthesize_verdict, VerdictSignals};
use crate::SubmissionInput;

pub(crate) const STAGE_VISION: &str = "vision_analysis";
pub(crate) const STAGE_VOICE: &str = "voice_analysis";
pub(crate) const STAGE_EXTRACTION: &str = "entity_extraction";
pub(crate) const STAGE_REPUTATION: &str = "reputation_lookup";
pub(crate) const STAGE_RESEARCH: &str = "deep_research";
pub(crate) const STAGE_VERDICT: &str = "verdict_synthesis";
pub(crate) const STAGE_GRAPH: &str = "graph_persist";

pub(crate) struct Orchestrator {
    pub collaborators: Collaborators,
    pub events: EventLog,
    pub graph: Arc<dyn CorrelationGraph>,
    pub cache: ResultCache,
    pub store: Arc<dyn SubmissionStore>,
}

impl Orchestrator {
    /// Drive one submission to its terminal event. Spawned by the
    /// gateway; never returns an error to it.
    pub async fn run(&self, submission_id: String, input: SubmissionInput, fingerprint: String) {
        if let Err(e) = self.run_inner(&submission_id, &input, &fingerprint).await {
            error!(%submission_id, error = %e, "pipeline stopped on storage failure");
        }
    }

    async fn run_inner(
        &self,
        id: &str,
        input: &SubmissionInput,
        fingerprint: &str,
    ) -> Result<()> {
        let modality = input.modality();
        let mut submission = match self.store.get(id).await? {
            Some(s) => s,
            None => Submission::accepted(id, modality),
        };
        submission.status = SubmissionStatus::Running;
        self.store.put(&submission).await?;

        // Modality-specific analysis stage, producing the text the
        // extraction stage works on.
        let extraction_text = match input {
            SubmissionInput::Image(media) => {
                self.step(id, STAGE_VISION)?;
                let visual: StageResult<VisualAnalysis> = match &self.collaborators.vision {
                    Some(vision) => vision.analyze_image(media).await.into(),
                    None => StageResult::failed(
                        FraudLensError::CollaboratorUnavailable("vision analyzer".into())
                            .to_string(),
                    ),
                };
                self.events
                    .append(id, EventKind::VisionComplete, json!({ "visual": &visual }))?;
                let text = visual
                    .ok()
                    .map(|v| v.text_content.clone())
                    .unwrap_or_default();
                submission.degraded |= visual.is_failed();
                submission.visual = Some(visual);
                text
            }
            SubmissionInput::Voice(media) => {
                self.step(id, STAGE_VOICE)?;
                let voice: StageResult<VoiceAnalysis> = match &self.collaborators.voice {
                    Some(analyzer) => analyzer.analyze_voice(media).await.into(),
                    None => StageResult::failed(
                        FraudLensError::CollaboratorUnavailable("voice analyzer".into())
                            .to_string(),
                    ),
                };
                self.events
                    .append(id, EventKind::VoiceComplete, json!({ "voice": &voice }))?;
                let text = voice
                    .ok()
                    .map(|v| v.transcript.clone())
                    .unwrap_or_default();
                submission.degraded |= voice.is_failed();
                submission.voice = Some(voice);
                text
            }
            SubmissionInput::Text(text) => text.clone(),
        };

        // Entity extraction; for text submissions classification runs
        // concurrently against the same input.
        self.step(id, STAGE_EXTRACTION)?;
        let entities: Vec<ExtractedEntity>;
        if let SubmissionInput::Text(_) = input {
            let (extracted, classified) = tokio::join!(
                self.collaborators.extractor.extract(&extraction_text),
                self.collaborators.extractor.classify(&extraction_text),
            );
            entities = self.unwrap_entities(id, extracted, &mut submission);
            let classification: StageResult<Classification> = classified.into();
            submission.degraded |= classification.is_failed();
            self.events.append(
                id,
                EventKind::EntitiesComplete,
                json!({ "entities": &entities, "classification": &classification }),
            )?;
            submission.classification = Some(classification);
        } else {
            let extracted = self.collaborators.extractor.extract(&extraction_text).await;
            entities = self.unwrap_entities(id, extracted, &mut submission);
            self.events.append(
                id,
                EventKind::EntitiesComplete,
                json!({ "entities": &entities }),
            )?;
        }
        submission.entities = entities.clone();

        self.step(id, STAGE_REPUTATION)?;
        let reputation = self.fan_out_reputation(&entities).await;
        submission.degraded |= reputation.iter().any(StageResult::is_failed);
        self.events.append(
            id,
            EventKind::ReputationComplete,
            json!({ "results": &reputation }),
        )?;
        submission.reputation = reputation;

        self.step(id, STAGE_RESEARCH)?;
        let research = self.fan_out_research(&entities).await;
        submission.degraded |= research.iter().any(StageResult::is_failed);
        self.events.append(
            id,
            EventKind::ResearchComplete,
            json!({ "results": &research }),
        )?;
        submission.research = research;

        self.step(id, STAGE_VERDICT)?;
        let verdict = {
            let signals = VerdictSignals {
                visual: submission.visual.as_ref().and_then(StageResult::ok),
                voice: submission.voice.as_ref().and_then(StageResult::ok),
                entities: &submission.entities,
                classification: submission.classification.as_ref().and_then(StageResult::ok),
                reputation: &submission.reputation,
                research: &submission.research,
            };
            self.resolve_verdict(id, &signals).await
        };
        self.events
            .append(id, EventKind::Verdict, serde_json::to_value(&verdict)?)?;
        submission.verdict = Some(verdict);

        self.step(id, STAGE_GRAPH)?;
        if let Err(e) = self.persist_graph(id, &submission).await {
            warn!(submission_id = %id, error = %e, "graph write failed, result not correlated");
            submission.degraded = true;
        }

        submission.status = SubmissionStatus::Complete;
        self.store.put(&submission).await?;

        // Cache the event sequence before the terminal event is appended;
        // a replay re-emits this sequence and appends its own `complete`.
        let sequence = self.events.events(id);
        if let Err(e) = self
            .cache
            .put(fingerprint, modality, &submission, &sequence, &input.preview())
            .await
        {
            warn!(submission_id = %id, error = %e, "cache write failed, result will be recomputed");
        }

        self.events
            .append(id, EventKind::Complete, json!({ "scan_id": id }))?;
        info!(submission_id = %id, degraded = submission.degraded, "submission complete");
        Ok(())
    }

    fn step(&self, id: &str, stage: &str) -> Result<u64> {
        self.events
            .append(id, EventKind::Step, json!({ "step": stage, "status": "running" }))
    }

    /// Extractor failure degrades to an empty entity list; the rest of
    /// the pipeline still runs.
    fn unwrap_entities(
        &self,
        id: &str,
        extracted: Result<Vec<ExtractedEntity>>,
        submission: &mut Submission,
    ) -> Vec<ExtractedEntity> {
        match extracted {
            Ok(entities) => entities,
            Err(e) => {
                warn!(submission_id = %id, error = %e, "entity extraction failed");
                submission.degraded = true;
                Vec::new()
            }
        }
    }

    async fn fan_out_reputation(
        &self,
        entities: &[ExtractedEntity],
    ) -> Vec<StageResult<ReputationReport>> {
        let Some(checker) = &self.collaborators.reputation else {
            return Vec::new();
        };
        let tasks = entities
            .iter()
            .filter(|e| e.label.is_researchable())
            .map(|entity| {
                let checker = Arc::clone(checker);
                async move {
                    match checker.check(&entity.text, entity.label).await {
                        Ok(report) => StageResult::Ok(report),
                        Err(e) => StageResult::failed_for(entity.text.clone(), e.to_string()),
                    }
                }
            });
        join_all(tasks).await
    }

    async fn fan_out_research(
        &self,
        entities: &[ExtractedEntity],
    ) -> Vec<StageResult<ResearchReport>> {
        let Some(researcher) = &self.collaborators.research else {
            return Vec::new();
        };
        let tasks = entities
            .iter()
            .filter(|e| e.label.is_researchable())
            .map(|entity| {
                let researcher = Arc::clone(researcher);
                async move {
                    match researcher.research(&entity.text, entity.label).await {
                        Ok(report) => StageResult::Ok(report),
                        Err(e) => StageResult::failed_for(entity.text.clone(), e.to_string()),
                    }
                }
            });
        join_all(tasks).await
    }

    /// Prefer the configured aggregator; fall back to the deterministic
    /// synthesizer when it is absent, errors, or returns a verdict with
    /// an out-of-range confidence.
    async fn resolve_verdict(&self, id: &str, signals: &VerdictSignals<'_>) -> Verdict {
        if let Some(aggregator) = &self.collaborators.aggregator {
            match aggregator.aggregate(signals).await {
                Ok(verdict) if is_well_formed(&verdict) => return verdict,
                Ok(_) => {
                    warn!(submission_id = %id, "aggregator verdict malformed, using fallback");
                }
                Err(e) => {
                    warn!(submission_id = %id, error = %e, "aggregator failed, using fallback");
                }
            }
        }
        synthesize_verdict(signals)
    }

    /// Report node, one entity node per extracted entity, and evidence
    /// for each source a successful reputation lookup cited.
    async fn persist_graph(&self, id: &str, submission: &Submission) -> Result<()> {
        let Some(verdict) = &submission.verdict else {
            return Ok(());
        };
        self.graph
            .create_report(&ReportRecord::from_verdict(id, submission.modality, verdict))
            .await?;

        for entity in &submission.entities {
            self.graph.add_entity(id, &entity.text, entity.label).await?;
        }

        for report in submission.reputation.iter().filter_map(StageResult::ok) {
            for source in &report.sources {
                let evidence = EvidenceRecord {
                    source_name: if source.title.is_empty() {
                        "Unknown".to_string()
                    } else {
                        source.title.clone()
                    },
                    url: source.url.clone(),
                    snippet: source.snippet.clone(),
                    found_by: "reputation".to_string(),
                };
                self.graph.add_evidence(id, &report.entity, &evidence).await?;
            }
        }
        Ok(())
    }
}
