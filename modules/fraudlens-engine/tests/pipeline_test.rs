//! End-to-end pipeline tests against in-memory backends.

use std::sync::Arc;

use fraudlens_cache::ResultCache;
use fraudlens_common::types::{
    EntityLabel, ExtractedEntity, Modality, SubmissionStatus, VerdictLevel, VisualAnalysis,
    VoiceAnalysis,
};
use fraudlens_engine::testing::{
    FailingVision, MalformedAggregator, MockExtractor, MockReputation, MockResearcher, MockVision,
    MockVoice,
};
use fraudlens_engine::{Collaborators, Engine, MediaPayload, MemoryStore, SubmissionInput};
use fraudlens_events::{EventKind, EventRecord};
use fraudlens_graph::MemoryGraph;
use futures::StreamExt;

async fn engine_with(collaborators: Collaborators) -> Engine {
    let cache = ResultCache::in_memory().await.unwrap();
    Engine::new(
        collaborators,
        Arc::new(MemoryGraph::new()),
        cache,
        Arc::new(MemoryStore::default()),
    )
}

/// Drain the submission's event stream; it ends at the terminal event.
async fn collect_events(engine: &Engine, submission_id: &str) -> Vec<EventRecord> {
    engine.stream_events(submission_id).collect().await
}

fn kinds(events: &[EventRecord]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

fn phone_entity() -> ExtractedEntity {
    ExtractedEntity::new("555-123-4567", EntityLabel::PhoneNumber, 0.9)
}

#[tokio::test]
async fn text_submission_runs_every_stage_in_order() {
    let extractor = Arc::new(
        MockExtractor::new(vec![
            ExtractedEntity::new("account will be closed", EntityLabel::ThreatLanguage, 0.9),
            phone_entity(),
        ])
        .with_classification("irs_government_scam", 0.8),
    );
    let reputation = Arc::new(MockReputation::new(
        "This number has been reported as a scam.",
    ));
    let researcher = Arc::new(MockResearcher::new());
    let engine = engine_with(
        Collaborators::new(extractor.clone())
            .with_reputation(reputation.clone())
            .with_research(researcher.clone()),
    )
    .await;

    let id = engine
        .submit(SubmissionInput::Text(
            "This is the IRS. Call 555-123-4567 or your account will be closed.".into(),
        ))
        .await
        .unwrap();
    let events = collect_events(&engine, &id).await;

    assert_eq!(
        kinds(&events),
        vec![
            EventKind::ScanStarted,
            EventKind::Step,
            EventKind::EntitiesComplete,
            EventKind::Step,
            EventKind::ReputationComplete,
            EventKind::Step,
            EventKind::ResearchComplete,
            EventKind::Step,
            EventKind::Verdict,
            EventKind::Step,
            EventKind::Complete,
        ]
    );
    assert!(events.iter().zip(events.iter().skip(1)).all(|(a, b)| a.seq < b.seq));

    // Only the phone number is researchable; threat language is not.
    assert_eq!(reputation.calls(), 1);
    assert_eq!(researcher.calls(), 1);

    let result = engine.result(&id).await.unwrap().unwrap();
    assert_eq!(result.status, SubmissionStatus::Complete);
    assert!(!result.degraded);
    assert_eq!(result.entities.len(), 2);

    // threat 20 + phone 5 + reputation hit 15 = 40.
    let verdict = result.verdict.unwrap();
    assert_eq!(verdict.level, VerdictLevel::Yellow);
    assert_eq!(verdict.confidence, 0.40);
    assert!(verdict
        .red_flags
        .contains(&"555-123-4567 found in scam reports".to_string()));

    // The graph holds the report and both entities.
    let view = engine.scan_graph(&id).await.unwrap().unwrap();
    assert!(view.nodes.iter().any(|n| n.id == id));
    assert!(view.nodes.iter().any(|n| n.label == "555-123-4567"));
}

#[tokio::test]
async fn identical_content_replays_from_cache_without_collaborators() {
    let extractor = Arc::new(MockExtractor::new(vec![phone_entity()]));
    let reputation = Arc::new(MockReputation::new("No complaints on record."));
    let engine = engine_with(
        Collaborators::new(extractor.clone()).with_reputation(reputation.clone()),
    )
    .await;

    let first_id = engine
        .submit(SubmissionInput::Text("Call me at 555-123-4567".into()))
        .await
        .unwrap();
    let first_events = collect_events(&engine, &first_id).await;
    assert_eq!(extractor.calls(), 1);

    // Same content after normalization (trim + lowercase).
    let second_id = engine
        .submit(SubmissionInput::Text("  CALL ME AT 555-123-4567  ".into()))
        .await
        .unwrap();
    assert_ne!(first_id, second_id);
    let second_events = collect_events(&engine, &second_id).await;

    // No collaborator ran again.
    assert_eq!(extractor.calls(), 1);
    assert_eq!(reputation.calls(), 1);

    // The replay mirrors the original progression, event for event.
    assert_eq!(kinds(&first_events), kinds(&second_events));
    let verdict_of = |events: &[EventRecord]| {
        events
            .iter()
            .find(|e| e.kind == EventKind::Verdict)
            .map(|e| e.payload.clone())
            .unwrap()
    };
    assert_eq!(verdict_of(&first_events), verdict_of(&second_events));

    let terminal = second_events.last().unwrap();
    assert_eq!(terminal.payload["cached"], serde_json::json!(true));
    assert_eq!(terminal.payload["scan_id"], serde_json::json!(&second_id));

    let result = engine.result(&second_id).await.unwrap().unwrap();
    assert_eq!(result.status, SubmissionStatus::Complete);
    assert_eq!(result.id, second_id);

    // The replayed submission carries its own acceptance time, so it
    // lists ahead of the run it was copied from.
    let first = engine.result(&first_id).await.unwrap().unwrap();
    assert!(result.created_at > first.created_at);

    let stats = engine.cache_stats().await.unwrap();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.total_hits, 1);

    assert_eq!(engine.cache_clear().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_vision_collaborator_degrades_but_completes() {
    let engine = engine_with(Collaborators::new(Arc::new(MockExtractor::new(vec![])))).await;

    let id = engine
        .submit(SubmissionInput::Image(MediaPayload::Bytes {
            data: vec![0x89, 0x50, 0x4e, 0x47],
            filename: Some("letter.png".into()),
        }))
        .await
        .unwrap();
    let events = collect_events(&engine, &id).await;

    let vision = events
        .iter()
        .find(|e| e.kind == EventKind::VisionComplete)
        .unwrap();
    assert_eq!(
        vision.payload["visual"]["error"],
        serde_json::json!("Collaborator unavailable: vision analyzer")
    );
    assert_eq!(events.last().unwrap().kind, EventKind::Complete);

    let result = engine.result(&id).await.unwrap().unwrap();
    assert_eq!(result.status, SubmissionStatus::Complete);
    assert_eq!(result.modality, Modality::Image);
    assert!(result.degraded);
    assert_eq!(result.verdict.unwrap().level, VerdictLevel::Green);
}

#[tokio::test]
async fn vision_failure_is_isolated_at_the_stage_boundary() {
    let extractor = Arc::new(MockExtractor::new(vec![]));
    let engine = engine_with(
        Collaborators::new(extractor.clone()).with_vision(Arc::new(FailingVision)),
    )
    .await;

    let id = engine
        .submit(SubmissionInput::Image(MediaPayload::Url(
            "https://img.example/screenshot.png".into(),
        )))
        .await
        .unwrap();
    let events = collect_events(&engine, &id).await;

    let vision = events
        .iter()
        .find(|e| e.kind == EventKind::VisionComplete)
        .unwrap();
    assert_eq!(
        vision.payload["visual"]["error"],
        serde_json::json!("vision service unavailable")
    );
    assert_eq!(events.last().unwrap().kind, EventKind::Complete);

    // Extraction still ran, on the empty text the failed stage left.
    assert_eq!(extractor.calls(), 1);

    let result = engine.result(&id).await.unwrap().unwrap();
    assert_eq!(result.status, SubmissionStatus::Complete);
    assert!(result.degraded);
    assert_eq!(result.verdict.unwrap().level, VerdictLevel::Green);
}

#[tokio::test]
async fn visual_analysis_feeds_extraction_and_scoring() {
    let vision = Arc::new(MockVision::new(VisualAnalysis {
        text_content: "Final notice from the IRS, call 555-123-4567".into(),
        scam_confidence: 80,
        red_flags: vec!["impersonates a government agency".into()],
        ..Default::default()
    }));
    let extractor = Arc::new(MockExtractor::new(vec![phone_entity()]));
    let engine =
        engine_with(Collaborators::new(extractor).with_vision(vision.clone())).await;

    let id = engine
        .submit(SubmissionInput::Image(MediaPayload::Bytes {
            data: vec![0x89, 0x50, 0x4e, 0x47],
            filename: Some("notice.png".into()),
        }))
        .await
        .unwrap();
    collect_events(&engine, &id).await;
    assert_eq!(vision.calls(), 1);

    let result = engine.result(&id).await.unwrap().unwrap();
    assert!(!result.degraded);

    // High visual confidence 40 + phone 5.
    let verdict = result.verdict.unwrap();
    assert_eq!(verdict.level, VerdictLevel::Yellow);
    assert_eq!(verdict.confidence, 0.45);
    assert!(verdict
        .red_flags
        .contains(&"impersonates a government agency".to_string()));
}

#[tokio::test]
async fn voice_analysis_feeds_extraction_and_scoring() {
    let voice = Arc::new(MockVoice::new(VoiceAnalysis {
        transcript: "call back immediately at 555-123-4567".into(),
        fraud_score: 75,
        pressure_tactics: vec!["urgency".into()],
        ..Default::default()
    }));
    let extractor = Arc::new(MockExtractor::new(vec![phone_entity()]));
    let engine = engine_with(Collaborators::new(extractor).with_voice(voice.clone())).await;

    let id = engine
        .submit(SubmissionInput::Voice(MediaPayload::Bytes {
            data: vec![0x52, 0x49, 0x46, 0x46],
            filename: Some("voicemail.wav".into()),
        }))
        .await
        .unwrap();
    let events = collect_events(&engine, &id).await;
    assert_eq!(voice.calls(), 1);
    assert!(events.iter().any(|e| e.kind == EventKind::VoiceComplete));

    let result = engine.result(&id).await.unwrap().unwrap();
    assert_eq!(result.modality, Modality::Voice);

    // High fraud score 40 + phone 5, with pressure tactics as flags.
    let verdict = result.verdict.unwrap();
    assert_eq!(verdict.level, VerdictLevel::Yellow);
    assert_eq!(verdict.confidence, 0.45);
    assert!(verdict.red_flags.contains(&"urgency".to_string()));
}

#[tokio::test]
async fn reputation_failure_for_one_entity_does_not_abort_the_batch() {
    let extractor = Arc::new(MockExtractor::new(vec![
        phone_entity(),
        ExtractedEntity::new("https://bad.example", EntityLabel::Url, 0.9),
    ]));
    let reputation =
        Arc::new(MockReputation::new("Reported as fraud.").failing_for("https://bad.example"));
    let engine =
        engine_with(Collaborators::new(extractor).with_reputation(reputation)).await;

    let id = engine
        .submit(SubmissionInput::Text("call 555-123-4567, https://bad.example".into()))
        .await
        .unwrap();
    collect_events(&engine, &id).await;

    let result = engine.result(&id).await.unwrap().unwrap();
    assert_eq!(result.reputation.len(), 2);
    assert!(result.reputation[0].ok().is_some());
    assert!(result.reputation[1].is_failed());
    assert!(result.degraded);
    assert_eq!(result.status, SubmissionStatus::Complete);

    // The successful lookup still feeds the verdict: phone 5 + url 5 + 15.
    assert_eq!(result.verdict.unwrap().confidence, 0.25);
}

#[tokio::test]
async fn malformed_aggregator_verdict_falls_back_to_synthesizer() {
    let extractor = Arc::new(MockExtractor::new(vec![ExtractedEntity::new(
        "wire $2,000 today",
        EntityLabel::ThreatLanguage,
        0.9,
    )]));
    let engine = engine_with(
        Collaborators::new(extractor).with_aggregator(Arc::new(MalformedAggregator)),
    )
    .await;

    let id = engine
        .submit(SubmissionInput::Text("wire $2,000 today or else".into()))
        .await
        .unwrap();
    collect_events(&engine, &id).await;

    let verdict = engine.result(&id).await.unwrap().unwrap().verdict.unwrap();
    assert_eq!(verdict.analyzed_by.as_deref(), Some("rule-based-fallback"));
    assert!((0.0..=1.0).contains(&verdict.confidence));
}

#[tokio::test]
async fn unknown_submission_id_yields_none() {
    let engine = engine_with(Collaborators::fallback_only()).await;
    assert!(engine.result("scan-doesnotexist").await.unwrap().is_none());
}

#[tokio::test]
async fn repeated_entities_across_submissions_surface_as_threats() {
    // The extractor reports the same phone number for every text, so
    // two distinct submissions corroborate one entity.
    let extractor = Arc::new(MockExtractor::new(vec![phone_entity()]));
    let engine = engine_with(Collaborators::new(extractor)).await;

    for text in ["first report text", "second, different report"] {
        let id = engine
            .submit(SubmissionInput::Text(text.into()))
            .await
            .unwrap();
        collect_events(&engine, &id).await;
    }

    let threats = engine.recent_threats(10).await.unwrap();
    assert_eq!(threats.len(), 1);
    assert_eq!(threats[0].entity, "555-123-4567");
    assert_eq!(threats[0].reports, 2);

    let network = engine.entity_network("555-123-4567").await.unwrap();
    assert_eq!(network.total_reports, 2);

    let listed = engine.list_submissions(10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed
        .iter()
        .all(|s| s.status == SubmissionStatus::Complete));
}
