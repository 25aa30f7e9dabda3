//! Deterministic verdict synthesis.
//!
//! Combines whatever stage outputs a submission produced into a final
//! RED/YELLOW/GREEN verdict using a fixed scoring table. The function is
//! pure: the same signals always produce the same verdict, so a cached
//! replay and a fresh run of identical input agree.

use fraudlens_common::types::{
    Classification, ExtractedEntity, ReputationReport, ResearchReport, StageResult, Verdict,
    VerdictLevel, VisualAnalysis, VoiceAnalysis,
};

/// Everything the synthesizer (or a model-backed aggregator) may draw on.
/// Any subset may be present; missing signals simply contribute nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerdictSignals<'a> {
    pub visual: Option<&'a VisualAnalysis>,
    pub voice: Option<&'a VoiceAnalysis>,
    pub entities: &'a [ExtractedEntity],
    pub classification: Option<&'a Classification>,
    pub reputation: &'a [StageResult<ReputationReport>],
    pub research: &'a [StageResult<ResearchReport>],
}

const MAX_FLAGS: usize = 10;

fn entity_weight(label: &str) -> u32 {
    match label {
        "threat_language" => 20,
        "personal_info_request" => 15,
        "deadline" | "dollar_amount" | "government_agency" | "case_number" => 10,
        "phone_number" | "url" => 5,
        _ => 0,
    }
}

fn level_for(score: u32) -> VerdictLevel {
    if score >= 50 {
        VerdictLevel::Red
    } else if score >= 25 {
        VerdictLevel::Yellow
    } else {
        VerdictLevel::Green
    }
}

/// Fold the available signals into a verdict.
///
/// Error-tagged reputation and research entries are skipped; they carry
/// no signal, only the record that a sub-task failed.
pub fn synthesize_verdict(signals: &VerdictSignals<'_>) -> Verdict {
    let mut score: u32 = 0;
    let mut flags: Vec<String> = Vec::new();

    if let Some(visual) = signals.visual {
        if visual.scam_confidence > 70 {
            score += 40;
            flags.extend(visual.red_flags.iter().cloned());
        } else if visual.scam_confidence > 40 {
            score += 20;
        }
    }

    if let Some(voice) = signals.voice {
        if voice.fraud_score > 70 {
            score += 40;
            flags.extend(voice.pressure_tactics.iter().cloned());
        } else if voice.fraud_score > 40 {
            score += 20;
        }
    }

    for entity in signals.entities {
        let weight = entity_weight(entity.label.as_str());
        if weight > 0 {
            score += weight;
            flags.push(format!("Suspicious {}: {}", entity.label.human(), entity.text));
        }
    }

    for report in signals.reputation.iter().filter_map(StageResult::ok) {
        let answer = report.answer.to_lowercase();
        if answer.contains("scam") || answer.contains("fraud") || answer.contains("reported") {
            score += 15;
            flags.push(format!("{} found in scam reports", report.entity));
        }
    }

    let score = score.min(100);
    let level = level_for(score);
    let confidence = score as f32 / 100.0;

    let explanation = match level {
        VerdictLevel::Red => format!(
            "This looks very suspicious. We found {} warning signs including threat language, \
             suspicious links, and urgent deadlines. Do not respond or click any links.",
            flags.len()
        ),
        VerdictLevel::Yellow => format!(
            "This seems suspicious. We found {} possible warning signs. Be cautious and verify \
             with a trusted source before taking any action.",
            flags.len()
        ),
        VerdictLevel::Green => "We did not find strong indicators that this is a scam, but \
             always be careful with unexpected messages."
            .to_string(),
    };

    flags.truncate(MAX_FLAGS);

    Verdict {
        level,
        confidence,
        explanation,
        scam_type: "unknown".to_string(),
        red_flags: flags,
        recommended_action: if level == VerdictLevel::Red {
            "Do not respond or click any links. Call a trusted family member.".to_string()
        } else {
            "Verify with a trusted source before acting.".to_string()
        },
        should_alert_family: level == VerdictLevel::Red,
        analyzed_by: Some("rule-based-fallback".to_string()),
    }
}

/// An aggregator verdict is usable only if its confidence is a sane
/// probability and it actually explains itself.
pub(crate) fn is_well_formed(verdict: &Verdict) -> bool {
    (0.0..=1.0).contains(&verdict.confidence) && !verdict.explanation.is_empty()
}
