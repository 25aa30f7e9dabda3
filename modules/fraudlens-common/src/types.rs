use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Submissions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Image,
    Voice,
    Text,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Voice => "voice",
            Modality::Text => "text",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Modality {
    type Err = crate::FraudLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Modality::Image),
            "voice" => Ok(Modality::Voice),
            "text" => Ok(Modality::Text),
            other => Err(crate::FraudLensError::Config(format!(
                "unknown modality: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Running,
    Complete,
}

/// Allocate a submission id in the `scan-<12 hex>` wire format.
pub fn new_submission_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("scan-{}", &hex[..12])
}

// --- Extracted entities ---

/// The closed label set the entity extractor is allowed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLabel {
    PhoneNumber,
    Url,
    CompanyName,
    DollarAmount,
    CaseNumber,
    PersonalInfoRequest,
    Deadline,
    GovernmentAgency,
    ThreatLanguage,
    EmailAddress,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::PhoneNumber => "phone_number",
            EntityLabel::Url => "url",
            EntityLabel::CompanyName => "company_name",
            EntityLabel::DollarAmount => "dollar_amount",
            EntityLabel::CaseNumber => "case_number",
            EntityLabel::PersonalInfoRequest => "personal_info_request",
            EntityLabel::Deadline => "deadline",
            EntityLabel::GovernmentAgency => "government_agency",
            EntityLabel::ThreatLanguage => "threat_language",
            EntityLabel::EmailAddress => "email_address",
        }
    }

    /// Labels worth a reputation lookup or deep research pass.
    pub fn is_researchable(&self) -> bool {
        matches!(
            self,
            EntityLabel::PhoneNumber
                | EntityLabel::Url
                | EntityLabel::CompanyName
                | EntityLabel::EmailAddress
        )
    }

    /// Human-readable form used in verdict flags ("threat language", not "threat_language").
    pub fn human(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub text: String,
    pub label: EntityLabel,
    #[serde(default)]
    pub score: f32,
}

impl ExtractedEntity {
    pub fn new(text: impl Into<String>, label: EntityLabel, score: f32) -> Self {
        Self {
            text: text.into(),
            label,
            score,
        }
    }
}

// --- Stage outcomes ---

/// Error half of a stage outcome. `entity` is set for per-entity sub-task
/// failures inside the fan-out stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

/// Outcome of one pipeline stage or sub-task. Serialized untagged so a failure
/// shows up on the wire as `{"error": ...}` next to successful payloads.
///
/// `Failed` is declared first: untagged deserialization tries variants in
/// order, and the `error` key must win before a defaulted success type can
/// swallow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageResult<T> {
    Failed(StageError),
    Ok(T),
}

impl<T> StageResult<T> {
    pub fn failed(error: impl Into<String>) -> Self {
        StageResult::Failed(StageError {
            error: error.into(),
            entity: None,
        })
    }

    pub fn failed_for(entity: impl Into<String>, error: impl Into<String>) -> Self {
        StageResult::Failed(StageError {
            error: error.into(),
            entity: Some(entity.into()),
        })
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            StageResult::Ok(v) => Some(v),
            StageResult::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed(_))
    }
}

impl<T> From<anyhow::Result<T>> for StageResult<T> {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(v) => StageResult::Ok(v),
            Err(e) => StageResult::failed(e.to_string()),
        }
    }
}

// --- Collaborator outputs ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualAnalysis {
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub urls_visible: Vec<String>,
    /// 0–100.
    #[serde(default)]
    pub scam_confidence: u8,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonated_brand: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionProfile {
    #[serde(default)]
    pub urgency: u8,
    #[serde(default)]
    pub fear: u8,
    #[serde(default)]
    pub authority: u8,
    #[serde(default)]
    pub friendliness: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceAnalysis {
    #[serde(default)]
    pub transcript: String,
    /// 0–100.
    #[serde(default)]
    pub fraud_score: u8,
    #[serde(default)]
    pub emotion_profile: EmotionProfile,
    #[serde(default)]
    pub pressure_tactics: Vec<String>,
    #[serde(default)]
    pub deepfake_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub predicted_class: String,
    pub confidence: f32,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            predicted_class: "unknown".to_string(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationReport {
    pub entity: String,
    pub entity_type: EntityLabel,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<EvidenceSource>,
}

/// Deep-research output. The record shape is collaborator-defined, so the
/// findings stay schema-light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub entity: String,
    pub entity_type: EntityLabel,
    pub findings: serde_json::Value,
}

// --- Verdict ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictLevel {
    #[serde(rename = "RED")]
    Red,
    #[serde(rename = "YELLOW")]
    Yellow,
    #[serde(rename = "GREEN")]
    Green,
}

impl VerdictLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictLevel::Red => "RED",
            VerdictLevel::Yellow => "YELLOW",
            VerdictLevel::Green => "GREEN",
        }
    }
}

impl std::fmt::Display for VerdictLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub level: VerdictLevel,
    /// 0.0–1.0.
    pub confidence: f32,
    pub explanation: String,
    #[serde(default = "default_scam_type")]
    pub scam_type: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub recommended_action: String,
    #[serde(default)]
    pub should_alert_family: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_by: Option<String>,
}

fn default_scam_type() -> String {
    "unknown".to_string()
}

// --- Submission record ---

/// Full state of one submission: per-stage outputs plus the final verdict.
/// Mutated only by the owning pipeline task; this is also the cached "result".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub modality: Modality,
    pub status: SubmissionStatus,
    /// Set the moment any stage fails. Not a terminal state of its own.
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<StageResult<VisualAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<StageResult<VoiceAnalysis>>,
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<StageResult<Classification>>,
    #[serde(default)]
    pub reputation: Vec<StageResult<ReputationReport>>,
    #[serde(default)]
    pub research: Vec<StageResult<ResearchReport>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn accepted(id: impl Into<String>, modality: Modality) -> Self {
        Self {
            id: id.into(),
            modality,
            status: SubmissionStatus::Submitted,
            degraded: false,
            visual: None,
            voice: None,
            entities: Vec::new(),
            classification: None,
            reputation: Vec::new(),
            research: Vec::new(),
            verdict: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_result_failure_serializes_with_error_key() {
        let r: StageResult<VisualAnalysis> = StageResult::failed("vision analyzer unavailable");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["error"], "vision analyzer unavailable");
        assert!(json.get("scam_confidence").is_none());
    }

    #[test]
    fn stage_result_round_trips_both_variants() {
        let ok: StageResult<ReputationReport> = StageResult::Ok(ReputationReport {
            entity: "+1-800-555-0199".into(),
            entity_type: EntityLabel::PhoneNumber,
            answer: "widely reported".into(),
            sources: vec![],
        });
        let failed: StageResult<ReputationReport> =
            StageResult::failed_for("+1-800-555-0199", "lookup timed out");

        for r in [ok, failed] {
            let json = serde_json::to_string(&r).unwrap();
            let back: StageResult<ReputationReport> = serde_json::from_str(&json).unwrap();
            assert_eq!(back, r);
        }
    }

    #[test]
    fn submission_id_format() {
        let id = new_submission_id();
        assert!(id.starts_with("scan-"));
        assert_eq!(id.len(), "scan-".len() + 12);
    }

    #[test]
    fn verdict_level_wire_names_are_uppercase() {
        assert_eq!(
            serde_json::to_value(VerdictLevel::Red).unwrap(),
            serde_json::json!("RED")
        );
        assert_eq!(VerdictLevel::Yellow.to_string(), "YELLOW");
    }
}
