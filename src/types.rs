//! Core data model for the digest pipeline.
//!
//! Everything here is pipeline-local and single-run: a batch of `RawReport`s
//! flows in, `AggregatedProjectView`s flow out, and nothing is shared across
//! runs. Enum fields always carry an explicit `unknown`/`uncertain` sentinel
//! so that normalization never has to invent a value it cannot justify.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Project name used when a report carries no explicit `[project]:` marker.
pub const GENERAL_PROJECT: &str = "general";

/// Placeholder risk line for entries whose analysis never materialized.
pub const ANALYSIS_UNAVAILABLE: &str = "analysis unavailable";

// ============================================================================
// Input
// ============================================================================

/// One author's raw status report, as supplied by the collection side.
///
/// `author` is an opaque identity string used only for grouping and display;
/// the pipeline never parses it beyond equality checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    pub author: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub date: String,
    pub body: String,
}

/// The portion of one report attributable to a single named project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSegment {
    pub project: String,
    pub text: String,
}

// ============================================================================
// Analysis record enums
// ============================================================================

/// Coarse lifecycle stage of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStage {
    Requirements,
    Design,
    Development,
    Integration,
    Testing,
    Acceptance,
    #[default]
    Unknown,
}

impl ProjectStage {
    /// Map free-form model output onto the enum; anything unrecognized
    /// stays `Unknown` rather than being guessed at.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "requirements" | "requirement" => ProjectStage::Requirements,
            "design" => ProjectStage::Design,
            "development" | "dev" | "implementation" => ProjectStage::Development,
            "integration" => ProjectStage::Integration,
            "testing" | "test" => ProjectStage::Testing,
            "acceptance" => ProjectStage::Acceptance,
            _ => ProjectStage::Unknown,
        }
    }
}

/// Reported workload level for one person or role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl LoadStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => LoadStatus::High,
            "medium" | "normal" => LoadStatus::Medium,
            "low" => LoadStatus::Low,
            _ => LoadStatus::Unknown,
        }
    }
}

/// Coarse categorical judgment of a project's situational risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "green" => HealthStatus::Green,
            "yellow" => HealthStatus::Yellow,
            "red" => HealthStatus::Red,
            _ => HealthStatus::Unknown,
        }
    }
}

/// Tri-state risk flag: the model may answer true, false, or "uncertain".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Yes,
    No,
    #[default]
    Uncertain,
}

impl Signal {
    /// Read a flag from arbitrary JSON. Booleans map directly, the literal
    /// string "uncertain" (or anything unrecognized, or absence) stays
    /// `Uncertain`.
    pub fn from_value(v: Option<&serde_json::Value>) -> Self {
        match v {
            Some(serde_json::Value::Bool(true)) => Signal::Yes,
            Some(serde_json::Value::Bool(false)) => Signal::No,
            Some(serde_json::Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => Signal::Yes,
                "false" | "no" => Signal::No,
                _ => Signal::Uncertain,
            },
            _ => Signal::Uncertain,
        }
    }
}

// ============================================================================
// Canonical analysis record
// ============================================================================

/// Work assignment and load for one person or role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersonnelEntry {
    #[serde(default)]
    pub work_type: String,
    #[serde(default)]
    pub load_status: LoadStatus,
}

/// The four fixed risk flags the analyst is asked to judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RiskSignals {
    #[serde(default)]
    pub fake_progress: Signal,
    #[serde(default)]
    pub delay_risk: Signal,
    #[serde(default)]
    pub requirement_unstable: Signal,
    #[serde(default)]
    pub external_block: Signal,
}

/// Sanity check of the author's stated short-term expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationCheck {
    #[serde(default = "default_true")]
    pub reasonable: bool,
    #[serde(default)]
    pub optimistic_bias: bool,
    #[serde(default)]
    pub missing_prerequisites: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ExpectationCheck {
    fn default() -> Self {
        Self {
            reasonable: true,
            optimistic_bias: false,
            missing_prerequisites: Vec::new(),
        }
    }
}

/// Canonical per-segment analysis record.
///
/// Every field has a defined default so that a partially-filled (or
/// truncation-repaired) response still normalizes into a complete record.
/// `personnel` is a `BTreeMap` so iteration order is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    #[serde(default)]
    pub project_stage: ProjectStage,
    #[serde(default)]
    pub key_events: Vec<String>,
    #[serde(default)]
    pub personnel: BTreeMap<String, PersonnelEntry>,
    #[serde(default)]
    pub role_gaps: Vec<String>,
    #[serde(default)]
    pub single_point_risk: bool,
    #[serde(default)]
    pub health_status: HealthStatus,
    #[serde(default)]
    pub risk_signals: RiskSignals,
    #[serde(default = "default_main_risk")]
    pub main_risk: String,
    #[serde(default)]
    pub expectation_check: ExpectationCheck,
}

fn default_main_risk() -> String {
    "none".to_string()
}

impl Default for AnalysisRecord {
    fn default() -> Self {
        Self {
            project_stage: ProjectStage::Unknown,
            key_events: Vec::new(),
            personnel: BTreeMap::new(),
            role_gaps: Vec::new(),
            single_point_risk: false,
            health_status: HealthStatus::Unknown,
            risk_signals: RiskSignals::default(),
            main_risk: default_main_risk(),
            expectation_check: ExpectationCheck::default(),
        }
    }
}

impl AnalysisRecord {
    /// Placeholder record for an entry whose analysis never materialized.
    /// Keeps the author visible in the aggregate without fabricating facts.
    pub fn unavailable() -> Self {
        Self {
            main_risk: ANALYSIS_UNAVAILABLE.to_string(),
            ..Self::default()
        }
    }
}

/// Shape of one normalized response, decided exactly once.
///
/// Multi-project responses arise when a single segment covered several
/// projects and the model keyed every top-level field by project name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedAnalysis {
    Single(AnalysisRecord),
    Multi(BTreeMap<String, AnalysisRecord>),
}

// ============================================================================
// Fallback tiers and aggregation views
// ============================================================================

/// Degradation tier a segment (or the whole run) ended in.
///
/// Ordered: escalation only ever moves toward `FullDump`, and a failure in
/// one author's segment never promotes the run past `SimpleSummary` for that
/// segment alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    /// Structured record produced from a clean parse.
    Normal,
    /// Structured record recovered via repair; rendered like Normal,
    /// surfaced as a diagnostic.
    Repaired,
    /// No structure recoverable; the raw service response stands in.
    RawPassthrough,
    /// Service unreachable or non-success status; an input excerpt stands in.
    SimpleSummary,
    /// Whole-run degradation: every raw report dumped verbatim.
    FullDump,
}

/// One author's contribution to a project view, tagged with the tier it
/// resolved at. Degraded tiers carry the stand-in text in `verbatim` next to
/// a placeholder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEntry {
    pub author: String,
    pub tier: FallbackTier,
    pub record: AnalysisRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbatim: Option<String>,
}

impl SegmentEntry {
    pub fn structured(author: &str, record: AnalysisRecord, repaired: bool) -> Self {
        Self {
            author: author.to_string(),
            tier: if repaired {
                FallbackTier::Repaired
            } else {
                FallbackTier::Normal
            },
            record,
            verbatim: None,
        }
    }

    pub fn raw_passthrough(author: &str, response_text: &str) -> Self {
        Self {
            author: author.to_string(),
            tier: FallbackTier::RawPassthrough,
            record: AnalysisRecord::unavailable(),
            verbatim: Some(response_text.to_string()),
        }
    }

    pub fn simple_summary(author: &str, excerpt: String) -> Self {
        Self {
            author: author.to_string(),
            tier: FallbackTier::SimpleSummary,
            record: AnalysisRecord::unavailable(),
            verbatim: Some(excerpt),
        }
    }
}

/// All authors' entries for one project, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedProjectView {
    pub project: String,
    pub entries: Vec<SegmentEntry>,
}

/// The two logical sections of the final output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinalReport {
    pub personal: String,
    pub team: String,
}

impl FinalReport {
    /// Concatenate the sections with blank-line separation. Both sections
    /// empty means the fixed no-content sentinel.
    pub fn into_text(self) -> String {
        match (self.personal.is_empty(), self.team.is_empty()) {
            (true, true) => crate::digest::render::NO_CONTENT_SENTINEL.to_string(),
            (false, true) => self.personal,
            (true, false) => self.team,
            (false, false) => format!("{}\n\n{}", self.personal, self.team),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parse_unrecognized_is_unknown() {
        assert_eq!(ProjectStage::parse("shipping it"), ProjectStage::Unknown);
        assert_eq!(ProjectStage::parse("Development"), ProjectStage::Development);
        assert_eq!(ProjectStage::parse(" testing "), ProjectStage::Testing);
    }

    #[test]
    fn test_signal_from_value() {
        use serde_json::json;
        assert_eq!(Signal::from_value(Some(&json!(true))), Signal::Yes);
        assert_eq!(Signal::from_value(Some(&json!(false))), Signal::No);
        assert_eq!(Signal::from_value(Some(&json!("uncertain"))), Signal::Uncertain);
        assert_eq!(Signal::from_value(Some(&json!("true"))), Signal::Yes);
        assert_eq!(Signal::from_value(Some(&json!(42))), Signal::Uncertain);
        assert_eq!(Signal::from_value(None), Signal::Uncertain);
    }

    #[test]
    fn test_analysis_record_defaults() {
        let rec = AnalysisRecord::default();
        assert_eq!(rec.project_stage, ProjectStage::Unknown);
        assert_eq!(rec.health_status, HealthStatus::Unknown);
        assert!(!rec.single_point_risk);
        assert_eq!(rec.main_risk, "none");
        assert!(rec.expectation_check.reasonable);
        assert_eq!(rec.risk_signals.delay_risk, Signal::Uncertain);
    }

    #[test]
    fn test_record_deserializes_with_all_fields_missing() {
        let rec: AnalysisRecord = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(rec, AnalysisRecord::default());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(FallbackTier::Normal < FallbackTier::Repaired);
        assert!(FallbackTier::Repaired < FallbackTier::RawPassthrough);
        assert!(FallbackTier::RawPassthrough < FallbackTier::SimpleSummary);
        assert!(FallbackTier::SimpleSummary < FallbackTier::FullDump);
    }
}
