//! Response normalization.
//!
//! Maps a recovered JSON object onto the canonical `AnalysisRecord`,
//! supplying the documented default for every absent field. The
//! single-project vs multi-project shape decision happens exactly once,
//! here, producing the `NormalizedAnalysis` union — downstream code matches
//! on the variant instead of re-inspecting shapes.
//!
//! Missing data never raises. The only errors are a non-object input
//! (`MalformedOutput` — repair handed us something unusable) and a
//! multi-project object whose present sub-fields are not per-project
//! mappings (`Aggregation`).

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::DigestError;
use crate::types::{
    AnalysisRecord, ExpectationCheck, HealthStatus, LoadStatus, NormalizedAnalysis,
    PersonnelEntry, ProjectStage, RiskSignals, Signal,
};

/// Top-level keys of the expected response shape. Anything else is ignored.
const KNOWN_KEYS: &[&str] = &[
    "project_stage",
    "key_events",
    "personnel",
    "role_gaps",
    "single_point_risk",
    "health_status",
    "risk_signals",
    "main_risk",
    "tomorrow_expectation_check",
];

/// Normalize one recovered object into the canonical record shape.
pub fn normalize(value: &Value) -> Result<NormalizedAnalysis, DigestError> {
    let obj = value.as_object().ok_or(DigestError::MalformedOutput)?;

    // Multi-project shape: the stage field is itself keyed by project name.
    let multi = obj
        .get("project_stage")
        .map(|v| v.is_object())
        .unwrap_or(false);

    if !multi {
        return Ok(NormalizedAnalysis::Single(normalize_single(obj)));
    }

    // Every present known field must mirror the per-project mapping shape.
    for key in KNOWN_KEYS {
        if let Some(field) = obj.get(*key) {
            if !field.is_object() {
                return Err(DigestError::Aggregation(format!(
                    "multi-project response has non-mapping field '{}'",
                    key
                )));
            }
        }
    }

    let projects = obj
        .get("project_stage")
        .and_then(|v| v.as_object())
        .expect("checked above");

    let mut records: BTreeMap<String, AnalysisRecord> = BTreeMap::new();
    for project in projects.keys() {
        let mut per_project = Map::new();
        for key in KNOWN_KEYS {
            if let Some(field) = obj.get(*key).and_then(|v| v.as_object()) {
                if let Some(inner) = field.get(project) {
                    per_project.insert((*key).to_string(), inner.clone());
                }
            }
        }
        records.insert(project.clone(), normalize_single(&per_project));
    }
    Ok(NormalizedAnalysis::Multi(records))
}

/// Build a record from a single-project-shaped object. Total: every missing
/// or mistyped field collapses to its documented default.
fn normalize_single(obj: &Map<String, Value>) -> AnalysisRecord {
    AnalysisRecord {
        project_stage: obj
            .get("project_stage")
            .and_then(|v| v.as_str())
            .map(ProjectStage::parse)
            .unwrap_or_default(),
        key_events: string_list(obj.get("key_events")),
        personnel: personnel_map(obj.get("personnel")),
        role_gaps: string_list(obj.get("role_gaps")),
        single_point_risk: lenient_bool(obj.get("single_point_risk")).unwrap_or(false),
        health_status: obj
            .get("health_status")
            .and_then(|v| v.as_str())
            .map(HealthStatus::parse)
            .unwrap_or_default(),
        risk_signals: risk_signals(obj.get("risk_signals")),
        main_risk: main_risk(obj.get("main_risk")),
        expectation_check: expectation_check(obj.get("tomorrow_expectation_check")),
    }
}

/// Strings pass through; stray scalars are stringified; structures are
/// dropped rather than guessed at.
fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn personnel_map(value: Option<&Value>) -> BTreeMap<String, PersonnelEntry> {
    let mut out = BTreeMap::new();
    let Some(map) = value.and_then(|v| v.as_object()) else {
        return out;
    };
    for (name, entry) in map {
        match entry {
            Value::Object(fields) => {
                out.insert(
                    name.clone(),
                    PersonnelEntry {
                        work_type: fields
                            .get("work_type")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        load_status: fields
                            .get("load_status")
                            .and_then(|v| v.as_str())
                            .map(LoadStatus::parse)
                            .unwrap_or_default(),
                    },
                );
            }
            // Bare string: treat it as the work description.
            Value::String(s) => {
                out.insert(
                    name.clone(),
                    PersonnelEntry {
                        work_type: s.clone(),
                        load_status: LoadStatus::Unknown,
                    },
                );
            }
            _ => {}
        }
    }
    out
}

fn risk_signals(value: Option<&Value>) -> RiskSignals {
    let Some(map) = value.and_then(|v| v.as_object()) else {
        return RiskSignals::default();
    };
    RiskSignals {
        fake_progress: Signal::from_value(map.get("fake_progress")),
        delay_risk: Signal::from_value(map.get("delay_risk")),
        requirement_unstable: Signal::from_value(map.get("requirement_unstable")),
        external_block: Signal::from_value(map.get("external_block")),
    }
}

fn main_risk(value: Option<&Value>) -> String {
    let text = value.and_then(|v| v.as_str()).unwrap_or("").trim();
    if text.is_empty() {
        "none".to_string()
    } else {
        text.to_string()
    }
}

fn expectation_check(value: Option<&Value>) -> ExpectationCheck {
    let Some(map) = value.and_then(|v| v.as_object()) else {
        return ExpectationCheck::default();
    };
    ExpectationCheck {
        reasonable: lenient_bool(map.get("reasonable")).unwrap_or(true),
        optimistic_bias: lenient_bool(map.get("optimistic_bias")).unwrap_or(false),
        missing_prerequisites: string_list(map.get("missing_prerequisites")),
    }
}

fn lenient_bool(value: Option<&Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_object_yields_pure_defaults() {
        let normalized = normalize(&json!({})).expect("normalize");
        match normalized {
            NormalizedAnalysis::Single(rec) => assert_eq!(rec, AnalysisRecord::default()),
            _ => panic!("expected single shape"),
        }
    }

    #[test]
    fn test_full_single_object() {
        let value = json!({
            "project_stage": "development",
            "key_events": ["progress: importer shipped", "blocker: staging down"],
            "personnel": {"alice": {"work_type": "importer", "load_status": "high"}},
            "role_gaps": ["qa"],
            "single_point_risk": true,
            "health_status": "yellow",
            "risk_signals": {
                "fake_progress": false,
                "delay_risk": true,
                "requirement_unstable": "uncertain",
                "external_block": false
            },
            "main_risk": "staging environment instability",
            "tomorrow_expectation_check": {
                "reasonable": false,
                "optimistic_bias": true,
                "missing_prerequisites": ["staging access"]
            }
        });
        let NormalizedAnalysis::Single(rec) = normalize(&value).expect("normalize") else {
            panic!("expected single shape");
        };
        assert_eq!(rec.project_stage, ProjectStage::Development);
        assert_eq!(rec.key_events.len(), 2);
        assert_eq!(rec.personnel["alice"].load_status, LoadStatus::High);
        assert_eq!(rec.role_gaps, vec!["qa".to_string()]);
        assert!(rec.single_point_risk);
        assert_eq!(rec.health_status, HealthStatus::Yellow);
        assert_eq!(rec.risk_signals.delay_risk, Signal::Yes);
        assert_eq!(rec.risk_signals.requirement_unstable, Signal::Uncertain);
        assert_eq!(rec.main_risk, "staging environment instability");
        assert!(!rec.expectation_check.reasonable);
        assert_eq!(rec.expectation_check.missing_prerequisites, vec!["staging access".to_string()]);
    }

    #[test]
    fn test_empty_main_risk_becomes_none() {
        let NormalizedAnalysis::Single(rec) =
            normalize(&json!({"main_risk": "  "})).expect("normalize")
        else {
            panic!("expected single shape");
        };
        assert_eq!(rec.main_risk, "none");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let value = json!({"health_status": "green", "confidence": 0.93, "notes": ["x"]});
        let NormalizedAnalysis::Single(rec) = normalize(&value).expect("normalize") else {
            panic!("expected single shape");
        };
        assert_eq!(rec.health_status, HealthStatus::Green);
    }

    #[test]
    fn test_mistyped_fields_fall_to_defaults() {
        let value = json!({
            "key_events": "not a list",
            "personnel": 42,
            "single_point_risk": "maybe",
            "health_status": 7
        });
        let NormalizedAnalysis::Single(rec) = normalize(&value).expect("normalize") else {
            panic!("expected single shape");
        };
        assert!(rec.key_events.is_empty());
        assert!(rec.personnel.is_empty());
        assert!(!rec.single_point_risk);
        assert_eq!(rec.health_status, HealthStatus::Unknown);
    }

    #[test]
    fn test_multi_project_shape() {
        let value = json!({
            "project_stage": {"P1": "testing", "P2": "design"},
            "health_status": {"P1": "green", "P2": "red"},
            "main_risk": {"P1": "", "P2": "vendor API unstable"}
        });
        let NormalizedAnalysis::Multi(records) = normalize(&value).expect("normalize") else {
            panic!("expected multi shape");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records["P1"].project_stage, ProjectStage::Testing);
        assert_eq!(records["P1"].health_status, HealthStatus::Green);
        assert_eq!(records["P1"].main_risk, "none");
        assert_eq!(records["P2"].health_status, HealthStatus::Red);
        assert_eq!(records["P2"].main_risk, "vendor API unstable");
        // Fields absent for a project fall to defaults.
        assert!(records["P2"].key_events.is_empty());
    }

    #[test]
    fn test_multi_with_non_mapping_field_is_aggregation_error() {
        let value = json!({
            "project_stage": {"P1": "testing"},
            "key_events": ["progress: not per-project"]
        });
        let err = normalize(&value).unwrap_err();
        assert!(matches!(err, DigestError::Aggregation(_)));
    }

    #[test]
    fn test_non_object_is_malformed() {
        assert!(matches!(
            normalize(&json!([1, 2, 3])).unwrap_err(),
            DigestError::MalformedOutput
        ));
        assert!(matches!(
            normalize(&json!("text")).unwrap_err(),
            DigestError::MalformedOutput
        ));
    }

    #[test]
    fn test_personnel_bare_string_entry() {
        let value = json!({"personnel": {"bob": "code review"}});
        let NormalizedAnalysis::Single(rec) = normalize(&value).expect("normalize") else {
            panic!("expected single shape");
        };
        assert_eq!(rec.personnel["bob"].work_type, "code review");
        assert_eq!(rec.personnel["bob"].load_status, LoadStatus::Unknown);
    }
}
