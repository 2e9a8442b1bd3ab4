//! Structured-output recovery.
//!
//! The reasoning service is adversarial with respect to structure: it may
//! wrap the JSON object in explanatory prose or markdown fences, or hit an
//! output-length ceiling mid-object. Recovery tries, in order:
//!
//! 1. parse the whole text;
//! 2. parse the first-`{`-to-last-`}` substring;
//! 3. truncation repair — a bracket/quote-aware scan that synthesizes the
//!    missing closing tokens (dropping an incomplete trailing entry first
//!    if needed);
//! 4. parse the interior of a ```json fenced block;
//! 5. give up with `MalformedOutput`.
//!
//! Repair only ever closes structure. It never adds field values, so a
//! recovered object contains nothing the service did not say.

use serde_json::Value;

use crate::error::DigestError;

/// A recovered object plus a diagnostic flag: `repaired` is set whenever
/// anything beyond a clean whole-text parse was needed.
#[derive(Debug, Clone)]
pub struct Recovered {
    pub value: Value,
    pub repaired: bool,
}

/// Extract one JSON object from a raw response blob.
pub fn recover_object(raw: &str) -> Result<Recovered, DigestError> {
    let trimmed = raw.trim();

    // 1. The happy path: the whole text is the object.
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Ok(Recovered {
                value,
                repaired: false,
            });
        }
    }

    // 2. Prose wrapper: take the outermost brace span.
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if value.is_object() {
                    return Ok(Recovered {
                        value,
                        repaired: true,
                    });
                }
            }
        }
    }

    // 3. Truncation: scan from the first brace and close what's open.
    if let Some(start) = trimmed.find('{') {
        if let Some(fixed) = repair_truncated(&trimmed[start..]) {
            if let Ok(value) = serde_json::from_str::<Value>(&fixed) {
                if value.is_object() {
                    return Ok(Recovered {
                        value,
                        repaired: true,
                    });
                }
            }
        }
    }

    // 4. Fenced block labeled as structured data.
    if let Some(interior) = fenced_json_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(interior.trim()) {
            if value.is_object() {
                return Ok(Recovered {
                    value,
                    repaired: true,
                });
            }
        }
    }

    Err(DigestError::MalformedOutput)
}

/// Close an object that was cut off mid-output.
///
/// Explicit finite-state scan — outside-string / inside-string /
/// escape-pending — with a stack of expected closing tokens. Two attempts:
/// append the missing closers to the fragment as-is, and if that does not
/// parse, drop the trailing incomplete entry back to the last complete,
/// comma-terminated one and close from that point's stack snapshot.
/// Returns a candidate string; the caller decides whether it parses.
fn repair_truncated(fragment: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_pending = false;
    // Byte offsets of commas at structural level, with the stack at that point.
    let mut cut_points: Vec<(usize, Vec<char>)> = Vec::new();

    for (i, ch) in fragment.char_indices() {
        if in_string {
            if escape_pending {
                escape_pending = false;
            } else if ch == '\\' {
                escape_pending = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                // A mismatched closer means this is not salvageable truncation.
                if stack.pop() != Some(ch) {
                    return None;
                }
            }
            ',' => cut_points.push((i, stack.clone())),
            _ => {}
        }
    }

    if stack.is_empty() {
        // Nothing open — the fragment was complete and simply failed to
        // parse for some other reason.
        return None;
    }

    // Attempt 1: the fragment ends on a complete token; just close it.
    if !in_string {
        let mut candidate = String::with_capacity(fragment.len() + stack.len());
        candidate.push_str(fragment);
        for closer in stack.iter().rev() {
            candidate.push(*closer);
        }
        if serde_json::from_str::<Value>(&candidate).is_ok() {
            return Some(candidate);
        }
    }

    // Attempt 2: drop the trailing fragment back to the last complete,
    // comma-terminated entry, then close from that point's snapshot.
    for (idx, snapshot) in cut_points.iter().rev() {
        let mut candidate = String::with_capacity(idx + snapshot.len());
        candidate.push_str(&fragment[..*idx]);
        for closer in snapshot.iter().rev() {
            candidate.push(*closer);
        }
        if serde_json::from_str::<Value>(&candidate).is_ok() {
            return Some(candidate);
        }
    }

    None
}

/// Interior of the first ```json fenced block, if any. Tolerates a missing
/// closing fence (the block runs to end of text).
fn fenced_json_block(text: &str) -> Option<&str> {
    let fence = text.find("```json").or_else(|| text.find("```JSON"))?;
    let after_label = &text[fence + "```json".len()..];
    let body_start = after_label.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_label[body_start..];
    match body.find("```") {
        Some(end) => Some(&body[..end]),
        None => Some(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WELL_FORMED: &str = r#"{"project_stage": "testing", "key_events": ["progress: importer shipped"], "health_status": "green", "main_risk": ""}"#;

    #[test]
    fn test_well_formed_is_a_noop() {
        let recovered = recover_object(WELL_FORMED).expect("recover");
        assert!(!recovered.repaired);
        let direct: Value = serde_json::from_str(WELL_FORMED).expect("parse");
        assert_eq!(recovered.value, direct);
    }

    #[test]
    fn test_prose_wrapped_object() {
        let raw = format!("Sure, here is the analysis you asked for:\n\n{}\n\nLet me know!", WELL_FORMED);
        let recovered = recover_object(&raw).expect("recover");
        assert!(recovered.repaired);
        let direct: Value = serde_json::from_str(WELL_FORMED).expect("parse");
        assert_eq!(recovered.value, direct);
    }

    #[test]
    fn test_fenced_block() {
        let raw = format!("The report looks healthy.\n```json\n{}\n```\n", WELL_FORMED);
        let recovered = recover_object(&raw).expect("recover");
        assert!(recovered.repaired);
        let direct: Value = serde_json::from_str(WELL_FORMED).expect("parse");
        assert_eq!(recovered.value, direct);
    }

    #[test]
    fn test_truncation_restores_any_number_of_closers() {
        let full = r#"{"a": {"b": [1, 2], "c": {"d": "x"}}}"#;
        let expected: Value = serde_json::from_str(full).expect("parse");
        // Strip the final k closers for every possible k.
        for k in 1..=3 {
            let cut = &full[..full.len() - k];
            let recovered = recover_object(cut).expect("recover");
            assert!(recovered.repaired);
            assert_eq!(recovered.value, expected, "k = {}", k);
        }
    }

    #[test]
    fn test_truncation_mid_string_drops_trailing_field() {
        let raw = r#"{"health_status": "yellow", "main_risk": "the database migra"#;
        let recovered = recover_object(raw).expect("recover");
        assert!(recovered.repaired);
        // The incomplete field is gone, the complete one survives intact.
        assert_eq!(recovered.value, json!({"health_status": "yellow"}));
    }

    #[test]
    fn test_truncation_after_dangling_key() {
        let raw = r#"{"health_status": "green", "main_risk":"#;
        let recovered = recover_object(raw).expect("recover");
        assert_eq!(recovered.value, json!({"health_status": "green"}));
    }

    #[test]
    fn test_truncation_with_trailing_comma() {
        let raw = r#"{"key_events": ["progress: a", "progress: b"],"#;
        let recovered = recover_object(raw).expect("recover");
        assert_eq!(
            recovered.value,
            json!({"key_events": ["progress: a", "progress: b"]})
        );
    }

    #[test]
    fn test_truncation_inside_nested_array() {
        let raw = r#"{"role_gaps": ["qa", "devo"#;
        let recovered = recover_object(raw).expect("recover");
        assert_eq!(recovered.value, json!({"role_gaps": ["qa"]}));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_the_scanner() {
        let raw = r#"{"main_risk": "config uses {placeholders} and \"quotes\"", "x": [1"#;
        let recovered = recover_object(raw).expect("recover");
        assert_eq!(
            recovered.value,
            json!({"main_risk": "config uses {placeholders} and \"quotes\"", "x": [1]})
        );
    }

    #[test]
    fn test_plain_prose_is_malformed() {
        let err = recover_object("no structure here at all").unwrap_err();
        assert!(matches!(err, DigestError::MalformedOutput));
    }

    #[test]
    fn test_mismatched_closers_are_not_repaired() {
        assert!(recover_object(r#"{"a": [1}"#).is_err());
    }

    #[test]
    fn test_bare_scalar_is_malformed() {
        assert!(recover_object(r#""just a string""#).is_err());
        assert!(recover_object("42").is_err());
    }
}
