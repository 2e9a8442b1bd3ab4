//! Analysis prompt construction.
//!
//! Pure functions of `(segment text, roster)` — identical inputs always
//! yield an identical prompt, which keeps the pipeline testable without a
//! live reasoning service.

use crate::config::RosterMember;

/// Build the per-segment analysis prompt.
///
/// Two fixed parts: a conservative-analyst role definition (mark uncertainty
/// rather than guess) and a task body embedding the segment, the roster, and
/// a literal example of the expected output shape.
pub fn build_analysis_prompt(segment_text: &str, roster: &[RosterMember]) -> String {
    let mut prompt = String::with_capacity(4_000);

    prompt.push_str(
        "You are a conservative engineering status analyst. You extract only what the \
         report actually states. When the report does not support a judgment, you mark \
         it unknown or uncertain instead of guessing, and you never invent people, \
         events, or risks.\n\n",
    );

    prompt.push_str("# Task\n\n");
    prompt.push_str(
        "Analyze the following status report segment and answer with a single JSON \
         object, no surrounding prose.\n\n",
    );

    prompt.push_str("## Report segment\n\n");
    prompt.push_str(segment_text);
    prompt.push_str("\n\n");

    prompt.push_str("## Known collaborators\n\n");
    if roster.is_empty() {
        prompt.push_str("(no roster provided)\n");
    } else {
        for member in roster {
            if member.role.is_empty() {
                prompt.push_str(&format!("- {}\n", member.name));
            } else {
                prompt.push_str(&format!("- {} ({})\n", member.name, member.role));
            }
        }
    }
    prompt.push_str("\n");

    prompt.push_str("## Output shape\n\n");
    prompt.push_str(
        r#"{
  "project_stage": "requirements | design | development | integration | testing | acceptance | unknown",
  "key_events": ["progress: short factual item", "blocker: short factual item"],
  "personnel": {
    "role or name": {"work_type": "what they worked on", "load_status": "high | medium | low | unknown"}
  },
  "role_gaps": ["missing role"],
  "single_point_risk": false,
  "health_status": "green | yellow | red | unknown",
  "risk_signals": {
    "fake_progress": false,
    "delay_risk": "uncertain",
    "requirement_unstable": false,
    "external_block": false
  },
  "main_risk": "one sentence, or empty if none",
  "tomorrow_expectation_check": {
    "reasonable": true,
    "optimistic_bias": false,
    "missing_prerequisites": []
  }
}"#,
    );

    prompt.push_str("\n\n# Rules\n\n");
    prompt.push_str("1. Prefix each key_events item with a category word such as \"progress:\" or \"blocker:\".\n");
    prompt.push_str("2. Only mention personnel that appear in the segment or the roster.\n");
    prompt.push_str("3. risk_signals values are true, false, or \"uncertain\" — never prose.\n");
    prompt.push_str("4. If the segment covers several projects, key every top-level field by project name instead.\n");
    prompt.push_str("5. Do NOT wrap the JSON in markdown code fences.\n");

    prompt
}
