//! Report segmentation.
//!
//! Splits one author's raw report into per-project segments on explicit
//! `[project]: <name>` marker lines. Total: any input yields at least one
//! segment, so downstream stages never see an empty dispatch list.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{ProjectSegment, GENERAL_PROJECT};

// Accepts ASCII and full-width colons; the name is the rest of the line.
fn re_project_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*\[project\]\s*[:：]\s*(\S.*?)\s*$").unwrap())
}

/// Split a report body into `(project, text)` segments.
///
/// Content between one marker and the next (or end of text) belongs to that
/// marker's project. Unmarked leading content — and the whole text when no
/// marker exists — falls to the `general` sentinel project.
pub fn segment(text: &str) -> Vec<ProjectSegment> {
    let mut segments: Vec<ProjectSegment> = Vec::new();
    let mut current_project: Option<String> = None;
    let mut current_lines: Vec<&str> = Vec::new();

    let flush = |project: Option<String>, lines: &mut Vec<&str>, out: &mut Vec<ProjectSegment>| {
        let body = lines.join("\n");
        let body = body.trim();
        match project {
            Some(name) => out.push(ProjectSegment {
                project: name,
                text: body.to_string(),
            }),
            // Unmarked preamble only counts if it says something.
            None if !body.is_empty() => out.push(ProjectSegment {
                project: GENERAL_PROJECT.to_string(),
                text: body.to_string(),
            }),
            None => {}
        }
        lines.clear();
    };

    for line in text.lines() {
        if let Some(caps) = re_project_marker().captures(line) {
            flush(current_project.take(), &mut current_lines, &mut segments);
            current_project = Some(caps[1].to_string());
        } else {
            current_lines.push(line);
        }
    }
    flush(current_project, &mut current_lines, &mut segments);

    if segments.is_empty() {
        segments.push(ProjectSegment {
            project: GENERAL_PROJECT.to_string(),
            text: text.trim().to_string(),
        });
    }
    segments
}
