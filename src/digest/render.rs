//! Final report rendering.
//!
//! Deterministic mapping from the aggregated views to the output text
//! contract: fixed enum labels, fixed section order (facts → personnel &
//! load → situational assessment → expectation check), one block per project
//! in lexicographic order. The personal surface drops author identity and
//! scrubs mailbox fragments out of verbatim model text; the team surface
//! attributes every entry by author.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::DigestError;
use crate::types::{
    AggregatedProjectView, AnalysisRecord, FallbackTier, HealthStatus, LoadStatus, ProjectStage,
    RawReport, SegmentEntry, Signal,
};

/// Exact output when no report was submitted at all.
pub const NO_CONTENT_SENTINEL: &str = "No reports were submitted today.";

/// Which output surface a section is rendered for. Personal drops author
/// identity; Team attributes entries per author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Personal,
    Team,
}

// ============================================================================
// Labels
// ============================================================================

fn health_label(health: HealthStatus) -> &'static str {
    match health {
        HealthStatus::Green => "on track",
        HealthStatus::Yellow => "needs attention",
        HealthStatus::Red => "at risk",
        HealthStatus::Unknown => "unknown",
    }
}

fn signal_label(signal: Signal) -> &'static str {
    match signal {
        Signal::Yes => "yes",
        Signal::No => "no",
        Signal::Uncertain => "uncertain",
    }
}

fn stage_label(stage: ProjectStage) -> &'static str {
    match stage {
        ProjectStage::Requirements => "requirements",
        ProjectStage::Design => "design",
        ProjectStage::Development => "development",
        ProjectStage::Integration => "integration",
        ProjectStage::Testing => "testing",
        ProjectStage::Acceptance => "acceptance",
        ProjectStage::Unknown => "unknown",
    }
}

fn load_label(load: LoadStatus) -> &'static str {
    match load {
        LoadStatus::High => "high",
        LoadStatus::Medium => "medium",
        LoadStatus::Low => "low",
        LoadStatus::Unknown => "unknown",
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

// ============================================================================
// Identity scrubbing (personal surface only)
// ============================================================================

fn re_mailbox_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^<\n]*<[^@>\s]+@[^>]*>?\s*[:：]\s*").unwrap())
}

fn re_mailbox_angle() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^@>\s]+@[^>]*>").unwrap())
}

/// Strip `Name <mailbox@host>:` fragments from text destined for the
/// unattributed personal surface.
pub fn scrub_identity(text: &str) -> String {
    let text = re_mailbox_prefix().replace_all(text, "");
    re_mailbox_angle().replace_all(&text, "").trim().to_string()
}

// ============================================================================
// Record rendering
// ============================================================================

/// Render one structured record in the fixed section order.
fn render_record(record: &AnalysisRecord, out: &mut String) {
    out.push_str(&format!("Stage: {}\n\n", stage_label(record.project_stage)));

    out.push_str("**Facts**\n");
    if record.key_events.is_empty() {
        out.push_str("- none reported\n");
    } else {
        for event in &record.key_events {
            out.push_str(&format!("- {}\n", event));
        }
    }
    out.push('\n');

    out.push_str("**Personnel & load**\n");
    if record.personnel.is_empty() {
        out.push_str("- none reported\n");
    } else {
        for (name, entry) in &record.personnel {
            if entry.work_type.is_empty() {
                out.push_str(&format!("- {} (load: {})\n", name, load_label(entry.load_status)));
            } else {
                out.push_str(&format!(
                    "- {} — {} (load: {})\n",
                    name,
                    entry.work_type,
                    load_label(entry.load_status)
                ));
            }
        }
    }
    out.push('\n');

    out.push_str("**Situational assessment**\n");
    out.push_str(&format!("- Health: {}\n", health_label(record.health_status)));
    out.push_str(&format!(
        "- Risk signals: fake progress {}, delay risk {}, requirements unstable {}, external block {}\n",
        signal_label(record.risk_signals.fake_progress),
        signal_label(record.risk_signals.delay_risk),
        signal_label(record.risk_signals.requirement_unstable),
        signal_label(record.risk_signals.external_block),
    ));
    out.push_str(&format!("- Single-point risk: {}\n", yes_no(record.single_point_risk)));
    if record.role_gaps.is_empty() {
        out.push_str("- Role gaps: none\n");
    } else {
        out.push_str(&format!("- Role gaps: {}\n", record.role_gaps.join(", ")));
    }
    out.push_str(&format!("- Main risk: {}\n", record.main_risk));
    out.push('\n');

    out.push_str("**Short-term expectation check**\n");
    out.push_str(&format!(
        "- Expectation reasonable: {}, optimistic bias: {}\n",
        yes_no(record.expectation_check.reasonable),
        yes_no(record.expectation_check.optimistic_bias),
    ));
    if record.expectation_check.missing_prerequisites.is_empty() {
        out.push_str("- Missing prerequisites: none\n");
    } else {
        out.push_str(&format!(
            "- Missing prerequisites: {}\n",
            record.expectation_check.missing_prerequisites.join(", ")
        ));
    }
}

fn render_entry(entry: &SegmentEntry, surface: Surface, out: &mut String) {
    if surface == Surface::Team {
        out.push_str(&format!("**{}**\n\n", entry.author));
    }
    match entry.tier {
        // Repaired renders exactly like Normal; the flag is diagnostic only.
        FallbackTier::Normal | FallbackTier::Repaired => render_record(&entry.record, out),
        FallbackTier::RawPassthrough => {
            out.push_str("_Analysis could not be structured; service response shown verbatim._\n\n");
            let text = entry.verbatim.as_deref().unwrap_or("");
            match surface {
                Surface::Personal => out.push_str(&scrub_identity(text)),
                Surface::Team => out.push_str(text.trim()),
            }
            out.push('\n');
        }
        FallbackTier::SimpleSummary => {
            out.push_str("_Analysis unavailable — original content excerpt:_\n\n");
            out.push_str(entry.verbatim.as_deref().unwrap_or("").trim());
            out.push('\n');
        }
        FallbackTier::FullDump => {
            // Full dump is a run-level rendering; an entry should never
            // carry it.
            out.push_str("_Analysis unavailable._\n");
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Render one surface's section from its aggregated views. Empty input
/// renders to an empty section (the no-content sentinel is decided at the
/// report level, where both sections are known).
pub fn render_section(
    views: &[AggregatedProjectView],
    surface: Surface,
) -> Result<String, DigestError> {
    if views.is_empty() {
        return Ok(String::new());
    }

    let mut out = String::with_capacity(2_000);
    match surface {
        Surface::Personal => out.push_str("## Personal Status Analysis\n"),
        Surface::Team => out.push_str("## Team Status Analysis\n"),
    }

    for view in views {
        if view.entries.is_empty() {
            return Err(DigestError::Render(format!(
                "project '{}' has no entries",
                view.project
            )));
        }
        out.push_str(&format!("\n### {}\n\n", view.project));
        for (i, entry) in view.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render_entry(entry, surface, &mut out);
        }
    }

    Ok(out.trim_end().to_string())
}

/// Run-level degraded output: every raw report, unprocessed, under a header
/// that says so.
pub fn render_full_dump(reports: &[RawReport]) -> String {
    let mut out = String::with_capacity(1_000);
    out.push_str("## Status Digest (degraded mode)\n\n");
    out.push_str("Structured analysis was unavailable; original reports follow unprocessed.\n");
    for report in reports {
        out.push_str(&format!("\n### {}\n", report.author));
        if !report.subject.is_empty() {
            out.push_str(&format!("Subject: {}\n", report.subject));
        }
        out.push('\n');
        out.push_str(report.body.trim());
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskSignals;

    fn record() -> AnalysisRecord {
        AnalysisRecord {
            health_status: HealthStatus::Yellow,
            key_events: vec!["progress: importer shipped".into()],
            risk_signals: RiskSignals {
                delay_risk: Signal::Yes,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn view(project: &str, entries: Vec<SegmentEntry>) -> AggregatedProjectView {
        AggregatedProjectView {
            project: project.into(),
            entries,
        }
    }

    #[test]
    fn test_health_labels() {
        assert_eq!(health_label(HealthStatus::Green), "on track");
        assert_eq!(health_label(HealthStatus::Yellow), "needs attention");
        assert_eq!(health_label(HealthStatus::Red), "at risk");
        assert_eq!(health_label(HealthStatus::Unknown), "unknown");
    }

    #[test]
    fn test_section_order_is_fixed() {
        let views = vec![view(
            "p",
            vec![SegmentEntry::structured("alice", record(), false)],
        )];
        let text = render_section(&views, Surface::Team).expect("render");
        let facts = text.find("**Facts**").expect("facts");
        let personnel = text.find("**Personnel & load**").expect("personnel");
        let situation = text.find("**Situational assessment**").expect("situation");
        let expectation = text.find("**Short-term expectation check**").expect("expectation");
        assert!(facts < personnel && personnel < situation && situation < expectation);
    }

    #[test]
    fn test_team_surface_attributes_author_personal_does_not() {
        let entries = vec![SegmentEntry::structured("alice", record(), false)];
        let team = render_section(&[view("p", entries.clone())], Surface::Team).expect("render");
        let personal = render_section(&[view("p", entries)], Surface::Personal).expect("render");
        assert!(team.contains("**alice**"));
        assert!(!personal.contains("alice"));
    }

    #[test]
    fn test_repaired_renders_like_normal() {
        let normal = render_section(
            &[view("p", vec![SegmentEntry::structured("a", record(), false)])],
            Surface::Personal,
        )
        .expect("render");
        let repaired = render_section(
            &[view("p", vec![SegmentEntry::structured("a", record(), true)])],
            Surface::Personal,
        )
        .expect("render");
        assert_eq!(normal, repaired);
    }

    #[test]
    fn test_simple_summary_shows_excerpt() {
        let entries = vec![SegmentEntry::simple_summary("bob", "raw report text".into())];
        let text = render_section(&[view("p", entries)], Surface::Team).expect("render");
        assert!(text.contains("Analysis unavailable"));
        assert!(text.contains("raw report text"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let views = vec![view(
            "p",
            vec![SegmentEntry::structured("alice", record(), false)],
        )];
        let a = render_section(&views, Surface::Team).expect("render");
        let b = render_section(&views, Surface::Team).expect("render");
        assert_eq!(a, b);
    }

    #[test]
    fn test_scrub_identity() {
        assert_eq!(
            scrub_identity("Alice Chen <alice@example.com>: shipped importer"),
            "shipped importer"
        );
        assert_eq!(scrub_identity("see <bob@example.com> for details"), "see  for details");
        assert_eq!(scrub_identity("no identities here"), "no identities here");
    }

    #[test]
    fn test_full_dump_contains_every_report() {
        let reports = vec![
            RawReport {
                author: "alice".into(),
                subject: "daily".into(),
                date: String::new(),
                body: "did things".into(),
            },
            RawReport {
                author: "bob".into(),
                subject: String::new(),
                date: String::new(),
                body: "did other things".into(),
            },
        ];
        let text = render_full_dump(&reports);
        assert!(text.contains("degraded mode"));
        assert!(text.contains("### alice"));
        assert!(text.contains("did things"));
        assert!(text.contains("### bob"));
        assert!(text.contains("did other things"));
    }

    #[test]
    fn test_empty_views_render_empty_section() {
        assert_eq!(render_section(&[], Surface::Team).expect("render"), "");
    }
}
