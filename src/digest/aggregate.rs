//! Project aggregation.
//!
//! Groups per-author, per-segment entries into one view per project.
//! Projects come out in lexicographic name order so the final report is
//! independent of call completion order; within a project, entries keep the
//! order the reports arrived in. Nothing is deduplicated across authors —
//! two people describing the same event stay two entries, preserving
//! provenance.

use std::collections::BTreeMap;

use crate::types::{AggregatedProjectView, SegmentEntry};

/// Group `(project, entry)` pairs into per-project views.
///
/// No entry is dropped: degraded entries carry their placeholder record and
/// keep their author visible next to everyone else's.
pub fn aggregate(entries: Vec<(String, SegmentEntry)>) -> Vec<AggregatedProjectView> {
    let mut grouped: BTreeMap<String, Vec<SegmentEntry>> = BTreeMap::new();
    for (project, entry) in entries {
        grouped.entry(project).or_default().push(entry);
    }
    grouped
        .into_iter()
        .map(|(project, entries)| AggregatedProjectView { project, entries })
        .collect()
}
