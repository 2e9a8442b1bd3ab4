//! Digest pipeline orchestration.
//!
//! Drives one run end to end: segment every report, dispatch the per-segment
//! analyses with bounded concurrency, fold each segment's result through the
//! fallback chain, then aggregate and render. A failure in one segment never
//! touches a sibling; only a run with zero usable service results degrades
//! to the full raw dump.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::reasoning::{ReasoningClient, ReasoningOutcome};
use crate::types::{
    FallbackTier, FinalReport, NormalizedAnalysis, RawReport, SegmentEntry,
};

use super::aggregate::aggregate;
use super::normalize::normalize;
use super::prompts::build_analysis_prompt;
use super::render::{render_full_dump, render_section, Surface};
use super::repair::recover_object;
use super::segmenter::segment;

/// One dispatched unit of work: a single author's single project segment.
#[derive(Debug, Clone)]
struct SegmentJob {
    author: String,
    project: String,
    text: String,
    surface: Surface,
}

/// Result of one segment's analysis: the entries it produced (several for a
/// multi-project response) and whether the service itself failed.
struct SegmentResult {
    entries: Vec<(String, SegmentEntry)>,
    service_failed: bool,
}

pub struct DigestPipeline {
    config: DigestConfig,
    client: Arc<dyn ReasoningClient>,
}

impl DigestPipeline {
    pub fn new(config: DigestConfig, client: Arc<dyn ReasoningClient>) -> Self {
        Self { config, client }
    }

    /// Run the pipeline over one day's reports and produce the final text.
    pub async fn run(&self, reports: &[RawReport]) -> String {
        let run_id = Uuid::new_v4();
        log::info!("digest run {}: {} report(s)", run_id, reports.len());

        if reports.is_empty() {
            return FinalReport::default().into_text();
        }

        if !self.config.service.is_configured() {
            log::warn!("digest run {}: reasoning service not configured, dumping raw reports", run_id);
            return FinalReport {
                personal: String::new(),
                team: render_full_dump(reports),
            }
            .into_text();
        }

        let jobs = self.build_jobs(reports);
        log::info!("digest run {}: dispatching {} segment(s)", run_id, jobs.len());

        let (slots, service_failures) = self.dispatch(&jobs).await;

        // Total service failure degrades the whole run to the dump tier.
        if service_failures == jobs.len() {
            log::warn!(
                "digest run {}: every segment failed at the service level, dumping raw reports",
                run_id
            );
            return FinalReport {
                personal: String::new(),
                team: render_full_dump(reports),
            }
            .into_text();
        }

        match self.assemble(&jobs, slots) {
            Ok(report) => {
                log::info!("digest run {}: complete", run_id);
                report.into_text()
            }
            Err(e) => {
                // Render is the last stage; nothing below it can catch the
                // error, so the run boundary absorbs it into the dump tier.
                log::error!("digest run {}: render failed ({}), dumping raw reports", run_id, e);
                FinalReport {
                    personal: String::new(),
                    team: render_full_dump(reports),
                }
                .into_text()
            }
        }
    }

    /// One-prompt service round-trip, used by the CLI self-test.
    pub async fn probe(&self) -> Result<(), DigestError> {
        if !self.config.service.is_configured() {
            return Err(DigestError::ServiceNotConfigured);
        }
        let prompt = build_analysis_prompt("probe: no report content", &self.config.roster);
        let outcome = self
            .client
            .invoke(&prompt, self.config.service.temperature)
            .await?;
        if outcome.is_success() {
            Ok(())
        } else {
            Err(DigestError::ServiceStatus {
                status: outcome.status_code,
            })
        }
    }

    /// Segment every report into dispatchable jobs, personal surface first,
    /// preserving report input order throughout.
    fn build_jobs(&self, reports: &[RawReport]) -> Vec<SegmentJob> {
        let mut jobs = Vec::new();
        for report in reports {
            let surface = match &self.config.owner {
                Some(owner) if owner == &report.author => Surface::Personal,
                _ => Surface::Team,
            };
            for seg in segment(&report.body) {
                jobs.push(SegmentJob {
                    author: report.author.clone(),
                    project: seg.project,
                    text: seg.text,
                    surface,
                });
            }
        }
        jobs
    }

    /// Dispatch all jobs with bounded concurrency and wait for every one to
    /// resolve (or for the run deadline). Each task writes only its own
    /// slot; nothing is shared across tasks. Returns the slots in dispatch
    /// order plus the count of service-level failures.
    async fn dispatch(&self, jobs: &[SegmentJob]) -> (Vec<Option<SegmentResult>>, usize) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut join_set: JoinSet<(usize, SegmentResult)> = JoinSet::new();

        for (idx, job) in jobs.iter().enumerate() {
            let prompt = build_analysis_prompt(&job.text, &self.config.roster);
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let job = job.clone();
            let temperature = self.config.service.temperature;
            let excerpt_chars = self.config.excerpt_chars;

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                log::debug!("analyzing segment {} ({} / {})", idx, job.author, job.project);
                let outcome = client.invoke(&prompt, temperature).await;
                (idx, resolve_segment(&job, outcome, excerpt_chars))
            });
        }

        let mut slots: Vec<Option<SegmentResult>> = Vec::with_capacity(jobs.len());
        slots.resize_with(jobs.len(), || None);

        let deadline = self
            .config
            .run_timeout_secs
            .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

        loop {
            let joined = match deadline {
                Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        log::warn!("run deadline reached with {} segment(s) unresolved", join_set.len());
                        join_set.abort_all();
                        break;
                    }
                },
                None => join_set.join_next().await,
            };
            match joined {
                Some(Ok((idx, result))) => slots[idx] = Some(result),
                Some(Err(e)) => log::error!("segment task failed: {}", e),
                None => break,
            }
        }

        // Cancelled or crashed segments still render: they become simple
        // summaries of their own input.
        for (idx, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                let job = &jobs[idx];
                *slot = Some(SegmentResult {
                    entries: vec![(
                        job.project.clone(),
                        SegmentEntry::simple_summary(&job.author, excerpt(&job.text, self.config.excerpt_chars)),
                    )],
                    service_failed: false,
                });
            }
        }

        let service_failures = slots
            .iter()
            .filter(|s| s.as_ref().is_some_and(|r| r.service_failed))
            .count();
        (slots, service_failures)
    }

    /// Aggregate resolved slots per surface and render both sections.
    fn assemble(
        &self,
        jobs: &[SegmentJob],
        slots: Vec<Option<SegmentResult>>,
    ) -> Result<FinalReport, DigestError> {
        let mut personal_entries = Vec::new();
        let mut team_entries = Vec::new();

        for (idx, slot) in slots.into_iter().enumerate() {
            let result = slot.expect("every slot resolved above");
            let bucket = match jobs[idx].surface {
                Surface::Personal => &mut personal_entries,
                Surface::Team => &mut team_entries,
            };
            for (project, entry) in result.entries {
                if entry.tier >= FallbackTier::RawPassthrough {
                    log::warn!(
                        "segment ({} / {}) degraded to {:?}",
                        entry.author,
                        project,
                        entry.tier
                    );
                } else if entry.tier == FallbackTier::Repaired {
                    log::info!("segment ({} / {}) recovered via repair", entry.author, project);
                }
                bucket.push((project, entry));
            }
        }

        Ok(FinalReport {
            personal: render_section(&aggregate(personal_entries), Surface::Personal)?,
            team: render_section(&aggregate(team_entries), Surface::Team)?,
        })
    }
}

/// The fallback chain for one segment, written as a single escalation
/// function: every error class maps to exactly one tier, and nothing here
/// can fail.
fn resolve_segment(
    job: &SegmentJob,
    outcome: Result<ReasoningOutcome, DigestError>,
    excerpt_chars: usize,
) -> SegmentResult {
    let response = match outcome {
        Err(e) => {
            log::warn!("segment ({} / {}): service failure: {}", job.author, job.project, e);
            return SegmentResult {
                entries: vec![(
                    job.project.clone(),
                    SegmentEntry::simple_summary(&job.author, excerpt(&job.text, excerpt_chars)),
                )],
                service_failed: true,
            };
        }
        Ok(outcome) if !outcome.is_success() => {
            log::warn!(
                "segment ({} / {}): service status {}",
                job.author,
                job.project,
                outcome.status_code
            );
            return SegmentResult {
                entries: vec![(
                    job.project.clone(),
                    SegmentEntry::simple_summary(&job.author, excerpt(&job.text, excerpt_chars)),
                )],
                service_failed: true,
            };
        }
        Ok(outcome) => outcome,
    };

    let recovered = match recover_object(&response.text) {
        Ok(recovered) => recovered,
        Err(_) => {
            log::warn!(
                "segment ({} / {}): no structured object recoverable, passing response through",
                job.author,
                job.project
            );
            return SegmentResult {
                entries: vec![(
                    job.project.clone(),
                    SegmentEntry::raw_passthrough(&job.author, &response.text),
                )],
                service_failed: false,
            };
        }
    };

    match normalize(&recovered.value) {
        Ok(NormalizedAnalysis::Single(record)) => SegmentResult {
            entries: vec![(
                job.project.clone(),
                SegmentEntry::structured(&job.author, record, recovered.repaired),
            )],
            service_failed: false,
        },
        Ok(NormalizedAnalysis::Multi(records)) => SegmentResult {
            entries: records
                .into_iter()
                .map(|(project, record)| {
                    (
                        project,
                        SegmentEntry::structured(&job.author, record, recovered.repaired),
                    )
                })
                .collect(),
            service_failed: false,
        },
        Err(e) => {
            log::warn!(
                "segment ({} / {}): normalization failed ({}), passing response through",
                job.author,
                job.project,
                e
            );
            SegmentResult {
                entries: vec![(
                    job.project.clone(),
                    SegmentEntry::raw_passthrough(&job.author, &response.text),
                )],
                service_failed: false,
            }
        }
    }
}

/// First `n` characters of the original input, with a truncation marker.
fn excerpt(text: &str, n: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= n {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(n).collect();
        format!("{}…", head)
    }
}
