//! Error types for the digest pipeline.
//!
//! Errors are classified by where they stop a segment:
//! - Service: the reasoning gateway was unreachable or returned a
//!   non-success status — the segment degrades to a simple summary.
//! - MalformedOutput: no structured object was recoverable from the
//!   response, even after repair — the segment degrades to raw passthrough.
//! - Aggregation: a record declared the multi-project shape but a required
//!   sub-field was not a per-project mapping.
//! - Render: an otherwise-valid view could not be rendered.
//!
//! Every variant is caught at the segment boundary; none of them is allowed
//! to abort a sibling segment or surface as a crash.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    /// The reasoning service answered with a non-success status.
    #[error("Reasoning service returned status {status}")]
    ServiceStatus { status: u16 },

    /// The reasoning service could not be reached at all.
    #[error("Reasoning service transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The reasoning service is not configured (no endpoint or credential).
    #[error("Reasoning service not configured")]
    ServiceNotConfigured,

    /// No structured object could be recovered from the response text.
    #[error("No structured object recoverable from response")]
    MalformedOutput,

    /// A record's shape is internally inconsistent.
    #[error("Inconsistent record shape: {0}")]
    Aggregation(String),

    /// A valid-looking view could not be rendered.
    #[error("Render failure: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DigestError {
    /// True when the failure happened before any response text existed —
    /// the segment falls straight to the simple-summary tier.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            DigestError::ServiceStatus { .. }
                | DigestError::Transport(_)
                | DigestError::ServiceNotConfigured
        )
    }
}
