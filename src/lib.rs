//! daybrief — team status intelligence.
//!
//! Takes one day's free-text status reports and produces a consolidated,
//! structured briefing. The heavy lifting is in [`digest`]: each report is
//! split into per-project segments, each segment is analyzed by an external
//! reasoning service, malformed or truncated responses are structurally
//! repaired, and everything is aggregated per project and rendered. Every
//! stage degrades through explicit fallback tiers, so a run always produces
//! usable output without fabricating facts.
//!
//! Mail collection, delivery, storage, and scheduling live outside this
//! crate: callers hand in [`types::RawReport`]s and take away a text block.

pub mod config;
pub mod digest;
pub mod error;
pub mod reasoning;
pub mod types;

pub use config::DigestConfig;
pub use digest::DigestPipeline;
pub use error::DigestError;
pub use types::RawReport;
