//! Configuration for the digest pipeline.
//!
//! The pipeline itself takes a `DigestConfig` value — it never reads ambient
//! process state. This module is the composition root's helper: it knows how
//! to assemble that value from `~/.daybrief/config.json` plus environment
//! overrides (the CLI loads `.env` first via dotenvy).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DigestError;

/// Defaults chosen to match the reference deployment.
const DEFAULT_MAX_IN_FLIGHT: usize = 4;
const DEFAULT_EXCERPT_CHARS: usize = 300;
const DEFAULT_MAX_TOKENS: u32 = 8_000;
const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Reasoning-gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Base URL of the reasoning gateway, e.g. "https://gateway.example.com/api/v1/".
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    /// Application id on the gateway; selects the deployed analyst app.
    #[serde(default)]
    pub app_id: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Determinism knob passed through on every invocation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl ServiceConfig {
    /// A run without endpoint + credential + app can never reach the
    /// service; the pipeline degrades straight to the dump tier.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty() && !self.app_id.is_empty()
    }

    /// Validate the endpoint eagerly so a typo fails at startup, not on the
    /// first segment dispatch.
    pub fn validate(&self) -> Result<(), DigestError> {
        if self.endpoint.is_empty() {
            return Ok(());
        }
        url::Url::parse(&self.endpoint)
            .map(|_| ())
            .map_err(|e| DigestError::Config(format!("invalid endpoint '{}': {}", self.endpoint, e)))
    }
}

/// One known collaborator, embedded into every analysis prompt so the model
/// maps report text onto real people and roles instead of inventing them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RosterMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// Everything the pipeline needs for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub roster: Vec<RosterMember>,
    /// Reports from this author feed the personal section; everyone else
    /// feeds the team section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Maximum concurrent reasoning invocations.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Excerpt length for simple-summary fallback entries.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Optional whole-run deadline in seconds; segments unresolved at the
    /// deadline degrade to simple summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_excerpt_chars() -> usize {
    DEFAULT_EXCERPT_CHARS
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            roster: Vec::new(),
            owner: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            run_timeout_secs: None,
        }
    }
}

impl DigestConfig {
    /// Path of the user config file: `~/.daybrief/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".daybrief").join("config.json"))
    }

    /// Load from a JSON file. A missing file yields defaults; a present but
    /// unparsable file is a hard error (silent fallback would mask typos).
    pub fn load_file(path: &Path) -> Result<Self, DigestError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `DAYBRIEF_*` environment overrides on top of file values.
    /// Environment wins, matching the original deployment's precedence.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DAYBRIEF_ENDPOINT") {
            self.service.endpoint = v;
        }
        if let Ok(v) = std::env::var("DAYBRIEF_API_KEY") {
            self.service.api_key = v;
        }
        if let Ok(v) = std::env::var("DAYBRIEF_APP_ID") {
            self.service.app_id = v;
        }
        if let Ok(v) = std::env::var("DAYBRIEF_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.service.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("DAYBRIEF_OWNER") {
            self.owner = Some(v);
        }
        if let Ok(v) = std::env::var("DAYBRIEF_MAX_IN_FLIGHT") {
            if let Ok(n) = v.parse() {
                self.max_in_flight = n;
            }
        }
        if let Ok(v) = std::env::var("DAYBRIEF_RUN_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.run_timeout_secs = Some(n);
            }
        }
    }

    /// File + environment, the way the CLI builds its config.
    pub fn load() -> Result<Self, DigestError> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.service.validate()?;
        if config.max_in_flight == 0 {
            return Err(DigestError::Config("maxInFlight must be at least 1".into()));
        }
        Ok(config)
    }
}
