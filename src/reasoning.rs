//! Reasoning gateway client.
//!
//! The pipeline treats the reasoning service as a black box behind the
//! `ReasoningClient` trait: a prompt and a determinism knob go in, a status
//! code and raw text come out. The HTTP implementation talks to an
//! app-completion endpoint with bearer auth and bounded retry; tests drive
//! the pipeline through scripted stand-ins instead.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::DigestError;

/// The single well-known success sentinel. Any other status is a service
/// error handled by the fallback chain.
pub const STATUS_OK: u16 = 200;

/// Raw result of one reasoning invocation.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    pub status_code: u16,
    pub text: String,
}

impl ReasoningOutcome {
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

/// Black-box reasoning service interface.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// One request/response exchange. `temperature` is the determinism
    /// parameter; the pipeline passes a low value for reproducible output.
    /// A transport failure is an `Err`; a reachable service always yields
    /// an outcome, success or not.
    async fn invoke(&self, prompt: &str, temperature: f32) -> Result<ReasoningOutcome, DigestError>;
}

// ============================================================================
// Retry policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn status_is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Serialize)]
struct CompletionRequest<'a> {
    input: CompletionInput<'a>,
    parameters: CompletionParameters,
}

#[derive(Serialize)]
struct CompletionInput<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
struct CompletionParameters {
    temperature: f32,
    max_tokens: u32,
}

/// Gateway response envelope. Only `output.text` matters; everything else
/// is ignored on read.
#[derive(Deserialize)]
struct CompletionEnvelope {
    #[serde(default)]
    output: CompletionOutput,
}

#[derive(Deserialize, Default)]
struct CompletionOutput {
    #[serde(default)]
    text: String,
}

/// `ReasoningClient` over the app-completion HTTP endpoint.
pub struct HttpReasoningClient {
    client: reqwest::Client,
    config: ServiceConfig,
    retry: RetryPolicy,
}

impl HttpReasoningClient {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(config: ServiceConfig, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            retry,
        }
    }

    fn completion_url(&self) -> Result<url::Url, DigestError> {
        let base = url::Url::parse(&self.config.endpoint)
            .map_err(|e| DigestError::Config(format!("invalid endpoint: {}", e)))?;
        base.join(&format!("apps/{}/completion", self.config.app_id))
            .map_err(|e| DigestError::Config(format!("invalid completion url: {}", e)))
    }

    async fn send_once(
        &self,
        url: &url::Url,
        prompt: &str,
        temperature: f32,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(url.clone())
            .bearer_auth(&self.config.api_key)
            .json(&CompletionRequest {
                input: CompletionInput { prompt },
                parameters: CompletionParameters {
                    temperature,
                    max_tokens: self.config.max_tokens,
                },
            })
            .send()
            .await
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn invoke(&self, prompt: &str, temperature: f32) -> Result<ReasoningOutcome, DigestError> {
        if !self.config.is_configured() {
            return Err(DigestError::ServiceNotConfigured);
        }
        let url = self.completion_url()?;
        let attempts = self.retry.max_attempts.max(1);
        let mut last_err: Option<reqwest::Error> = None;

        for attempt in 1..=attempts {
            match self.send_once(&url, prompt, temperature).await {
                Ok(response) => {
                    let status = response.status();
                    if status_is_retryable(status) && attempt < attempts {
                        let delay = retry_delay(
                            attempt,
                            &self.retry,
                            response.headers().get(reqwest::header::RETRY_AFTER),
                        );
                        log::warn!(
                            "reasoning call got {} (attempt {}/{}), retrying in {:?}",
                            status,
                            attempt,
                            attempts,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if !status.is_success() {
                        return Ok(ReasoningOutcome {
                            status_code: status.as_u16(),
                            text: response.text().await.unwrap_or_default(),
                        });
                    }
                    let envelope: CompletionEnvelope = response.json().await?;
                    return Ok(ReasoningOutcome {
                        status_code: STATUS_OK,
                        text: envelope.output.text,
                    });
                }
                Err(e) => {
                    if attempt < attempts {
                        let delay = retry_delay(attempt, &self.retry, None);
                        log::warn!(
                            "reasoning transport error (attempt {}/{}): {}, retrying in {:?}",
                            attempt,
                            attempts,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        last_err = Some(e);
                        continue;
                    }
                    return Err(DigestError::Transport(e));
                }
            }
        }

        // Unreachable with attempts >= 1, but keep the error path total.
        Err(last_err
            .map(DigestError::Transport)
            .unwrap_or(DigestError::ServiceNotConfigured))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retry_classification() {
        assert!(status_is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(status_is_retryable(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!status_is_retryable(reqwest::StatusCode::BAD_REQUEST));
        assert!(!status_is_retryable(reqwest::StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_retry_after_header_wins() {
        let policy = RetryPolicy::default();
        let header = reqwest::header::HeaderValue::from_static("3");
        assert_eq!(retry_delay(1, &policy, Some(&header)), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_is_bounded() {
        let policy = RetryPolicy::default();
        for attempt in 1..6 {
            let delay = retry_delay(attempt, &policy, None);
            assert!(delay <= Duration::from_millis(policy.max_backoff_ms + 150));
        }
    }

    #[test]
    fn test_completion_url_joins_app_path() {
        let client = HttpReasoningClient::new(ServiceConfig {
            endpoint: "https://gw.example.com/api/v1/".into(),
            api_key: "k".into(),
            app_id: "abc123".into(),
            ..Default::default()
        });
        let url = client.completion_url().expect("url");
        assert_eq!(url.as_str(), "https://gw.example.com/api/v1/apps/abc123/completion");
    }

    #[test]
    fn test_unconfigured_outcome() {
        let outcome = ReasoningOutcome {
            status_code: 500,
            text: String::new(),
        };
        assert!(!outcome.is_success());
    }
}
