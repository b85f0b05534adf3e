//! Retrying generation client
//!
//! SENDING → DONE on the first non-empty answer; a failed attempt waits one
//! backoff interval and sends again until the attempt budget is spent, after
//! which the result is empty. Callers must read empty text as "no answer".

use super::{ChatMessage, GenerationRequest, GenerationTransport};
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use backoff::backoff::{Backoff, Constant};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Attempt budget and timing for one chat call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Pause between attempts
    pub backoff: Duration,
    /// Bound on a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&GenerationConfig> for RetryPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.backoff(),
            attempt_timeout: config.timeout(),
        }
    }
}

/// Bookkeeping for one chat call
struct RetryState {
    attempts: u32,
    max_attempts: u32,
    last_error: Option<AppError>,
    backoff: Constant,
}

impl RetryState {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts: 0,
            max_attempts: policy.max_attempts(),
            last_error: None,
            backoff: Constant::new(policy.backoff),
        }
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Record a failure; returns the pause before the next attempt, if any
    ///
    /// Every error kind is retried until the attempt budget is spent.
    fn fail(&mut self, err: AppError) -> Option<Duration> {
        self.last_error = Some(err);
        if self.attempts < self.max_attempts {
            self.backoff.next_backoff()
        } else {
            None
        }
    }
}

/// Outcome of a chat call
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// Generated text; empty when every attempt failed
    pub text: String,
    /// Updated opaque history; empty when every attempt failed
    pub history: Value,
    /// Requests issued
    pub attempts: u32,
}

impl InferenceResult {
    pub fn succeeded(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Generation client with bounded retries
pub struct ResilientInferenceClient {
    transport: Arc<dyn GenerationTransport>,
    policy: RetryPolicy,
}

impl ResilientInferenceClient {
    pub fn new(transport: Arc<dyn GenerationTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Send `prompt` as a single user turn, retrying failed attempts
    #[instrument(skip(self, prompt, history), fields(prompt_chars = prompt.chars().count()))]
    pub async fn chat(&self, prompt: &str, history: Value, max_tokens: u32) -> InferenceResult {
        let request = GenerationRequest {
            message: vec![ChatMessage::user(prompt)],
            history,
            max_tokens,
        };
        let mut state = RetryState::new(&self.policy);
        let started = Instant::now();

        loop {
            let attempt = state.begin_attempt();

            match self.attempt(&request).await {
                Ok((text, history)) => {
                    metrics::record_generation(started.elapsed().as_secs_f64(), attempt, true);
                    info!(attempt, answer_chars = text.chars().count(), "Generation succeeded");
                    return InferenceResult {
                        text,
                        history,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = state.max_attempts,
                        error = %e,
                        "Generation attempt failed"
                    );
                    match state.fail(e) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => break,
                    }
                }
            }
        }

        metrics::record_generation(started.elapsed().as_secs_f64(), state.attempts, false);
        error!(
            attempts = state.attempts,
            last_error = ?state.last_error.as_ref().map(ToString::to_string),
            "Generation exhausted"
        );

        InferenceResult {
            text: String::new(),
            history: Value::Array(Vec::new()),
            attempts: state.attempts,
        }
    }

    /// One bounded request; empty output counts as a failure
    async fn attempt(&self, request: &GenerationRequest) -> Result<(String, Value)> {
        let response = tokio::time::timeout(self.policy.attempt_timeout, self.transport.send(request))
            .await
            .map_err(|_| AppError::Timeout {
                timeout_ms: self.policy.attempt_timeout.as_millis() as u64,
            })??;

        let text = response.text().to_string();
        if text.is_empty() {
            return Err(AppError::GenerationUnavailable {
                message: "empty output".to_string(),
            });
        }

        let history = response.history.unwrap_or_else(|| request.history.clone());
        Ok((text, history))
    }
}
