//! Generation service abstraction
//!
//! Provides:
//! - The chat request/response wire types of the generation service
//! - A transport trait with an HTTP implementation
//! - A retrying client bounding attempts, per-attempt time and backoff

mod client;
mod http;

pub use client::{InferenceResult, ResilientInferenceClient, RetryPolicy};
pub use http::HttpGenerationTransport;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One chat turn sent to the generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body of the generation service
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub message: Vec<ChatMessage>,
    /// Opaque multi-turn state, passed through untouched
    pub history: Value,
    pub max_tokens: u32,
}

/// Response body of the generation service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub history: Option<Value>,
}

impl GenerationResponse {
    /// First generated text, or "" when the service produced none
    pub fn text(&self) -> &str {
        self.output.first().map(String::as_str).unwrap_or("")
    }
}

/// Trait for sending one generation request
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Issue a single request; no retries
    async fn send(&self, request: &GenerationRequest) -> Result<GenerationResponse>;
}
