//! HTTP transport for the generation service

use super::{GenerationRequest, GenerationResponse, GenerationTransport};
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;

/// Sends generation requests as JSON over HTTP
pub struct HttpGenerationTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerationTransport {
    /// Create a transport from configuration
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create generation HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl GenerationTransport for HttpGenerationTransport {
    async fn send(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let response = self.client.post(&self.url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationUnavailable {
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<GenerationResponse> {
    serde_json::from_str(body).map_err(|e| AppError::MalformedUpstreamResponse {
        message: format!("Failed to parse generation response: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_parse_success_body() {
        let response =
            parse_response(r#"{"output": ["多休息，必要时服用止痛药。"], "status": "success", "history": []}"#)
                .unwrap();
        assert_eq!(response.text(), "多休息，必要时服用止痛药。");
        assert_eq!(response.history, Some(json!([])));
    }

    #[test]
    fn test_parse_error_body_has_empty_text() {
        let response = parse_response(r#"{"output": [""], "status": "error", "history": []}"#).unwrap();
        assert_eq!(response.text(), "");

        let missing = parse_response(r#"{"status": "error"}"#).unwrap();
        assert_eq!(missing.text(), "");
        assert!(missing.history.is_none());
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_response("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, AppError::MalformedUpstreamResponse { .. }));
    }

    #[test]
    fn test_request_wire_shape() {
        let request = GenerationRequest {
            message: vec![ChatMessage::user("你好")],
            history: json!([]),
            max_tokens: 256,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "message": [{"role": "user", "content": "你好"}],
                "history": [],
                "max_tokens": 256
            })
        );
    }
}
