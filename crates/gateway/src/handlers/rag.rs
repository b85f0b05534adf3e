//! Question answering handler

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use kgrag_common::errors::{AppError, Result};

/// Accepted question fields, from the query string or a JSON body
#[derive(Debug, Default, Deserialize)]
pub struct RagParams {
    pub question: Option<String>,
    pub q: Option<String>,
}

impl RagParams {
    /// `question` wins over `q`; blank values count as missing
    fn into_question(self) -> Option<String> {
        [self.question, self.q]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Validate)]
struct RagQuestion {
    #[validate(length(min = 1, max = 2000))]
    question: String,
}

/// Answer envelope shared with error responses
#[derive(Debug, Serialize)]
pub struct RagResponse {
    pub output: Vec<String>,
    pub status: String,
}

/// GET /rag?q=...
pub async fn rag_get(
    State(state): State<AppState>,
    Query(params): Query<RagParams>,
) -> Result<Json<RagResponse>> {
    answer(&state, params).await
}

/// POST /rag with `{"question": ...}` or `{"q": ...}`; `?q=` is also accepted
pub async fn rag_post(
    State(state): State<AppState>,
    Query(query): Query<RagParams>,
    body: Bytes,
) -> Result<Json<RagResponse>> {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        query
    } else {
        let parsed: RagParams = serde_json::from_slice(&body).map_err(|e| AppError::Validation {
            message: format!("Invalid JSON body: {}", e),
            field: None,
        })?;
        RagParams {
            question: parsed.question.or(query.question),
            q: parsed.q.or(query.q),
        }
    };

    answer(&state, params).await
}

async fn answer(state: &AppState, params: RagParams) -> Result<Json<RagResponse>> {
    let question = params.into_question().ok_or_else(|| AppError::MissingField {
        field: "question".to_string(),
    })?;

    let request = RagQuestion { question };
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("question".to_string()),
    })?;

    let answer = state
        .orchestrator
        .answer_within(&request.question, state.config.request_timeout())
        .await?;

    tracing::info!(
        outcome = answer.outcome.as_str(),
        evidence = answer.evidence.len(),
        "Question served"
    );

    Ok(Json(RagResponse {
        output: vec![answer.display_text().to_string()],
        status: "success".to_string(),
    }))
}
