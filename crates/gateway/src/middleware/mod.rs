//! HTTP middleware

pub mod rate_limit;

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use kgrag_common::errors::AppError;
use kgrag_common::metrics::{RequestMetrics, METRICS_PREFIX};
use std::any::Any;

/// Time every request and count it by status
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let metrics = RequestMetrics::start(request.method().as_str(), request.uri().path());
    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());
    response
}

/// Turn a panic inside a handler into a 500 with the error envelope
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    metrics::counter!(format!("{}_panics_total", METRICS_PREFIX)).increment(1);

    AppError::Internal {
        message: "unexpected fault while answering".to_string(),
    }
    .into_response()
}
