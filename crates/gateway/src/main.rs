//! KGRAG API Gateway
//!
//! HTTP entry point for question answering.
//! Handles:
//! - Question routing to the retrieval pipeline
//! - Rate limiting
//! - Health and readiness checks
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use kgrag_common::{
    config::{AppConfig, ObservabilityConfig},
    graph::{GraphStore, Neo4jHttpStore},
    inference::HttpGenerationTransport,
    linking::DictionaryLinker,
    metrics,
    schema::KnowledgeSchema,
    RetrievalOrchestrator,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::oneshot};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<RetrievalOrchestrator>,
    pub graph: Arc<dyn GraphStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting KGRAG API Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize metrics
    install_metrics_exporter(&config.observability)?;
    metrics::register_metrics();

    // Build the retrieval pipeline
    let schema = Arc::new(match &config.schema_path {
        Some(path) => KnowledgeSchema::from_file(path)?,
        None => KnowledgeSchema::medical(),
    });
    let linker = Arc::new(DictionaryLinker::from_dir(&config.linker.dict_dir)?);
    let graph: Arc<dyn GraphStore> = Arc::new(Neo4jHttpStore::new(&config.graph)?);
    let transport = Arc::new(HttpGenerationTransport::new(&config.generation)?);

    let orchestrator = Arc::new(RetrievalOrchestrator::new(
        &config,
        schema,
        linker,
        graph.clone(),
        transport,
    ));

    // Create app state
    let state = AppState {
        config: config.clone(),
        orchestrator,
        graph,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // In-flight questions get `shutdown_timeout` to finish after the signal
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    });
    let drain_limit = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(config.shutdown_timeout()).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server.into_future() => result?,
        _ = drain_limit => warn!("Shutdown timeout elapsed, dropping in-flight requests"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve Prometheus metrics on the configured port (0 disables)
fn install_metrics_exporter(config: &ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_generation_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::GENERATION_BUCKETS,
        )?
        .install()?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Question answering (rate limited)
    let mut rag_routes: Router<AppState> = Router::new().route(
        "/rag",
        get(handlers::rag::rag_get).post(handlers::rag::rag_post),
    );

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(limits.requests_per_second, limits.burst);
        rag_routes = rag_routes.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(rag_routes)
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(from_fn(middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use kgrag_common::errors::{AppError, Result};
    use kgrag_common::graph::{GraphNode, GraphPath};
    use kgrag_common::inference::{GenerationRequest, GenerationResponse, GenerationTransport};
    use kgrag_common::linking::{Entity, EntityLinker, LinkedEntities};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct KeywordLinker;

    #[async_trait]
    impl EntityLinker for KeywordLinker {
        async fn link(&self, question: &str) -> Result<LinkedEntities> {
            if question.contains("感冒") {
                Ok(vec![Entity::new("感冒", ["disease"])])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct ColdGraph {
        up: bool,
    }

    #[async_trait]
    impl GraphStore for ColdGraph {
        async fn paths(&self, _label: &str, _name: &str, _depth: u32) -> Result<Vec<GraphPath>> {
            Ok(vec![GraphPath {
                nodes: vec![GraphNode::new("感冒").with_attribute("cure_way", "多休息")],
                edges: Vec::new(),
            }])
        }

        async fn ping(&self) -> Result<()> {
            if self.up {
                Ok(())
            } else {
                Err(AppError::Internal { message: "connection refused".into() })
            }
        }
    }

    struct EchoModel;

    #[async_trait]
    impl GenerationTransport for EchoModel {
        async fn send(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
            Ok(GenerationResponse {
                output: vec!["多休息，多喝水。".to_string()],
                history: None,
            })
        }
    }

    struct PanickingModel;

    #[async_trait]
    impl GenerationTransport for PanickingModel {
        async fn send(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
            panic!("model backend state corrupted");
        }
    }

    fn app_with(graph_up: bool, model: Arc<dyn GenerationTransport>) -> Router {
        let config = Arc::new(AppConfig::default());
        let graph: Arc<dyn GraphStore> = Arc::new(ColdGraph { up: graph_up });
        let orchestrator = Arc::new(RetrievalOrchestrator::new(
            &config,
            Arc::new(KnowledgeSchema::medical()),
            Arc::new(KeywordLinker),
            graph.clone(),
            model,
        ));
        create_router(AppState { config, orchestrator, graph })
    }

    fn app(graph_up: bool) -> Router {
        app_with(graph_up, Arc::new(EchoModel))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::post("/rag")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_post_question() {
        let (status, body) = send(app(true), post_json(json!({"question": "感冒怎么办"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"output": ["多休息，多喝水。"], "status": "success"}));
    }

    #[tokio::test]
    async fn test_post_q_alias() {
        let (status, body) = send(app(true), post_json(json!({"q": "感冒怎么办"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn test_get_query_string() {
        let request = Request::get("/rag?q=%E4%BB%8A%E5%A4%A9").body(Body::empty()).unwrap();
        let (status, body) = send(app(true), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"][0], kgrag_common::NO_ENTITY_ANSWER);
    }

    #[tokio::test]
    async fn test_missing_question() {
        let (status, body) = send(app(true), post_json(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["output"], json!([""]));
        assert_eq!(body["status"], "error");
        assert!(body["msg"].as_str().unwrap().contains("question"));
    }

    #[tokio::test]
    async fn test_overlong_question() {
        let question = "感".repeat(2001);
        let (status, body) = send(app(true), post_json(json!({ "question": question }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_panic_becomes_error_envelope() {
        let app = app_with(true, Arc::new(PanickingModel));
        let (status, body) = send(app, post_json(json!({"question": "感冒怎么办"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["output"], json!([""]));
        assert_eq!(body["status"], "error");
        assert!(body["msg"].as_str().unwrap().starts_with("Internal server error"));
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(true), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        let request = Request::get("/ready").body(Body::empty()).unwrap();
        let (status, body) = send(app(false), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"]["graph"]["status"], "down");
    }
}
