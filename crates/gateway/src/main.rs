//! Ariadne API Gateway
//!
//! The entry point for all external API requests.
//! Handles:
//! - Cold-start embedding of new papers
//! - Paper lookups and similar papers
//! - The personalized "For You" feed and click history
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod state;

use axum::{
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use ariadne_common::{config::AppConfig, metrics};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting Ariadne API Gateway v{}",
        ariadne_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Full(metrics::metric_name("embedding_duration_seconds")),
                metrics::EMBEDDING_BUCKETS,
            )?
            .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), metrics::LATENCY_BUCKETS)?
            .install()?;
        info!("Prometheus exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Load graph, corpus, catalog and model; any failure is fatal
    let state = AppState::load(config).map_err(|e| {
        tracing::error!(error = %e, "Failed to load serving data");
        e
    })?;

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;

    // Build the router
    let app = create_router(state);

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = if state.config.server.allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .server
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };
    let cors = cors.allow_methods(Any).allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    // API routes
    let api_routes = Router::new()
        // Embedding endpoints
        .route("/embeddings/cold-start", post(handlers::embeddings::cold_start))
        .route("/embeddings/user", post(handlers::embeddings::user_embedding))
        .route("/embeddings/existing/{node_id}", post(handlers::embeddings::reembed_existing))

        // Paper endpoints
        .route("/papers/lookup", get(handlers::papers::lookup_paper))
        .route("/papers/random", get(handlers::papers::random_papers))
        .route("/papers/{node_id}", get(handlers::papers::get_paper))
        .route("/papers/{node_id}/similar", get(handlers::papers::similar_papers))

        // Feed endpoints
        .route("/feed/{user_id}", get(handlers::feed::get_feed))

        // User endpoints
        .route("/users/{user_id}/clicks", post(handlers::users::record_click))
        .route(
            "/users/{user_id}/history",
            get(handlers::users::get_history).delete(handlers::users::clear_history),
        );

    // Compose the app
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn app() -> Router {
        create_router(state::test_state())
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = call(&app, Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["graph_nodes"], 5);
        assert_eq!(body["corpus_papers"], 5);
        assert_eq!(body["history_users"], 0);
    }

    #[tokio::test]
    async fn test_cold_start_with_embedding() {
        let app = app();
        let request = json!({ "citations": [2], "embedding": [0.5, 0.5], "k": 2 });

        let (status, body) = call(&app, Method::POST, "/v1/embeddings/cold-start", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["embedding"].as_array().unwrap().len(), 2);
        assert_eq!(body["subgraph_nodes"], 3);
        assert_eq!(body["similar"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cold_start_depends_on_citations() {
        let app = app();
        let mut embeddings = Vec::new();

        for citations in [json!([0]), json!([4]), json!([])] {
            let request = json!({ "citations": citations, "embedding": [0.5, 0.5] });
            let (status, body) = call(&app, Method::POST, "/v1/embeddings/cold-start", Some(request)).await;
            assert_eq!(status, StatusCode::OK);
            embeddings.push(body["embedding"].clone());
        }

        assert_ne!(embeddings[0], embeddings[1]);
        assert_ne!(embeddings[0], embeddings[2]);
        assert_ne!(embeddings[1], embeddings[2]);
    }

    #[tokio::test]
    async fn test_reembed_existing_paper() {
        let app = app();

        let (status, body) = call(&app, Method::POST, "/v1/embeddings/existing/3?k=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node_id"], 3);
        // 3 -> 4 with fanout [2, 2]
        assert_eq!(body["subgraph_nodes"], 2);
        assert_eq!(body["dimension"], 2);
        assert!(body["stored_similarity"].is_number());
        let similar = body["similar"].as_array().unwrap();
        assert_eq!(similar.len(), 2);
        assert!(similar.iter().all(|item| item["node_id"] != 3));

        let (status, body) = call(&app, Method::POST, "/v1/embeddings/existing/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "PAPER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_cold_start_with_text() {
        let app = app();
        let request = json!({ "citations": [0, 1], "text": "Message passing on citation graphs" });

        let (status, body) = call(&app, Method::POST, "/v1/embeddings/cold-start", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dimension"], 2);
    }

    #[tokio::test]
    async fn test_cold_start_rejects_bad_input() {
        let app = app();

        let out_of_range = json!({ "citations": [1, 5], "embedding": [0.0, 0.0] });
        let (status, body) = call(&app, Method::POST, "/v1/embeddings/cold-start", Some(out_of_range)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "OUT_OF_RANGE_REFERENCE");

        let wrong_dim = json!({ "citations": [1], "embedding": [0.0, 0.0, 0.0] });
        let (status, _) = call(&app, Method::POST, "/v1/embeddings/cold-start", Some(wrong_dim)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let both = json!({ "citations": [1], "embedding": [0.0, 0.0], "text": "x" });
        let (status, _) = call(&app, Method::POST, "/v1/embeddings/cold-start", Some(both)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_paper_lookup() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/v1/papers/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Paper 1");
        assert_eq!(body["references"], 1);

        let (status, body) = call(&app, Method::GET, "/v1/papers/lookup?mag_id=W101", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node_id"], 1);

        let (status, body) = call(&app, Method::GET, "/v1/papers/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "PAPER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_random_papers_are_distinct_and_unscored() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/v1/papers/random?n=3", None).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item.get("score").is_none()));

        let mut ids: Vec<u64> = items.iter().map(|item| item["node_id"].as_u64().unwrap()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        // more than the corpus holds: every titled paper once
        let (_, body) = call(&app, Method::GET, "/v1/papers/random?n=50", None).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_similar_excludes_self() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/v1/papers/0/similar?k=3", None).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item["node_id"] != 0));
    }

    #[tokio::test]
    async fn test_clicks_drive_the_feed() {
        let app = app();

        for node in [0, 1] {
            let (status, _) = call(
                &app,
                Method::POST,
                "/v1/users/alice/clicks",
                Some(json!({ "node_id": node })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = call(&app, Method::GET, "/v1/users/alice/history", None).await;
        assert_eq!(body["history"], json!([0, 1]));

        let (status, body) = call(&app, Method::GET, "/v1/feed/alice?k_similar=2&k_random=1", None).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        for item in &items[..2] {
            assert!(item["node_id"] != 0 && item["node_id"] != 1);
            assert!(item["score"].is_number());
        }
        assert!(items[2].get("score").is_none());

        let (status, _) = call(&app, Method::DELETE, "/v1/users/alice/history", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = call(&app, Method::GET, "/v1/users/alice/history", None).await;
        assert_eq!(body["history"], json!([]));
    }

    #[tokio::test]
    async fn test_click_on_unknown_paper_rejected() {
        let app = app();
        let (status, _) = call(&app, Method::POST, "/v1/users/bob/clicks", Some(json!({ "node_id": 99 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_embedding_unit_norm() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/v1/embeddings/user", Some(json!({ "ids": [0, 3, -1] }))).await;
        assert_eq!(status, StatusCode::OK);

        let norm: f64 = body["embedding"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap().powi(2))
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(body["used_ids"], json!([0, 3]));
    }
}
