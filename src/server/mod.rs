use crate::config::Config;
use crate::ingest::{IngestPipeline, IngestPool};
use crate::plays::PlayCounter;
use crate::storage::MediaLayout;
use crate::streaming::{self, CbrVerdicts, SessionRegistry};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use trackwave_av::TranscodeEngine;
use trackwave_db::SqliteMetadataStore;

mod error;
mod request_id;
pub mod routes_api;

pub use error::AppError;
pub use request_id::X_REQUEST_ID;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SqliteMetadataStore,
    pub layout: MediaLayout,
    pub ingest: IngestPool,
    pub plays: Arc<PlayCounter>,
    pub sessions: SessionRegistry,
    pub cbr: Arc<CbrVerdicts>,
    /// Cancelled on shutdown; every stream session and background task
    /// hangs off this token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        store: SqliteMetadataStore,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        let sessions = SessionRegistry::new();
        let plays = Arc::new(PlayCounter::new(
            &config.plays,
            Arc::new(store.clone()),
            sessions.clone(),
        ));
        let pipeline = Arc::new(IngestPipeline::new(&config, Arc::new(store.clone()), engine));
        let layout = pipeline.layout().clone();
        let ingest = IngestPool::new(pipeline, config.ingest.max_concurrent_jobs);

        Self {
            config: Arc::new(config),
            store,
            layout,
            ingest,
            plays,
            sessions,
            cbr: Arc::new(CbrVerdicts::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel background work and every open stream session.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
        self.sessions.cancel_all();
        self.ingest.close();
    }
}

/// Create the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([
            header::HeaderName::from_static(streaming::DURATION_HEADER),
            X_REQUEST_ID.clone(),
        ]);

    let max_upload = state.config.ingest.max_upload_bytes;
    let api = routes_api::api_routes()
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .nest("/api/hls", streaming::hls_router())
        .nest("/api/stream", streaming::stream_router())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM.
pub async fn start_server(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Starting server on {}", addr);

    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let sweep = state.plays.start_sweep(state.shutdown.child_token());
    let app = create_router(state.clone());

    let on_shutdown = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            on_shutdown.begin_shutdown();
        })
        .await?;

    state.begin_shutdown();
    let _ = sweep.await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use trackwave_av::{FfmpegEngine, ToolRegistry};
    use trackwave_db::pool::init_memory_pool;

    fn state() -> AppState {
        let store = SqliteMetadataStore::new(init_memory_pool().unwrap());
        let engine = Arc::new(FfmpegEngine::new(ToolRegistry::default()));
        AppState::new(Config::default(), store, engine)
    }

    #[tokio::test]
    async fn test_health() {
        let response = create_router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_track_id_is_400() {
        let response = create_router(state())
            .oneshot(Request::get("/api/tracks/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_track_is_404() {
        let response = create_router(state())
            .oneshot(Request::get("/api/tracks/77").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_id_echoed_in_error() {
        let response = create_router(state())
            .oneshot(
                Request::get("/api/tracks/77")
                    .header(&X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[&X_REQUEST_ID], "req-42");

        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["request_id"], "req-42");
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn test_begin_shutdown_cancels_sessions() {
        let state = state();
        let reg = state.sessions.register(
            "alice".parse().unwrap(),
            trackwave_common::TrackId::from(1),
            0.0,
            &state.shutdown,
        );
        state.begin_shutdown();
        assert!(reg.cancel.is_cancelled());
    }
}
