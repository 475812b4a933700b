//! Router construction and the HTTP serve loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::routes::{analysis, health, not_found, profiles};
use crate::state::AppState;

/// Build the router: versioned API under `/api/v1`, health at `/` and
/// `/health`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(state.config.request_timeout_secs),
    );

    // Router::layer only wraps routes added before it. Enrollment applies
    // its own deadline ahead of the insert.
    let api = Router::new()
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/verify/{id}", post(profiles::verify_profile))
        .route("/analyze", post(analysis::analyze))
        .route("/compare", post(analysis::compare))
        .route("/models", get(health::models))
        .layer(timeout.clone())
        .route(
            "/profiles",
            post(profiles::create_profile).merge(get(profiles::list_profiles).layer(timeout.clone())),
        );

    Router::new()
        .route("/", get(health::health_check))
        .route("/health", get(health::health_check))
        .layer(timeout)
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = state.config.bind_addr;
    tracing::info!(
        %addr,
        models = ?state.config.models,
        threshold = state.config.similarity_threshold,
        max_upload_bytes = state.config.max_upload_bytes,
        timeout_secs = state.config.request_timeout_secs,
        cors = state.config.cors,
        "faceprintd listening"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
