//! HTTP endpoint for storage CloudEvents.
//!
//! `POST /` takes a CloudEvent in binary or structured content mode and runs the
//! refresh handler. `GET /healthz` answers `ok`.

use crate::event::StorageEvent;
use crate::handler::{CacheRefreshHandler, CleanupStatus, RefreshOutcome};
use crate::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

pub fn router(handler: Arc<CacheRefreshHandler>) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(handler)
}

/// Bind `0.0.0.0:{port}` and serve until SIGTERM or Ctrl-C.
pub async fn serve(handler: Arc<CacheRefreshHandler>, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listening for storage events");
    axum::serve(listener, router(handler))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
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
}

async fn receive_event(
    State(handler): State<Arc<CacheRefreshHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let event_id = header("ce-id").unwrap_or_else(|| Uuid::new_v4().to_string());
    let event_type = header("ce-type").unwrap_or_default();
    let span = tracing::info_span!("storage_event", event_id = %event_id, event_type = %event_type);

    async move {
        let event = match StorageEvent::from_body(&body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting malformed event");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "status": "rejected", "error": e.to_string() })),
                )
                    .into_response();
            }
        };
        match handler.handle(&event).await {
            Ok(outcome) => (StatusCode::OK, Json(outcome_body(&outcome))).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "cache refresh failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "failed", "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}

fn outcome_body(outcome: &RefreshOutcome) -> serde_json::Value {
    match outcome {
        RefreshOutcome::Ignored { object } => json!({ "status": outcome.status(), "object": object }),
        RefreshOutcome::Aborted { error } => json!({
            "status": outcome.status(),
            "error": error.to_string(),
            "upstream_status": error.status(),
            "retryable": error.is_retryable(),
        }),
        RefreshOutcome::Refreshed(report) => {
            let cleanup = match &report.cleanup {
                CleanupStatus::NothingToDelete => json!({ "result": "none" }),
                CleanupStatus::Deleted { cache_id } => {
                    json!({ "result": "deleted", "cache_id": cache_id })
                }
                CleanupStatus::Failed { cache_id, error } => json!({
                    "result": "failed",
                    "cache_id": cache_id,
                    "error": error.to_string(),
                    "retryable": error.is_retryable(),
                }),
            };
            json!({
                "status": outcome.status(),
                "cache_id": report.record.cache_id,
                "history_id": report.history_id,
                "previous_cache_id": report.previous_cache_id,
                "cleanup": cleanup,
            })
        }
    }
}
