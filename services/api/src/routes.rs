use crate::infra::{AppState, ServiceEngine};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Extension, Json};
use promoteur_trust::reputation::trust::PromoteurActivity;
use promoteur_trust::reputation::{reputation_router, InMemoryDirectory};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub(crate) fn with_reputation_routes(
    engine: Arc<ServiceEngine>,
    directory: Arc<InMemoryDirectory>,
) -> axum::Router {
    reputation_router(engine)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/directory/promoteurs",
            put(upsert_activity_endpoint),
        )
        .layer(Extension(directory))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Feeds the in-memory directory that stands in for the marketplace read model.
pub(crate) async fn upsert_activity_endpoint(
    Extension(directory): Extension<Arc<InMemoryDirectory>>,
    Json(activity): Json<PromoteurActivity>,
) -> StatusCode {
    info!(promoteur = %activity.promoteur_id, "promoteur activity replaced");
    directory.upsert(activity);
    StatusCode::NO_CONTENT
}
