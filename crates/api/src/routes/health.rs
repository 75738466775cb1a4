use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// `"postgres"` or `"memory"`.
    pub storage_backend: &'static str,
    /// Whether the database is reachable. Always true in memory mode.
    pub db_healthy: bool,
    /// Whether the pack store root is present on disk.
    pub store_healthy: bool,
}

/// GET /health -- returns service, database and store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (storage_backend, db_healthy) = match &state.pool {
        Some(pool) => ("postgres", packforge_db::health_check(pool).await.is_ok()),
        None => ("memory", true),
    };
    let store_healthy = tokio::fs::metadata(state.packs.store().root())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let status = if db_healthy && store_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage_backend,
        db_healthy,
        store_healthy,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
