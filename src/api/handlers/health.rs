use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub staging: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let staging_ok = state.store.health_check().await;

    Json(HealthResponse {
        status: if staging_ok { "ok" } else { "degraded" }.to_string(),
        staging: if staging_ok { "writable" } else { "unavailable" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
