use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    jobs: usize,
    cache: CacheHealth,
}

#[derive(Serialize)]
pub struct CacheHealth {
    stores: usize,
    #[serde(rename = "lastUpdate", skip_serializing_if = "Option::is_none")]
    last_update: Option<DateTime<Utc>>,
}

/// Health check endpoint
///
/// The service has no external runtime dependencies to probe (the WebDriver
/// endpoint is only contacted while a job runs), so this reports liveness
/// plus job-table and cache size.
pub async fn health_handler(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        jobs: state.jobs.list().len(),
        cache: CacheHealth {
            stores: state.deps.cache.stores().len(),
            last_update: state.deps.cache.last_update(),
        },
    })
}
