//! Export-trigger and job-polling handlers.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::kernel::{JobFetchError, SubmitParams};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub stardate: Option<String>,
    pub enddate: Option<String>,
    #[serde(rename = "storeName")]
    pub store_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

/// `GET /export` - start a background export job, respond immediately.
pub async fn start_export(
    Extension(state): Extension<AppState>,
    Query(params): Query<ExportQuery>,
) -> impl IntoResponse {
    let id = state.jobs.submit(SubmitParams {
        stardate: params.stardate,
        enddate: params.enddate,
        store_name: params.store_name,
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "jobId": id, "status": "queued" })),
    )
}

/// `GET /jobs` - snapshots of all jobs, newest first.
pub async fn list_jobs(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(state.jobs.list())
}

/// `GET /jobs/:id` - one job's status, logs, and result or error.
pub async fn get_job(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Response {
    let Some(job) = parse_job_id(&id).and_then(|id| state.jobs.get(id)) else {
        return job_not_found();
    };
    Json(job).into_response()
}

/// `GET /jobs/:id/download?format=json` - the finished artifact, raw or
/// decoded to records. `409` until the job is done.
pub async fn download_job(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DownloadQuery>,
) -> Response {
    let Some(id) = parse_job_id(&id) else {
        return job_not_found();
    };

    let file_path = match state.jobs.result_path(id) {
        Ok(path) => path,
        Err(JobFetchError::NotFound) => return job_not_found(),
        Err(JobFetchError::NotReady) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "job not finished" })),
            )
                .into_response()
        }
    };

    if params.format.as_deref() == Some("json") {
        return match state.deps.decoder.decode(&file_path) {
            Ok(records) => {
                let count = records.len();
                Json(json!({ "data": records, "count": count })).into_response()
            }
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to decode artifact", "details": e.to_string() })),
            )
                .into_response(),
        };
    }

    match tokio::fs::read(&file_path).await {
        Ok(bytes) => {
            let filename = file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "export.xlsx".to_string());
            (
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                            .to_string(),
                    ),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "failed to read artifact", "details": e.to_string() })),
        )
            .into_response(),
    }
}

// Unknown and malformed ids look the same to callers.
fn parse_job_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn job_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "job not found" })),
    )
        .into_response()
}
