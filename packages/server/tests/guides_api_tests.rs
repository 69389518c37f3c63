//! HTTP-level tests for the query API: authentication gate, filtering,
//! pagination, and the search endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use server_core::domains::auth::JwtService;
use server_core::kernel::test_dependencies::{SessionScript, StaticDecoder};
use server_core::server::build_app;
use tower::ServiceExt;

use common::{configured_store, harness, TestHarness};

fn test_app() -> (Router, TestHarness, String) {
    let h = harness(
        SessionScript::successful,
        vec![configured_store("zilonix")],
        vec![],
    );

    h.deps
        .cache
        .put(
            "zilonix",
            vec![
                StaticDecoder::record(&[("numero_guia", "12345"), ("ciudad", "Bogota")]),
                StaticDecoder::record(&[("numero_guia", "67890"), ("ciudad", "Medellin")]),
            ],
        )
        .unwrap();

    let app = build_app(h.deps.clone(), h.jobs.clone());
    let token = JwtService::new("test_secret", "test_issuer".to_string())
        .create_token("tests")
        .unwrap();
    (app, h, token)
}

async fn get_json(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let (app, _h, _token) = test_app();

    let (status, body) = get_json(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"]["stores"], 1);
}

#[tokio::test]
async fn guides_require_a_valid_token() {
    let (app, _h, _token) = test_app();

    let (status, body) = get_json(&app, "/guides", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No autorizado");

    let (status, _) = get_json(&app, "/guides", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_json(&app, "/guides/cache/stats", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn guides_filter_and_paginate() {
    let (app, _h, token) = test_app();

    let (status, body) = get_json(&app, "/guides?ciudad=bog", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["numero_guia"], "12345");
    assert_eq!(data[0]["_store"], "zilonix");
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["totalPages"], 1);
    assert_eq!(body["cache"]["stores"][0], "zilonix");
}

#[tokio::test]
async fn guides_page_past_the_end_is_empty() {
    let (app, _h, token) = test_app();

    let (status, body) = get_json(&app, "/guides?page=5&limit=1", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["totalPages"], 2);
}

#[tokio::test]
async fn search_finds_records_or_404s() {
    let (app, _h, token) = test_app();

    let (status, body) = get_json(&app, "/guides/search/numero_guia/123", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], 1);
    assert_eq!(body["searchCriteria"]["storeName"], "all");

    let (status, body) =
        get_json(&app, "/guides/search/zilonix/ciudad/medellin", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], 1);
    assert_eq!(body["searchCriteria"]["storeName"], "zilonix");

    let (status, body) = get_json(&app, "/guides/search/numero_guia/99999", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("numero_guia"));
}

#[tokio::test]
async fn fields_and_stats_reflect_the_cache() {
    let (app, _h, token) = test_app();

    let (status, body) = get_json(&app, "/guides/fields", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let fields = body["fields"].as_array().unwrap();
    assert!(fields.iter().any(|f| f == "numero_guia"));
    assert!(fields.iter().any(|f| f == "ciudad"));

    let (status, body) = get_json(&app, "/guides/cache/stats", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zilonix"]["count"], 2);
}

#[tokio::test]
async fn export_and_job_endpoints_are_public() {
    let (app, h, _token) = test_app();

    let (status, body) = get_json(&app, "/export?storeName=zilonix", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    let job_id: uuid::Uuid = body["jobId"].as_str().unwrap().parse().unwrap();

    let job = common::wait_terminal(&h.jobs, job_id).await;
    common::assert_done(&job);

    let (status, body) = get_json(&app, &format!("/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "done");
    assert!(body["result"]["filePath"].is_string());

    let (status, body) = get_json(&app, "/jobs/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "job not found");
}

#[tokio::test]
async fn job_download_returns_409_until_done() {
    let (app, h, _token) = test_app();

    // Unknown id is a 404
    let (status, _) = get_json(
        &app,
        &format!("/jobs/{}/download", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A failed job never yields an artifact
    let (_, body) = get_json(&app, "/export?storeName=missing", None).await;
    let failed_id: uuid::Uuid = body["jobId"].as_str().unwrap().parse().unwrap();
    let failed = common::wait_terminal(&h.jobs, failed_id).await;
    assert_eq!(failed.status, server_core::kernel::JobStatus::Error);

    let (status, body) = get_json(&app, &format!("/jobs/{failed_id}/download"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "job not finished");

    let (_, body) = get_json(&app, "/export?storeName=zilonix", None).await;
    let job_id: uuid::Uuid = body["jobId"].as_str().unwrap().parse().unwrap();
    let job = common::wait_terminal(&h.jobs, job_id).await;
    common::assert_done(&job);

    let (status, body) =
        get_json(&app, &format!("/jobs/{job_id}/download?format=json"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}
