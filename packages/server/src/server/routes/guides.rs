//! Query handlers over the guide cache.
//!
//! The cache acts as the read model: every handler here works on cached
//! records only and never triggers an extraction.

use std::collections::HashMap;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domains::guides::{apply_filters, find_by_field, page_params, paginate};
use crate::server::app::AppState;

/// `GET /guides?storeName=&page=&limit=&<field>=<substr>&desde=&hasta=`
///
/// Any query key that is not reserved for pagination or tenant selection is
/// treated as a substring filter on that field.
pub async fn get_guides(
    Extension(state): Extension<AppState>,
    Query(filters): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let store_name = filters.get("storeName").cloned();
    let records = state.deps.cache.get(store_name.as_deref());

    let matching = apply_filters(records, &filters);
    let (page, limit) = page_params(&filters);
    let (data, pagination) = paginate(matching, page, limit);

    Json(json!({
        "data": data,
        "pagination": pagination,
        "cache": {
            "stores": state.deps.cache.stores(),
            "lastUpdate": state.deps.cache.last_update(),
        },
    }))
}

/// `GET /guides/search/:field/:value` - search across all stores.
pub async fn search_by_field(
    Extension(state): Extension<AppState>,
    Path((field, value)): Path<(String, String)>,
) -> Response {
    search(&state, None, &field, &value)
}

/// `GET /guides/search/:storeName/:field/:value` - search one store.
pub async fn search_store_by_field(
    Extension(state): Extension<AppState>,
    Path((store_name, field, value)): Path<(String, String, String)>,
) -> Response {
    search(&state, Some(store_name), &field, &value)
}

fn search(state: &AppState, store_name: Option<String>, field: &str, value: &str) -> Response {
    let records = state.deps.cache.get(store_name.as_deref());
    let found = find_by_field(records, field, value);

    if found.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("No se encontró ninguna guía con {} = {}", field, value),
            })),
        )
            .into_response();
    }

    let count = found.len();
    Json(json!({
        "data": found,
        "found": count,
        "searchCriteria": {
            "field": field,
            "value": value,
            "storeName": store_name.as_deref().unwrap_or("all"),
        },
    }))
    .into_response()
}

/// `GET /guides/cache/stats` - per-store count, last update, and age.
pub async fn cache_stats(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(state.deps.cache.stats())
}

/// `GET /guides/fields` - discoverable field names plus usage examples.
pub async fn available_fields(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(json!({
        "fields": state.deps.cache.available_fields(),
        "examples": {
            "byField": "/guides/search/numero_guia/12345",
            "byPhone": "/guides/search/telefono/3001234567",
            "byClient": "/guides/search/cliente/empresa",
            "withFilters": "/guides?desde=2025-01-01&hasta=2025-12-31&estado=entregado",
        },
    }))
}
