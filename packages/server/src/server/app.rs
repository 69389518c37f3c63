//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::auth::JwtService;
use crate::kernel::{JobManager, ServerDeps};
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::{
    available_fields, cache_stats, download_job, get_guides, get_job, health_handler, list_jobs,
    search_by_field, search_store_by_field, start_export,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
    pub jobs: Arc<JobManager>,
    pub jwt_service: Arc<JwtService>,
}

/// Build the Axum application router
///
/// The export trigger, job polling, and health endpoints are public; the
/// guide-query endpoints carry the strict JWT guard.
pub fn build_app(deps: Arc<ServerDeps>, jobs: Arc<JobManager>) -> Router {
    let jwt_service = Arc::new(JwtService::new(
        &deps.config.token_secret,
        deps.config.jwt_issuer.clone(),
    ));

    let app_state = AppState {
        deps,
        jobs,
        jwt_service: jwt_service.clone(),
    };

    // CORS configuration - read-only API, GET is the only method served
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Tenant-data endpoints behind the JWT guard
    let guides = Router::new()
        .route("/", get(get_guides))
        .route("/fields", get(available_fields))
        .route("/cache/stats", get(cache_stats))
        .route("/search/:field/:value", get(search_by_field))
        .route("/search/:store_name/:field/:value", get(search_store_by_field))
        .route_layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), req, next)
        }));

    Router::new()
        .route("/export", get(start_export))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/download", get(download_job))
        .route("/health", get(health_handler))
        .nest("/guides", guides)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
