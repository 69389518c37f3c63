use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::domains::auth::JwtService;

/// Authenticated API client from a verified JWT
#[derive(Clone, Debug)]
pub struct AuthClient {
    pub subject: String,
    pub token_id: String,
}

/// JWT authentication middleware (strict)
///
/// Extracts the JWT from the Authorization header and verifies it. Requests
/// without a valid token are rejected with 401; handlers behind this layer
/// never run unauthenticated.
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match extract_auth_client(&request, &jwt_service) {
        Some(client) => {
            debug!("Authenticated client: {}", client.subject);
            request.extensions_mut().insert(client);
            next.run(request).await
        }
        None => {
            debug!("Rejected request without valid token");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "No autorizado" })),
            )
                .into_response()
        }
    }
}

/// Extract and verify JWT token from request
fn extract_auth_client(
    request: &axum::http::Request<axum::body::Body>,
    jwt_service: &JwtService,
) -> Option<AuthClient> {
    // Get Authorization header
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Extract token (handle both "Bearer <token>" and raw token)
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    // Verify token
    let claims = jwt_service.verify_token(token).ok()?;

    Some(AuthClient {
        subject: claims.sub,
        token_id: claims.jti,
    })
}
