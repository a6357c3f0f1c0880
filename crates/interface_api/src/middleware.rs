//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::Principal;

use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// A request without an `Authorization` header continues anonymously.
/// A header that is present must carry a valid bearer token; its claims
/// and the resulting [`Principal`] are added to the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = match request.headers().get(header::AUTHORIZATION) {
        None => return Ok(next.run(request).await),
        Some(value) => value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Malformed Authorization header".to_string()))?,
    };

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("Authorization header without bearer token");
        ApiError::Unauthorized("Expected a bearer token".to_string())
    })?;

    let claims = crate::auth::validate_token(token, &state.config.jwt_secret).map_err(|e| {
        warn!("Token validation failed: {:?}", e);
        ApiError::Unauthorized(e.to_string())
    })?;
    let principal = claims
        .principal()
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Request logging middleware
///
/// Logs method, path, caller, status and duration of every API request.
pub async fn audit_middleware(
    State(_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = match request.extensions().get::<Principal>() {
        Some(Principal::User(id)) => id.to_string(),
        _ => "anonymous".to_string(),
    };

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
