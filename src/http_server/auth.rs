//! Authentication middleware for the HTTP server.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use super::{ApiState, error::ApiError};

/// Middleware for authenticating requests using a bearer token. Requests
/// pass through untouched when no API key is configured.
pub async fn auth(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(api_key) = state.config.server.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if token == api_key { Ok(next.run(request).await) } else { Err(ApiError::Unauthorized) }
}
