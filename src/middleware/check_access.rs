use crate::errors::{ApiError, ApiResult};
use crate::service::auth_service::AuthService;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Middleware guarding the admin routes.
///
/// The token is read from the `token` cookie or, failing that, from a
/// `Authorization: Bearer` header, and must equal the configured `ADMIN_TOKEN`.
/// A missing or wrong token ends the request with `401 Unauthorized`.
pub async fn check_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = get_cookie(&request, "token")
        .or_else(|| extract_bearer(&request))
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

    if !AuthService::is_valid_token(&state.config.admin_token, &token) {
        warn!("rejected admin request to {}", request.uri().path());
        return Err(ApiError::Unauthorized("Invalid token".to_string()));
    }

    Ok(next.run(request).await)
}

fn extract_bearer(request: &Request) -> Option<String> {
    let auth_header = request.headers().get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;

    Some(token.trim().to_string())
}

fn get_cookie(request: &Request, name: &str) -> Option<String> {
    let cookie_header = request.headers().get(header::COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;

    cookie_str.split(';').find_map(|s| {
        let (cookie_name, cookie_value) = s.trim().split_once('=')?;

        if cookie_name == name {
            Some(cookie_value.to_string())
        } else {
            None
        }
    })
}
