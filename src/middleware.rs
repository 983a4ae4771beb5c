use std::sync::Arc;

use axum::{
    extract::State,
    http::{self, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, AppState};

/// Rejects the request with 401 unless it carries a bearer token signed with
/// the shared secret. The decoded `CurrentUser` is stored in the request
/// extensions for handlers.
pub async fn mw_require_auth<B>(
    State(state): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    let user = state.tokens.verify(token).map_err(|err| {
        tracing::debug!(error = %err, "access token rejected");
        AppError::Unauthorized("invalid or expired token".to_string())
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
