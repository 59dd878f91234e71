use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};

use folio_crypto::token::bearer_token;

use folio_types::api::Claims;

use crate::auth::AppState;

/// Extract and validate the bearer token; on success the claims are
/// available to handlers as `Extension<Claims>`. Every rejection is a bare 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = header_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state
        .tokens
        .validate(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// For public routes that personalize their answer: a missing or invalid
/// token just means an anonymous viewer.
pub fn optional_claims(state: &AppState, headers: &HeaderMap) -> Option<Claims> {
    let token = header_token(headers)?;
    state.tokens.validate(token).ok()
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
}
