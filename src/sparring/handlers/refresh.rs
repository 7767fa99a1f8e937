use super::{auth_cookie, extract_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::sparring::AppState;
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Exchange the `refresh_token` cookie for a new access token.
///
/// The refresh token must verify and still be the one remembered for its
/// subject; tokens cleared by logout are refused even before they expire.
#[instrument(skip_all)]
pub async fn refresh_token(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(token) = extract_cookie(&headers, REFRESH_COOKIE) else {
        return unauthorized("Refresh token missing");
    };

    let verified = match state.tokens.verify(&token) {
        Ok(verified) => verified,
        Err(e) => {
            info!("refresh token rejected: {}", e);
            return unauthorized("Invalid refresh token");
        }
    };

    if !state.refresh_tokens.is_current(verified.subject_id, &token) {
        info!("refresh token for subject {} was revoked", verified.subject_id);
        return unauthorized("Invalid refresh token");
    }

    let access = match state.tokens.issue_access(verified.subject_id) {
        Ok(access) => access,
        Err(e) => {
            error!("Failed to generate access token: {}", e);
            return e.into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    let max_age = state.tokens.config().access_ttl.as_secs();
    match HeaderValue::from_str(&auth_cookie(ACCESS_COOKIE, &access.token, max_age)) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(e) => error!("Failed to build access cookie: {}", e),
    }

    (
        StatusCode::OK,
        response_headers,
        Json(json!({
            "message": "Token refreshed successfully",
            "access_token": access.token,
            "expires_at": access.expires_at,
        })),
    )
        .into_response()
}
