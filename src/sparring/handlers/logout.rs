use super::{auth_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::sparring::AppState;
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Deserialize, Debug)]
pub struct LogoutRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// Forget a refresh token so it can no longer be exchanged.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Response {
    let Some(Json(request)) = payload.filter(|Json(r)| !r.refresh_token.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid input" })),
        )
            .into_response();
    };

    if state.refresh_tokens.revoke(&request.refresh_token) {
        debug!("refresh token revoked");
    }

    // Always clear the cookies, even if the token was unknown.
    let mut headers = HeaderMap::new();
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        if let Ok(cookie) = HeaderValue::from_str(&auth_cookie(name, "", 0)) {
            headers.append(SET_COOKIE, cookie);
        }
    }

    (
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response()
}
