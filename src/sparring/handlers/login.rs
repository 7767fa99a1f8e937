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
use tracing::{error, info, instrument};

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Exchange an email and password for an access and a refresh token.
///
/// Both tokens are returned in the body and set as `HttpOnly` cookies. The
/// refresh token is remembered so logout can revoke it.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid input" })),
        )
            .into_response();
    };

    let Some(principal) = state
        .principals
        .authenticate(&request.email, &request.password)
    else {
        info!("login refused");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        )
            .into_response();
    };

    let pair = match state.establish_session(principal.id) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to generate tokens: {}", e);
            return e.into_response();
        }
    };

    let config = state.tokens.config();
    let mut headers = HeaderMap::new();
    for (name, value, max_age) in [
        (ACCESS_COOKIE, &pair.access.token, config.access_ttl.as_secs()),
        (REFRESH_COOKIE, &pair.refresh.token, config.refresh_ttl.as_secs()),
    ] {
        match HeaderValue::from_str(&auth_cookie(name, value, max_age)) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(e) => error!("Failed to build {} cookie: {}", name, e),
        }
    }

    info!("subject {} logged in", principal.id);

    (
        StatusCode::OK,
        headers,
        Json(json!({
            "message": "Login successful",
            "access_token": pair.access.token,
            "refresh_token": pair.refresh.token,
            "user": principal,
        })),
    )
        .into_response()
}
