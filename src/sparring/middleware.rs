//! Request pipeline stages: throttling and credential verification.

use super::{handlers::extract_client_ip, AppState};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tracing::debug;

/// Reject requests with a missing or invalid bearer token, or whose subject
/// is no longer known.
///
/// On success the [`Verified`](crate::auth::Verified) claims and the
/// [`Principal`](crate::auth::Principal) are added to the request extensions
/// for the handler.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(presented) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authorization token missing" })),
        )
            .into_response();
    };

    let verified = match state.tokens.verify(presented) {
        Ok(verified) => verified,
        Err(e) => {
            debug!("rejected credential: {}", e);
            return e.into_response();
        }
    };

    let Some(principal) = state.principals.find(verified.subject_id) else {
        debug!("no principal for subject {}", verified.subject_id);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "User not found" })),
        )
            .into_response();
    };

    request.extensions_mut().insert(verified);
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Admit or reject by client address.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    if let Err(e) = state.limiter.check(&key) {
        return e.into_response();
    }

    next.run(request).await
}

/// The peer address when the server was started with connect info, otherwise
/// the proxy headers.
fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    extract_client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string())
}
