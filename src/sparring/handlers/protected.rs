use crate::auth::{Principal, Verified};
use axum::{extract::Extension, response::IntoResponse, Json};
use serde_json::json;

// only reachable through middleware::require_auth
pub async fn protected(
    Extension(verified): Extension<Verified>,
    Extension(principal): Extension<Principal>,
) -> impl IntoResponse {
    Json(json!({
        "message": "You have access to this protected endpoint",
        "subject_id": verified.subject_id,
        "expires_at": verified.expires_at(),
        "user": principal,
    }))
}
