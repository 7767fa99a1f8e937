use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("token is missing or has an invalid format")]
    MalformedCredential,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid token or expired secret")]
    InvalidOrExpiredCredential,
    #[error("invalid token claims")]
    MalformedClaims,
    #[error("too many requests")]
    RateLimited,
    #[error("no active signing secret configured")]
    SigningUnavailable,
}

impl AuthError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedCredential
            | Self::UnsupportedAlgorithm(_)
            | Self::InvalidOrExpiredCredential
            | Self::MalformedClaims => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::SigningUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to clients.
    ///
    /// Verification failures share one message so callers cannot tell which
    /// check rejected the token.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MalformedCredential
            | Self::UnsupportedAlgorithm(_)
            | Self::InvalidOrExpiredCredential => "Invalid token",
            Self::MalformedClaims => "Invalid token claims",
            Self::RateLimited => "Too many requests, please try again later.",
            Self::SigningUnavailable => "Failed to generate token",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = match self {
            Self::RateLimited => json!({ "message": self.public_message() }),
            _ => json!({ "error": self.public_message() }),
        };

        (self.status_code(), Json(body)).into_response()
    }
}
