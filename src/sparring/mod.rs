pub mod handlers;
pub mod middleware;

use crate::auth::{
    AuthError, PrincipalLookup, RateLimiter, RefreshTokenStore, SubjectId, TokenPair, TokenService,
};
use anyhow::Result;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared state of the HTTP layer.
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub limiter: Arc<RateLimiter>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub principals: Arc<dyn PrincipalLookup>,
}

impl AppState {
    #[must_use]
    pub fn new(
        tokens: Arc<TokenService>,
        limiter: Arc<RateLimiter>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        principals: Arc<dyn PrincipalLookup>,
    ) -> Self {
        Self {
            tokens,
            limiter,
            refresh_tokens,
            principals,
        }
    }

    /// Issue a token pair for a subject that just authenticated and remember
    /// its refresh token so it can later be revoked.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningUnavailable`] if no token could be signed.
    pub fn establish_session(&self, subject_id: SubjectId) -> Result<TokenPair, AuthError> {
        let pair = self.tokens.issue_pair(subject_id)?;
        self.refresh_tokens.remember(subject_id, &pair.refresh.token);
        Ok(pair)
    }
}

/// Build the router. Only `/login` and `/refresh-token` are rate limited.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/protected", get(handlers::protected))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let limited = Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh-token", post(handlers::refresh_token))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/logout", post(handlers::logout))
        .merge(protected)
        .merge(limited)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn new(port: u16, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    info!("shutting down");
}
