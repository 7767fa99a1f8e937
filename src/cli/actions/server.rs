use crate::auth::{
    start_limiter_sweep, MemoryPrincipals, MemoryRefreshTokenStore, RateLimiter,
    RotationScheduler, Secret, SecretStore, TokenConfig, TokenService,
};
use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::sparring::{new, AppState};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, globals } => {
            let store = Arc::new(secret_store(&globals)?);
            let tokens = Arc::new(TokenService::new(
                Arc::clone(&store),
                TokenConfig {
                    access_ttl: Duration::from_secs(globals.access_ttl),
                    refresh_ttl: Duration::from_secs(globals.refresh_ttl),
                },
            ));
            let limiter = Arc::new(RateLimiter::new(
                globals.rate_limit,
                Duration::from_secs(globals.rate_window),
            ));
            info!(
                "login and refresh limited to {} requests per {} seconds",
                limiter.limit(),
                limiter.window().as_secs()
            );
            let principals = Arc::new(principals(&globals)?);

            let rotation = RotationScheduler::start(
                Arc::clone(&store),
                Duration::from_secs(globals.rotation_interval),
            )
            .context("invalid rotation interval")?;
            let sweep = match start_limiter_sweep(Arc::clone(&limiter), limiter.window()) {
                Ok(sweep) => sweep,
                Err(e) => {
                    rotation.stop().await;
                    return Err(e).context("invalid rate limit window");
                }
            };

            let state = Arc::new(AppState::new(
                tokens,
                limiter,
                Arc::new(MemoryRefreshTokenStore::new()),
                principals,
            ));

            let served = new(port, state).await;

            rotation.stop().await;
            sweep.stop().await;
            info!("background tasks stopped");

            served?;
        }
    }

    Ok(())
}

/// Build the secret store from the configured secrets.
///
/// # Errors
///
/// Fails when the active secret is empty; the process must not start without one.
pub fn secret_store(globals: &GlobalArgs) -> Result<SecretStore> {
    let active = Secret::from(globals.jwt_active_secret.expose_secret());
    let legacy = globals
        .jwt_legacy_secrets
        .iter()
        .map(|secret| Secret::from(secret.expose_secret()))
        .collect();

    SecretStore::new(active, legacy, globals.secret_history)
        .context("cannot start without an active JWT secret")
}

/// Load the principals file, if one is configured.
///
/// # Errors
///
/// Fails when the file cannot be read or is not a valid principals document.
pub fn principals(globals: &GlobalArgs) -> Result<MemoryPrincipals> {
    let Some(path) = &globals.principals else {
        warn!("no principals configured, every login will be refused");
        return Ok(MemoryPrincipals::new());
    };

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read principals from {}", path.display()))?;
    let principals = MemoryPrincipals::from_json(&json)
        .with_context(|| format!("cannot load principals from {}", path.display()))?;

    info!("loaded {} principals from {}", principals.len(), path.display());
    Ok(principals)
}
