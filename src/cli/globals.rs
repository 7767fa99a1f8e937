use secrecy::SecretString;
use std::path::PathBuf;

/// Settings shared by every action.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub jwt_active_secret: SecretString,
    /// Oldest first.
    pub jwt_legacy_secrets: Vec<SecretString>,
    pub secret_history: usize,
    pub access_ttl: u64,
    pub refresh_ttl: u64,
    pub rotation_interval: u64,
    pub rate_limit: usize,
    pub rate_window: u64,
    /// JSON file with the principals allowed to log in.
    pub principals: Option<PathBuf>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(active_secret: SecretString) -> Self {
        Self {
            jwt_active_secret: active_secret,
            jwt_legacy_secrets: Vec::new(),
            secret_history: 3,
            access_ttl: 60 * 60,
            refresh_ttl: 7 * 24 * 60 * 60,
            rotation_interval: 30 * 24 * 60 * 60,
            rate_limit: 5,
            rate_window: 60,
            principals: None,
        }
    }

    pub fn set_legacy_secrets(&mut self, secrets: Vec<SecretString>) {
        self.jwt_legacy_secrets = secrets;
    }
}
