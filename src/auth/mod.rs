//! Credential lifecycle and request throttling.

pub mod error;
pub mod principal;
pub mod rate_limit;
pub mod revocation;
pub mod rotation;
pub mod secret;
pub mod token;

pub use error::AuthError;
pub use principal::{MemoryPrincipals, Principal, PrincipalLookup};
pub use rate_limit::RateLimiter;
pub use revocation::{MemoryRefreshTokenStore, RefreshTokenStore};
pub use rotation::{start_limiter_sweep, InvalidPeriod, PeriodicTask, RotationScheduler};
pub use secret::{Secret, SecretStore};
pub use token::{
    Algorithm, Credential, SubjectId, TokenConfig, TokenKind, TokenPair, TokenService, Verified,
};
