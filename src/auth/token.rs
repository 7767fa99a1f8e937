//! HS-family JWT issuance and verification.
//!
//! Tokens are compact JWTs (`header.claims.signature`, base64url without
//! padding) carrying at least `subject_id` and `exp`. New tokens are always
//! signed with the active secret; verification falls back to the retired
//! secrets so a rotation does not log anybody out.

use crate::auth::{AuthError, Secret, SecretStore};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{digest::KeyInit, Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::debug;
use uuid::Uuid;

pub type SubjectId = u64;

pub const BEARER_PREFIX: &str = "Bearer ";

/// Default lifetime of access tokens (1 hour).
pub const ACCESS_TTL: Duration = Duration::from_secs(60 * 60);

/// Default lifetime of refresh tokens (7 days).
pub const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const SUBJECT_CLAIM: &str = "subject_id";
const EXPIRY_CLAIM: &str = "exp";

/// Symmetric algorithms accepted on verification. Tokens are issued with `HS256`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    HS256,
    HS384,
    HS512,
}

impl Algorithm {
    /// # Errors
    ///
    /// Returns [`AuthError::UnsupportedAlgorithm`] for anything outside the HMAC family.
    pub fn parse(alg: &str) -> Result<Self, AuthError> {
        match alg {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }

    fn sign(self, key: &[u8], input: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::HS256 => mac_sign::<Hmac<Sha256>>(key, input),
            Self::HS384 => mac_sign::<Hmac<Sha384>>(key, input),
            Self::HS512 => mac_sign::<Hmac<Sha512>>(key, input),
        }
    }

    fn verify(self, key: &[u8], input: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::HS256 => mac_verify::<Hmac<Sha256>>(key, input, signature),
            Self::HS384 => mac_verify::<Hmac<Sha384>>(key, input, signature),
            Self::HS512 => mac_verify::<Hmac<Sha512>>(key, input, signature),
        }
    }
}

fn mac_sign<M: Mac + KeyInit>(key: &[u8], input: &[u8]) -> Option<Vec<u8>> {
    let mut mac = <M as KeyInit>::new_from_slice(key).ok()?;
    mac.update(input);
    Some(mac.finalize().into_bytes().to_vec())
}

// verify_slice compares in constant time
fn mac_verify<M: Mac + KeyInit>(key: &[u8], input: &[u8], signature: &[u8]) -> bool {
    <M as KeyInit>::new_from_slice(key).is_ok_and(|mut mac| {
        mac.update(input);
        mac.verify_slice(signature).is_ok()
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

#[derive(Debug, Serialize)]
struct IssuedClaims {
    subject_id: SubjectId,
    exp: i64,
    iat: i64,
    jti: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// A signed token together with what was put in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub kind: TokenKind,
    pub subject_id: SubjectId,
    pub expires_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub access: Credential,
    pub refresh: Credential,
}

/// Outcome of a successful verification.
#[derive(Clone, Debug, PartialEq)]
pub struct Verified {
    pub subject_id: SubjectId,
    pub claims: Map<String, Value>,
}

impl Verified {
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get(EXPIRY_CLAIM).and_then(numeric_date)
    }
}

/// Seconds since the epoch. Fractional values are truncated towards the past.
fn numeric_date(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite())
            .map(|secs| secs.floor() as i64)
    })
}

/// A non-negative integer, also when encoded as a whole-number float (`42.0`).
fn subject(value: &Value) -> Option<SubjectId> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|id| id.fract() == 0.0 && *id >= 0.0 && *id < u64::MAX as f64)
            .map(|id| id as SubjectId)
    })
}

#[derive(Clone, Copy, Debug)]
pub struct TokenConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
        }
    }
}

impl TokenConfig {
    #[must_use]
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

/// Current time in seconds since the epoch.
#[must_use]
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Remove an optional `Bearer ` prefix.
#[must_use]
pub fn strip_bearer(presented: &str) -> &str {
    presented.strip_prefix(BEARER_PREFIX).unwrap_or(presented)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|_| AuthError::SigningUnavailable)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

#[derive(Debug)]
pub struct TokenService {
    secrets: Arc<SecretStore>,
    config: TokenConfig,
}

impl TokenService {
    #[must_use]
    pub fn new(secrets: Arc<SecretStore>, config: TokenConfig) -> Self {
        Self { secrets, config }
    }

    #[must_use]
    pub fn secrets(&self) -> &Arc<SecretStore> {
        &self.secrets
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns [`AuthError::SigningUnavailable`] when there is no usable active secret.
    pub fn issue_access(&self, subject_id: SubjectId) -> Result<Credential, AuthError> {
        self.issue_at(TokenKind::Access, subject_id, now_unix())
    }

    /// # Errors
    ///
    /// Returns [`AuthError::SigningUnavailable`] when there is no usable active secret.
    pub fn issue_refresh(&self, subject_id: SubjectId) -> Result<Credential, AuthError> {
        self.issue_at(TokenKind::Refresh, subject_id, now_unix())
    }

    /// Issue an access and a refresh token for a freshly authenticated subject.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningUnavailable`] when there is no usable active secret.
    pub fn issue_pair(&self, subject_id: SubjectId) -> Result<TokenPair, AuthError> {
        let now = now_unix();
        Ok(TokenPair {
            access: self.issue_at(TokenKind::Access, subject_id, now)?,
            refresh: self.issue_at(TokenKind::Refresh, subject_id, now)?,
        })
    }

    /// Issue a token as if the current time were `now` (seconds since epoch).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningUnavailable`] when there is no usable active secret.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        subject_id: SubjectId,
        now: i64,
    ) -> Result<Credential, AuthError> {
        let secret = self.secrets.active();
        if secret.is_empty() {
            return Err(AuthError::SigningUnavailable);
        }

        let ttl = i64::try_from(self.config.ttl(kind).as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl);
        let claims = IssuedClaims {
            subject_id,
            exp: expires_at,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        let token = sign(&secret, Algorithm::HS256, &claims)?;

        Ok(Credential {
            token,
            kind,
            subject_id,
            expires_at,
        })
    }

    /// Verify a presented token (optionally `Bearer `-prefixed).
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] describing the first check that failed.
    pub fn verify(&self, presented: &str) -> Result<Verified, AuthError> {
        self.verify_at(presented, now_unix())
    }

    /// Verify a presented token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedCredential`] if the input is empty or not a JWT,
    /// - [`AuthError::UnsupportedAlgorithm`] if the header is not HS256/384/512,
    /// - [`AuthError::InvalidOrExpiredCredential`] if no known secret matches or `exp` passed,
    /// - [`AuthError::MalformedClaims`] if `subject_id` is missing or not an unsigned integer.
    pub fn verify_at(&self, presented: &str, now: i64) -> Result<Verified, AuthError> {
        let token = strip_bearer(presented);
        if token.is_empty() {
            return Err(AuthError::MalformedCredential);
        }

        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(AuthError::MalformedCredential)?;
        let claims_b64 = parts.next().ok_or(AuthError::MalformedCredential)?;
        let sig_b64 = parts.next().ok_or(AuthError::MalformedCredential)?;
        if parts.next().is_some() {
            return Err(AuthError::MalformedCredential);
        }

        let header_bytes =
            Base64UrlUnpadded::decode_vec(header_b64).map_err(|_| AuthError::MalformedCredential)?;
        let header: TokenHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| AuthError::MalformedCredential)?;
        let algorithm = Algorithm::parse(&header.alg)?;

        let signature =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| AuthError::MalformedCredential)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];

        let (active, retired) = self.secrets.snapshot();
        let matched = if algorithm.verify(active.expose(), signing_input.as_bytes(), &signature) {
            debug!("token verified with active secret");
            true
        } else if let Some(index) = retired.iter().position(|secret| {
            algorithm.verify(secret.expose(), signing_input.as_bytes(), &signature)
        }) {
            debug!("token verified with retired secret {}", index);
            true
        } else {
            false
        };

        if !matched {
            return Err(AuthError::InvalidOrExpiredCredential);
        }

        let claims_bytes =
            Base64UrlUnpadded::decode_vec(claims_b64).map_err(|_| AuthError::MalformedClaims)?;
        let claims: Map<String, Value> =
            serde_json::from_slice(&claims_bytes).map_err(|_| AuthError::MalformedClaims)?;

        match claims.get(EXPIRY_CLAIM).and_then(numeric_date) {
            Some(exp) if exp > now => {}
            _ => return Err(AuthError::InvalidOrExpiredCredential),
        }

        let subject_id = claims
            .get(SUBJECT_CLAIM)
            .and_then(subject)
            .ok_or(AuthError::MalformedClaims)?;

        Ok(Verified { subject_id, claims })
    }
}

/// Sign arbitrary claims with `secret`.
///
/// # Errors
///
/// Returns [`AuthError::SigningUnavailable`] if the secret is empty or the claims
/// cannot be encoded.
pub fn sign<T: Serialize>(
    secret: &Secret,
    algorithm: Algorithm,
    claims: &T,
) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SigningUnavailable);
    }

    let header = TokenHeader {
        alg: algorithm.as_str().to_string(),
        typ: Some("JWT".to_string()),
    };
    let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(claims)?);
    let signature = algorithm
        .sign(secret.expose(), signing_input.as_bytes())
        .ok_or(AuthError::SigningUnavailable)?;

    Ok(format!(
        "{signing_input}.{}",
        Base64UrlUnpadded::encode_string(&signature)
    ))
}
