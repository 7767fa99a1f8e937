//! Signing secrets and their rotation history.

use crate::auth::AuthError;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretSlice};
use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// Length in bytes of generated secrets.
pub const SECRET_LEN: usize = 32;

/// Number of retired secrets kept for verification.
pub const DEFAULT_HISTORY: usize = 3;

/// Symmetric signing key.
pub struct Secret(SecretSlice<u8>);

impl Secret {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(SecretSlice::from(bytes))
    }

    /// Generate a fresh secret from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

#[derive(Debug)]
struct Keyring {
    active: Arc<Secret>,
    // oldest first
    retired: VecDeque<Arc<Secret>>,
    generation: u64,
}

/// Active secret plus a bounded history of retired ones.
///
/// The pair is guarded by a single lock so a reader never sees a rotation half
/// applied.
#[derive(Debug)]
pub struct SecretStore {
    keyring: RwLock<Keyring>,
    history: usize,
}

impl SecretStore {
    /// Build the store from the configured secrets.
    ///
    /// `legacy` is ordered oldest first; only the most recent `history` entries
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningUnavailable`] when the active secret is empty.
    pub fn new(active: Secret, legacy: Vec<Secret>, history: usize) -> Result<Self, AuthError> {
        if active.is_empty() {
            return Err(AuthError::SigningUnavailable);
        }

        let legacy: Vec<Secret> = legacy.into_iter().filter(|s| !s.is_empty()).collect();
        let skip = legacy.len().saturating_sub(history);
        let retired = legacy.into_iter().skip(skip).map(Arc::new).collect();

        Ok(Self {
            keyring: RwLock::new(Keyring {
                active: Arc::new(active),
                retired,
                generation: 0,
            }),
            history,
        })
    }

    pub fn active(&self) -> Arc<Secret> {
        let keyring = self.keyring.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&keyring.active)
    }

    /// Retired secrets, oldest first.
    pub fn retired(&self) -> Vec<Arc<Secret>> {
        let keyring = self.keyring.read().unwrap_or_else(PoisonError::into_inner);
        keyring.retired.iter().cloned().collect()
    }

    /// Active secret followed by the retired ones, read under one lock.
    pub fn snapshot(&self) -> (Arc<Secret>, Vec<Arc<Secret>>) {
        let keyring = self.keyring.read().unwrap_or_else(PoisonError::into_inner);
        (
            Arc::clone(&keyring.active),
            keyring.retired.iter().cloned().collect(),
        )
    }

    /// Number of rotations applied since construction.
    pub fn generation(&self) -> u64 {
        self.keyring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub fn history(&self) -> usize {
        self.history
    }

    /// Retire the active secret and install `secret`, returning the new generation.
    pub fn rotate(&self, secret: Secret) -> u64 {
        let mut keyring = self.keyring.write().unwrap_or_else(PoisonError::into_inner);

        let previous = std::mem::replace(&mut keyring.active, Arc::new(secret));
        keyring.retired.push_back(previous);
        while keyring.retired.len() > self.history {
            keyring.retired.pop_front();
        }
        keyring.generation += 1;

        keyring.generation
    }
}
