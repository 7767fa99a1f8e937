//! Refresh token bookkeeping for logout.
//!
//! A refresh token stays cryptographically valid until it expires, so logout
//! only works if whoever accepts refresh tokens also asks this store whether
//! the token is still the current one for its subject.

use crate::auth::SubjectId;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

pub trait RefreshTokenStore: Send + Sync {
    /// Record `token` as the current refresh token of `subject_id`, replacing any previous one.
    fn remember(&self, subject_id: SubjectId, token: &str);

    /// Whether `token` is still the current refresh token of `subject_id`.
    fn is_current(&self, subject_id: SubjectId, token: &str) -> bool;

    /// Forget `token`. Returns `true` if it was stored.
    fn revoke(&self, token: &str) -> bool;
}

/// One refresh token per subject, held in memory.
#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Mutex<HashMap<SubjectId, String>>,
}

impl MemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefreshTokenStore for MemoryRefreshTokenStore {
    fn remember(&self, subject_id: SubjectId, token: &str) {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.insert(subject_id, token.to_string());
    }

    fn is_current(&self, subject_id: SubjectId, token: &str) -> bool {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.get(&subject_id).is_some_and(|current| current == token)
    }

    fn revoke(&self, token: &str) -> bool {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        let before = tokens.len();
        tokens.retain(|_, current| current != token);
        tokens.len() != before
    }
}
