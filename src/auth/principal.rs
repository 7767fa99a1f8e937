//! Principal records behind login and authenticated requests.
//!
//! The records themselves are owned elsewhere; this module only defines what
//! the HTTP layer needs from them and an in-memory directory seeded from JSON.

use crate::auth::SubjectId;
use anyhow::{anyhow, bail, Context, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

/// Public view of an authenticated principal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: SubjectId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: String,
}

pub trait PrincipalLookup: Send + Sync {
    /// The principal a verified token refers to, if it still exists.
    fn find(&self, subject_id: SubjectId) -> Option<Principal>;

    /// The principal owning `email` when `password` matches its stored hash.
    fn authenticate(&self, email: &str, password: &str) -> Option<Principal>;
}

#[derive(Debug, Deserialize)]
struct PrincipalRecord {
    #[serde(flatten)]
    principal: Principal,
    /// PHC string, e.g. `$argon2id$v=19$...`.
    password_hash: String,
}

/// Hash `password` with Argon2id and a random salt.
///
/// # Errors
///
/// Fails only if the hasher rejects its parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow!("failed to hash password"))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Principals held in memory, keyed by id.
#[derive(Debug, Default)]
pub struct MemoryPrincipals {
    records: RwLock<HashMap<SubjectId, PrincipalRecord>>,
}

impl MemoryPrincipals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of principals, each with a `password_hash`.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON, a hash that is not a PHC string, or a repeated
    /// id or email.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<PrincipalRecord> =
            serde_json::from_str(json).context("invalid principals document")?;

        let principals = Self::new();
        for record in records {
            PasswordHash::new(&record.password_hash).map_err(|_| {
                anyhow!("principal {} has an invalid password hash", record.principal.id)
            })?;
            principals.insert(record)?;
        }

        Ok(principals)
    }

    /// Add a principal with a plain `password`, hashed before it is stored.
    ///
    /// # Errors
    ///
    /// Fails if hashing fails or the id or email is already taken.
    pub fn register(&self, principal: Principal, password: &str) -> Result<()> {
        let password_hash = hash_password(password)?;
        self.insert(PrincipalRecord {
            principal,
            password_hash,
        })
    }

    /// Drop a principal. Tokens already issued to it stop working.
    pub fn remove(&self, subject_id: SubjectId) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.remove(&subject_id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, record: PrincipalRecord) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        if records.contains_key(&record.principal.id) {
            bail!("duplicate principal id {}", record.principal.id);
        }
        if records
            .values()
            .any(|existing| existing.principal.email == record.principal.email)
        {
            bail!("duplicate principal email {}", record.principal.email);
        }

        records.insert(record.principal.id, record);
        Ok(())
    }
}

impl PrincipalLookup for MemoryPrincipals {
    fn find(&self, subject_id: SubjectId) -> Option<Principal> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(&subject_id).map(|record| record.principal.clone())
    }

    fn authenticate(&self, email: &str, password: &str) -> Option<Principal> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .values()
            .find(|record| record.principal.email == email)
            .filter(|record| verify_password(password, &record.password_hash))
            .map(|record| record.principal.clone())
    }
}
