use std::fmt;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

use crate::validator::Validator;

// Fixed cost: argon2id, 19 MiB, two passes, one lane.
const MEMORY_COST_KIB: u32 = 19_456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

lazy_static! {
    /// Stand-in credential for logins against unknown accounts.
    static ref DUMMY: Option<Password> = Password::new("pixelarcade-dummy-credential").ok();
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("argon2 hash_password error: {0}")]
    Hash(String),
    #[error("argon2 verify error: {0}")]
    Verify(String),
    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A user's password credential.
///
/// The hash is always present. The plaintext is kept only between `set` and
/// the moment the owning record is persisted, so it can still be
/// length-checked; stores call [`Password::clear_plaintext`] once written.
#[derive(Clone)]
pub struct Password {
    hash: String,
    plaintext: Option<String>,
}

impl Password {
    pub fn new(plaintext: &str) -> Result<Self, PasswordError> {
        Ok(Self {
            hash: hash(plaintext)?,
            plaintext: Some(plaintext.to_string()),
        })
    }

    /// Rehydrates a credential read from storage.
    pub fn from_hash(hash: String) -> Self {
        Self {
            hash,
            plaintext: None,
        }
    }

    pub fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
        *self = Self::new(plaintext)?;
        Ok(())
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    pub fn clear_plaintext(&mut self) {
        self.plaintext = None;
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    pub fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(&self.hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            PasswordError::Verify(e.to_string())
        })?;
        match hasher()?.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(PasswordError::Verify(e.to_string()))
            }
        }
    }

    /// Hashes on the blocking pool.
    pub async fn new_blocking(plaintext: String) -> Result<Self, PasswordError> {
        tokio::task::spawn_blocking(move || Self::new(&plaintext)).await?
    }

    /// Rehashes on the blocking pool.
    pub async fn set_blocking(&mut self, plaintext: String) -> Result<(), PasswordError> {
        let mut next = self.clone();
        *self = tokio::task::spawn_blocking(move || next.set(&plaintext).map(|()| next)).await??;
        Ok(())
    }

    /// Verifies on the blocking pool.
    pub async fn matches_blocking(&self, plaintext: String) -> Result<bool, PasswordError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.matches(&plaintext)).await?
    }
}

/// Runs one full verification against a throwaway hash, so a login for an
/// unknown email costs as much as one with a wrong password.
pub async fn verify_dummy(plaintext: String) -> Result<(), PasswordError> {
    tokio::task::spawn_blocking(move || {
        if let Some(dummy) = DUMMY.as_ref() {
            dummy.matches(&plaintext)?;
        }
        Ok(())
    })
    .await?
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"<redacted>")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn hash(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn validate_password_present(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    validate_password_present(v, password);
    v.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}
