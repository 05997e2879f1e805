//! Opaque session tokens.
//!
//! The plaintext is 16 bytes from the OS CSPRNG rendered as unpadded base-32
//! (26 characters) and is handed to the client exactly once. Only its SHA-256
//! digest is stored; lookups hash the presented plaintext and match on
//! digest, scope and an expiry still in the future.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::{repo::TokenStore, repo_types::User};
use crate::{error::ModelError, validator::Validator};

pub const SCOPE_AUTHENTICATION: &str = "authentication";

pub const TOKEN_ENTROPY_BYTES: usize = 16;
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token ttl must be positive, got {0}")]
    InvalidTtl(Duration),
    #[error("token ttl {0} puts the expiry out of range")]
    ExpiryOutOfRange(Duration),
    #[error("os random source failed: {0}")]
    Entropy(#[from] rand::Error),
    #[error(transparent)]
    Store(#[from] ModelError),
}

#[derive(Clone)]
pub struct Token {
    pub plaintext: String,
    pub hash: [u8; 32],
    pub user_id: i64,
    pub expiry: OffsetDateTime,
    pub scope: String,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

pub fn generate_token(user_id: i64, ttl: Duration, scope: &str) -> Result<Token, TokenError> {
    if !ttl.is_positive() {
        return Err(TokenError::InvalidTtl(ttl));
    }

    let expiry = OffsetDateTime::now_utc()
        .checked_add(ttl)
        .ok_or(TokenError::ExpiryOutOfRange(ttl))?;

    let mut random = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng.try_fill_bytes(&mut random)?;
    let plaintext = base32(&random);

    Ok(Token {
        hash: token_hash(&plaintext),
        plaintext,
        user_id,
        expiry,
        scope: scope.to_string(),
    })
}

/// SHA-256 of the plaintext's UTF-8 bytes.
pub fn token_hash(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
    v.check(
        plaintext.bytes().all(|b| BASE32_ALPHABET.contains(&b)),
        "token",
        "must be base-32 encoded",
    );
}

/// Generates a token for `user_id` and persists its digest.
pub async fn issue(
    store: &dyn TokenStore,
    user_id: i64,
    ttl: Duration,
    scope: &str,
) -> Result<Token, TokenError> {
    let token = generate_token(user_id, ttl, scope)?;
    store.insert_token(&token).await?;
    debug!(user_id, scope, expiry = %token.expiry, "token issued");
    Ok(token)
}

/// The user owning a live token. Unknown, expired and out-of-scope tokens are
/// all `NotFound`.
pub async fn resolve(store: &dyn TokenStore, scope: &str, plaintext: &str) -> Result<User, ModelError> {
    store
        .user_for_token(scope, &token_hash(plaintext), OffsetDateTime::now_utc())
        .await
}

/// Deletes every token of `scope` held by `user_id`; `NotFound` if there were none.
pub async fn revoke_all(store: &dyn TokenStore, scope: &str, user_id: i64) -> Result<(), ModelError> {
    store.delete_tokens_for_user(scope, user_id).await?;
    debug!(user_id, scope, "tokens revoked");
    Ok(())
}

/// RFC 4648 base-32 without padding.
fn base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &b in bytes {
        buffer = ((buffer << 8) | u32::from(b)) & 0xFFF;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}
