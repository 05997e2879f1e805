use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{
    repo::{TokenStore, UserStore},
    repo_types::User,
    tokens::Token,
};
use crate::{error::ModelError, versioned::MemoryTable};

struct StoredToken {
    hash: [u8; 32],
    user_id: i64,
    expiry: OffsetDateTime,
    scope: String,
}

/// In-process user and token store with the same constraints as the schema:
/// unique email, versioned updates, tokens cascading with their user.
#[derive(Default)]
pub struct MemoryAuthStore {
    users: MemoryTable<User>,
    tokens: Mutex<Vec<StoredToken>>,
}

impl MemoryAuthStore {
    /// Synchronous lookup for other in-memory stores that join on users.
    pub fn user(&self, id: i64) -> Option<User> {
        self.users.get(id).ok()
    }
}

#[async_trait]
impl UserStore for MemoryAuthStore {
    async fn insert_user(&self, user: &mut User) -> Result<(), ModelError> {
        self.users.insert(user)?;
        user.password.clear_plaintext();
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> Result<User, ModelError> {
        self.users
            .find(|u| u.email == email)
            .into_iter()
            .next()
            .ok_or(ModelError::NotFound)
    }

    async fn update_user(&self, user: &mut User) -> Result<(), ModelError> {
        self.users.update(user)?;
        user.password.clear_plaintext();
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), ModelError> {
        self.users.delete(id)?;
        self.tokens.lock().retain(|t| t.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryAuthStore {
    async fn insert_token(&self, token: &Token) -> Result<(), ModelError> {
        self.users.get(token.user_id).map_err(|_| {
            ModelError::Fatal(anyhow::anyhow!(
                "auth_tokens.user_id {} references a missing user",
                token.user_id
            ))
        })?;
        self.tokens.lock().push(StoredToken {
            hash: token.hash,
            user_id: token.user_id,
            expiry: token.expiry,
            scope: token.scope.clone(),
        });
        Ok(())
    }

    async fn user_for_token(
        &self,
        scope: &str,
        hash: &[u8; 32],
        now: OffsetDateTime,
    ) -> Result<User, ModelError> {
        let user_id = self
            .tokens
            .lock()
            .iter()
            .find(|t| &t.hash == hash && t.scope == scope && t.expiry > now)
            .map(|t| t.user_id)
            .ok_or(ModelError::NotFound)?;
        self.users.get(user_id)
    }

    async fn delete_tokens_for_user(&self, scope: &str, user_id: i64) -> Result<(), ModelError> {
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|t| !(t.scope == scope && t.user_id == user_id));
        if tokens.len() == before {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::auth::{
        password::Password,
        repo_types::EMAIL_UNIQUE_CONSTRAINT,
        tokens::{generate_token, SCOPE_AUTHENTICATION},
    };

    fn user(email: &str) -> User {
        User::new("mike".into(), email.into(), Password::new("SecurePass123!").unwrap())
    }

    #[tokio::test]
    async fn insert_clears_plaintext_and_assigns_id() {
        let store = MemoryAuthStore::default();
        let mut u = user("mike@test.com");
        store.insert_user(&mut u).await.unwrap();
        assert_eq!(u.id, 1);
        assert_eq!(u.version, 1);
        assert!(u.password.plaintext().is_none());
        assert_eq!(store.user_by_email("mike@test.com").await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryAuthStore::default();
        store.insert_user(&mut user("mike@test.com")).await.unwrap();
        let err = store.insert_user(&mut user("mike@test.com")).await.unwrap_err();
        assert!(matches!(err, ModelError::DuplicateKey(c) if c == "auth_users_email_key"));
    }

    #[tokio::test]
    async fn stale_update_to_a_taken_email_is_a_conflict() {
        let store = MemoryAuthStore::default();
        store.insert_user(&mut user("a@test.com")).await.unwrap();
        let mut b = user("b@test.com");
        store.insert_user(&mut b).await.unwrap();

        b.email = "a@test.com".into();
        b.version = 99;
        assert!(matches!(
            store.update_user(&mut b).await,
            Err(ModelError::EditConflict)
        ));

        b.version = 1;
        assert!(matches!(
            store.update_user(&mut b).await,
            Err(ModelError::DuplicateKey(c)) if c == EMAIL_UNIQUE_CONSTRAINT
        ));
    }

    #[tokio::test]
    async fn deleting_a_user_drops_their_tokens() {
        let store = MemoryAuthStore::default();
        let mut u = user("mike@test.com");
        store.insert_user(&mut u).await.unwrap();
        let token = generate_token(u.id, Duration::hours(1), SCOPE_AUTHENTICATION).unwrap();
        store.insert_token(&token).await.unwrap();

        store.delete_user(u.id).await.unwrap();
        assert!(matches!(
            store
                .user_for_token(SCOPE_AUTHENTICATION, &token.hash, OffsetDateTime::now_utc())
                .await,
            Err(ModelError::NotFound)
        ));
        assert!(matches!(store.delete_user(u.id).await, Err(ModelError::NotFound)));
    }

    #[tokio::test]
    async fn tokens_for_unknown_users_are_refused() {
        let store = MemoryAuthStore::default();
        let token = generate_token(99, Duration::hours(1), SCOPE_AUTHENTICATION).unwrap();
        assert!(matches!(store.insert_token(&token).await, Err(ModelError::Fatal(_))));
    }
}
