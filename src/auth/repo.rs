use async_trait::async_trait;
use time::OffsetDateTime;

use super::{
    repo_types::{User, UserRow},
    tokens::Token,
};
use crate::{db::Database, error::ModelError, versioned::update_versioned};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a new user and fills in its id, timestamps and version.
    async fn insert_user(&self, user: &mut User) -> Result<(), ModelError>;
    async fn user_by_email(&self, email: &str) -> Result<User, ModelError>;
    /// Conditional update on `user.version`; see [`crate::versioned`].
    async fn update_user(&self, user: &mut User) -> Result<(), ModelError>;
    #[cfg(test)]
    async fn delete_user(&self, id: i64) -> Result<(), ModelError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &Token) -> Result<(), ModelError>;
    async fn user_for_token(
        &self,
        scope: &str,
        hash: &[u8; 32],
        now: OffsetDateTime,
    ) -> Result<User, ModelError>;
    async fn delete_tokens_for_user(&self, scope: &str, user_id: i64) -> Result<(), ModelError>;
}

const USER_COLUMNS: &str = "id, created_at, updated_at, version, is_active, email, name, \
                            profile_picture, password_hash, provider, role_id, is_verified";

#[async_trait]
impl UserStore for Database {
    async fn insert_user(&self, user: &mut User) -> Result<(), ModelError> {
        let (id, created_at, updated_at, version) = self
            .bounded(
                sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime, i32)>(
                    r#"
                    INSERT INTO auth_users
                        (is_active, email, name, profile_picture, password_hash, provider, role_id, is_verified)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING id, created_at, updated_at, version
                    "#,
                )
                .bind(user.is_active)
                .bind(&user.email)
                .bind(&user.name)
                .bind(&user.profile_picture)
                .bind(user.password.hash())
                .bind(&user.provider)
                .bind(user.role_id)
                .bind(user.is_verified)
                .fetch_one(self.pool()),
            )
            .await?;

        user.id = id;
        user.created_at = created_at;
        user.updated_at = updated_at;
        user.version = version;
        user.password.clear_plaintext();
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> Result<User, ModelError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM auth_users WHERE email = $1");
        let row = self
            .bounded(sqlx::query_as::<_, UserRow>(&sql).bind(email).fetch_one(self.pool()))
            .await?;
        Ok(row.into())
    }

    async fn update_user(&self, user: &mut User) -> Result<(), ModelError> {
        update_versioned(self, user).await?;
        user.password.clear_plaintext();
        Ok(())
    }

    #[cfg(test)]
    async fn delete_user(&self, id: i64) -> Result<(), ModelError> {
        let done = self
            .bounded(
                sqlx::query("DELETE FROM auth_users WHERE id = $1")
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if done.rows_affected() == 0 {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn insert_token(&self, token: &Token) -> Result<(), ModelError> {
        self.bounded(
            sqlx::query(
                "INSERT INTO auth_tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)",
            )
            .bind(&token.hash[..])
            .bind(token.user_id)
            .bind(token.expiry)
            .bind(&token.scope)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn user_for_token(
        &self,
        scope: &str,
        hash: &[u8; 32],
        now: OffsetDateTime,
    ) -> Result<User, ModelError> {
        let row = self
            .bounded(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT u.id, u.created_at, u.updated_at, u.version, u.is_active, u.email, u.name,
                           u.profile_picture, u.password_hash, u.provider, u.role_id, u.is_verified
                    FROM auth_users u
                    INNER JOIN auth_tokens t ON t.user_id = u.id
                    WHERE t.hash = $1 AND t.scope = $2 AND t.expiry > $3
                    "#,
                )
                .bind(&hash[..])
                .bind(scope)
                .bind(now)
                .fetch_one(self.pool()),
            )
            .await?;
        Ok(row.into())
    }

    async fn delete_tokens_for_user(&self, scope: &str, user_id: i64) -> Result<(), ModelError> {
        let done = self
            .bounded(
                sqlx::query("DELETE FROM auth_tokens WHERE scope = $1 AND user_id = $2")
                    .bind(scope)
                    .bind(user_id)
                    .execute(self.pool()),
            )
            .await?;
        if done.rows_affected() == 0 {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }
}
