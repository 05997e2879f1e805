use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use super::{
    password::{validate_password_plaintext, Password},
    roles::RoleId,
};
use crate::{
    validator::{is_valid_email, Validator},
    versioned::{Field, Versioned},
};

pub const DEFAULT_PROFILE_PICTURE: &str = "link-to-default.jpg";
pub const DEFAULT_PROVIDER: &str = "N/A";
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "auth_users_email_key";
pub const MAX_NAME_BYTES: usize = 500;

/// Registered user. Serializes without any password material.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: i32,
    pub is_active: bool,
    pub email: String,
    pub name: String,
    pub profile_picture: String,
    #[serde(skip)]
    pub password: Password,
    pub provider: String,
    pub role_id: RoleId,
    pub is_verified: bool,
}

impl User {
    /// A not-yet-persisted user with the registration defaults applied.
    pub fn new(name: String, email: String, password: Password) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: 0,
            created_at: now,
            updated_at: now,
            version: 0,
            is_active: true,
            email,
            name,
            profile_picture: DEFAULT_PROFILE_PICTURE.to_string(),
            password,
            provider: DEFAULT_PROVIDER.to_string(),
            role_id: RoleId::Basic,
            is_verified: false,
        }
    }
}

impl Versioned for User {
    const TABLE: &'static str = "auth_users";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("is_active", Field::Bool(self.is_active)),
            ("email", Field::Text(self.email.clone())),
            ("name", Field::Text(self.name.clone())),
            ("profile_picture", Field::Text(self.profile_picture.clone())),
            ("password_hash", Field::Text(self.password.hash().to_string())),
            ("provider", Field::Text(self.provider.clone())),
            ("role_id", Field::SmallInt(self.role_id.into())),
            ("is_verified", Field::Bool(self.is_verified)),
        ]
    }

    #[cfg(test)]
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(EMAIL_UNIQUE_CONSTRAINT, self.email.clone())]
    }

    fn stamp(&mut self, updated_at: OffsetDateTime, version: i32) {
        self.updated_at = updated_at;
        self.version = version;
    }

    #[cfg(test)]
    fn created(&mut self, id: i64, at: OffsetDateTime) {
        self.id = id;
        self.created_at = at;
        self.updated_at = at;
        self.version = 1;
    }
}

/// Row shape of `auth_users`.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub version: i32,
    pub is_active: bool,
    pub email: String,
    pub name: String,
    pub profile_picture: String,
    pub password_hash: String,
    pub provider: String,
    pub role_id: RoleId,
    pub is_verified: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
            is_active: row.is_active,
            email: row.email,
            name: row.name,
            profile_picture: row.profile_picture,
            password: Password::from_hash(row.password_hash),
            provider: row.provider,
            role_id: row.role_id,
            is_verified: row.is_verified,
        }
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(is_valid_email(email), "email", "must be a valid email address");
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= MAX_NAME_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
}

/// Checks a user before it is written. The plaintext rules apply only while
/// a freshly set password is still held in memory.
pub fn validate_user(v: &mut Validator, user: &User) {
    validate_name(v, &user.name);
    validate_email(v, &user.email);
    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, plaintext);
    }
}
