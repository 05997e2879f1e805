use serde::{Deserialize, Serialize};

use super::{repo_types::User, roles::RoleId};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Partial update of the current user. Absent fields are left untouched.
///
/// `version`, when sent, must match the stored version; clients that omit
/// it write against the version loaded for this request.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMeRequest {
    pub version: Option<i32>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub password: Option<String>,
    pub provider: Option<String>,
    pub role_id: Option<RoleId>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub anonymous: bool,
    pub user: Option<User>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
