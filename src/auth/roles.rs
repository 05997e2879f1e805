use serde::{Deserialize, Serialize};

/// Coarse role tag on a user. The discriminants are the primary keys seeded
/// into `auth_roles` and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(into = "i16", try_from = "i16")]
pub enum RoleId {
    Basic = 1,
    Admin = 2,
}

impl From<RoleId> for i16 {
    fn from(role: RoleId) -> Self {
        role as i16
    }
}

impl TryFrom<i16> for RoleId {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RoleId::Basic),
            2 => Ok(RoleId::Admin),
            other => Err(format!("unknown role id {other}")),
        }
    }
}
