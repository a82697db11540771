//! Account types: signup, login and the public user shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role. `Admin` is only granted through the invite-code signup path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The fields of a user that may leave the server. Never carries salt or hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: String,
    pub nickname: String,
    pub role: Role,
}

/// Body of `POST /api/auth/signup`.
///
/// Missing fields deserialize as empty strings so the handler can answer
/// with a validation error instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, rename = "inviteCode", skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub password: String,
}

/// Payload of signup and login responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserBody {
    pub user: PublicUser,
}

/// Payload of `GET /api/me`; `user` is `null` without a valid session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeBody {
    pub user: Option<PublicUser>,
}
