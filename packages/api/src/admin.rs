//! Row shapes returned by the admin endpoints.

use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// One row of `GET /api/admin/users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminUser {
    pub id: String,
    pub nickname: String,
    pub role: Role,
    pub created_at: String,
}

/// One row of `GET /api/admin/users/{id}/posts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminPost {
    pub id: String,
    pub board: String,
    pub title: String,
    pub created_at: String,
    pub is_pinned: bool,
}
