//! Server-side sessions carried in the `sid` cookie.
//!
//! A session is valid while it exists and `now < expires_at`. Expired rows are
//! deleted lazily the first time they are resolved, and in bulk by the
//! maintenance job.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use hanboard_api::{PublicUser, Role};
use rand::RngCore;
use tracing::debug;

use crate::storage::{SessionRecord, Storage, StorageError};

pub const SESSION_COOKIE: &str = "sid";

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    pub nickname: String,
    pub role: Role,
}

impl SessionInfo {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn public_user(&self) -> PublicUser {
        PublicUser {
            id: self.user_id.clone(),
            nickname: self.nickname.clone(),
            role: self.role,
        }
    }
}

/// Creates, resolves and revokes sessions against the shared storage.
#[derive(Clone)]
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    /// Persist a fresh session for `user_id`. Returns the row and the
    /// `Set-Cookie` value that hands it to the client.
    pub async fn create(&self, user_id: &str) -> Result<(SessionRecord, String), StorageError> {
        let now = Utc::now();
        let session = SessionRecord {
            sid: new_session_id(),
            user_id: user_id.to_string(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.storage.put_session(&session).await?;
        let cookie = self.cookie(&session.sid);
        Ok((session, cookie))
    }

    pub async fn resolve(&self, sid: &str) -> Result<Option<SessionInfo>, StorageError> {
        self.resolve_at(sid, Utc::now()).await
    }

    /// Resolve `sid` as of `now`. An expired session is deleted and
    /// reported as absent.
    pub async fn resolve_at(
        &self,
        sid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionInfo>, StorageError> {
        let Some(found) = self.storage.find_session(sid).await? else {
            return Ok(None);
        };
        if found.session.expires_at <= now {
            debug!(user = %found.session.user_id, "session expired; deleting");
            self.storage.delete_session(sid).await?;
            return Ok(None);
        }
        Ok(Some(SessionInfo {
            session_id: found.session.sid,
            user_id: found.session.user_id,
            nickname: found.nickname,
            role: found.role,
        }))
    }

    /// Delete the session. Absent sessions are not an error.
    pub async fn revoke(&self, sid: &str) -> Result<(), StorageError> {
        self.storage.delete_session(sid).await
    }

    pub fn cookie(&self, sid: &str) -> String {
        format!(
            "{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax; Secure; Max-Age={}",
            self.ttl.num_seconds()
        )
    }
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Secure; Max-Age=0")
}

/// `sid_` followed by 64 hex characters from the OS CSPRNG.
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("sid_{}", hex::encode(bytes))
}

/// Read the session id from the request's `Cookie` header(s).
pub fn sid_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| {
            let value = value.trim();
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|v| !v.is_empty())
}
