//! Storage abstraction layer for the board.
//!
//! The [`Storage`] trait defines the contract between the handler layer and
//! persistence. Ownership and role checks live in the handlers; storage is
//! purely a data access layer and never decides who may do what.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, conformance suite, throwaway servers |
//! | [`SqliteStorage`] | Production; durable single-file database |
//!
//! [`MemoryStorage`]: memory::MemoryStorage
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hanboard_api::{AdminPost, AdminUser, Banner, Comment, Post, PostSummary, Role};

use crate::credentials::PasswordHash;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item does not exist.
    #[error("not found")]
    NotFound,

    /// An item with the same unique key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Render a timestamp the way every stored row carries it:
/// RFC 3339, millisecond precision, `Z` suffix. Fixed width, so string
/// order equals time order.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Internal(format!("bad timestamp {s:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A user row, including credential material. Never serialised to clients;
/// handlers convert it to [`hanboard_api::PublicUser`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub nickname: String,
    pub role: Role,
    pub password: PasswordHash,
    pub created_at: DateTime<Utc>,
}

/// A session row: an opaque bearer token bound to a user until `expires_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub sid: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A session joined with the identity fields of its user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLookup {
    pub session: SessionRecord,
    pub nickname: String,
    pub role: Role,
}

/// What an audit log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditKind {
    Signup,
    Login,
    Post,
    Comment,
    Banner,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Signup => "signup",
            AuditKind::Login => "login",
            AuditKind::Post => "post",
            AuditKind::Comment => "comment",
            AuditKind::Banner => "banner",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup" => Ok(AuditKind::Signup),
            "login" => Ok(AuditKind::Login),
            "post" => Ok(AuditKind::Post),
            "comment" => Ok(AuditKind::Comment),
            "banner" => Ok(AuditKind::Banner),
            other => Err(StorageError::Internal(format!("unknown audit kind {other:?}"))),
        }
    }
}

/// One append-only audit log row (`ip_logs`).
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    pub kind: AuditKind,
    pub ref_id: Option<String>,
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Query parameters for [`Storage::list_posts`].
///
/// `board` is matched exactly (handlers lowercase it first). `query`, when
/// set, is a case-insensitive substring matched against title, content, and
/// author nickname.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub board: String,
    pub query: Option<String>,
    pub limit: u32,
}

/// Query parameters for [`Storage::list_users`]: substring over id and nickname.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub query: Option<String>,
    pub limit: u32,
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for the board.
///
/// All methods are `async` and return `Result<_, StorageError>`. Each call is
/// atomic on its own; no method spans a transaction across calls.
/// Implementations must be `Send + Sync + 'static` so they can be held in an
/// `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Users ---------------------------------------------------------------

    /// Insert a user. Returns [`StorageError::Conflict`] if the id is taken.
    async fn create_user(&self, user: &UserRecord) -> Result<(), StorageError>;

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Delete a user and all of their sessions. Posts and comments stay.
    /// Returns `false` if no such user existed.
    async fn delete_user(&self, id: &str) -> Result<bool, StorageError>;

    /// Users matching `filter`, newest first, at most `filter.limit` rows.
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<AdminUser>, StorageError>;

    // --- Sessions ------------------------------------------------------------

    async fn put_session(&self, session: &SessionRecord) -> Result<(), StorageError>;

    /// Look up a session joined with its user. Expiry is not checked here.
    async fn find_session(&self, sid: &str) -> Result<Option<SessionLookup>, StorageError>;

    /// Delete a session. No-op if absent.
    async fn delete_session(&self, sid: &str) -> Result<(), StorageError>;

    /// Delete every session with `expires_at <= now`; returns how many.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;

    // --- Posts ---------------------------------------------------------------

    /// Insert a post. Returns [`StorageError::Conflict`] on a duplicate `id`
    /// or a duplicate non-null `source_guid`.
    async fn insert_post(&self, post: &Post) -> Result<(), StorageError>;

    /// Insert a post unless one with the same `source_guid` already exists.
    /// Returns `true` if the post was inserted. An existing post is never
    /// modified.
    async fn insert_post_if_absent(&self, post: &Post) -> Result<bool, StorageError>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StorageError>;

    /// Posts on one board, pinned first, then newest first.
    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostSummary>, StorageError>;

    /// Delete a post together with its comments. Returns `false` if absent.
    async fn delete_post(&self, id: &str) -> Result<bool, StorageError>;

    /// Set the pinned flag. Returns `false` if the post does not exist.
    async fn set_post_pinned(&self, id: &str, pinned: bool) -> Result<bool, StorageError>;

    /// Posts written by `author_id`, newest first.
    async fn list_posts_by_author(
        &self,
        author_id: &str,
        limit: u32,
    ) -> Result<Vec<AdminPost>, StorageError>;

    // --- Comments ------------------------------------------------------------

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StorageError>;

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, StorageError>;

    /// Comments on a post, oldest first.
    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, StorageError>;

    /// Returns `false` if absent.
    async fn delete_comment(&self, id: &str) -> Result<bool, StorageError>;

    // --- Banners -------------------------------------------------------------

    async fn insert_banner(&self, banner: &Banner) -> Result<(), StorageError>;

    /// All banners, newest first.
    async fn list_banners(&self) -> Result<Vec<Banner>, StorageError>;

    /// Returns `false` if absent.
    async fn delete_banner(&self, id: &str) -> Result<bool, StorageError>;

    // --- Audit log -----------------------------------------------------------

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StorageError>;

    /// Delete entries created strictly before `cutoff`; returns how many.
    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(a) < format_timestamp(b));
        assert_eq!(format_timestamp(a), "2026-01-02T03:04:05.000Z");
        assert_eq!(parse_timestamp(&format_timestamp(b)).unwrap(), b);
    }

    #[test]
    fn audit_kind_roundtrip() {
        for kind in [
            AuditKind::Signup,
            AuditKind::Login,
            AuditKind::Post,
            AuditKind::Comment,
            AuditKind::Banner,
        ] {
            assert_eq!(kind.as_str().parse::<AuditKind>().unwrap(), kind);
        }
        assert!("nope".parse::<AuditKind>().is_err());
    }
}
