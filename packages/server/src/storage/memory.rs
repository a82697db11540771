//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests, the conformance suite, and throwaway servers.
//!
//! Rows carry an insertion sequence number next to their timestamp so that
//! rows created within the same millisecond still order deterministically,
//! the way SQLite's `rowid` breaks ties in [`super::sqlite`].

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hanboard_api::{AdminPost, AdminUser, Banner, Comment, Post, PostSummary};

use super::{
    format_timestamp, AuditEntry, PostFilter, SessionLookup, SessionRecord, Storage,
    StorageError, UserFilter, UserRecord,
};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    seq: u64,
    users: HashMap<String, (u64, UserRecord)>,
    sessions: HashMap<String, SessionRecord>,
    posts: HashMap<String, (u64, Post)>,
    comments: HashMap<String, (u64, Comment)>,
    banners: HashMap<String, (u64, Banner)>,
    audit: Vec<AuditEntry>,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Storage`].
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the audit log in append order.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.read().audit.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for MemoryStorage {
    // --- Users ---------------------------------------------------------------

    async fn create_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.users.contains_key(&user.id) {
            return Err(StorageError::Conflict(format!("user {} already exists", user.id)));
        }
        let seq = inner.next_seq();
        inner.users.insert(user.id.clone(), (seq, user.clone()));
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.read().users.get(id).map(|(_, u)| u.clone()))
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StorageError> {
        let mut inner = self.write();
        let existed = inner.users.remove(id).is_some();
        inner.sessions.retain(|_, s| s.user_id != id);
        Ok(existed)
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<AdminUser>, StorageError> {
        let inner = self.read();
        let needle = filter.query.as_deref().map(str::to_lowercase);

        let mut rows: Vec<&(u64, UserRecord)> = inner
            .users
            .values()
            .filter(|(_, u)| match &needle {
                Some(q) => contains_ci(&u.id, q) || contains_ci(&u.nickname, q),
                None => true,
            })
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));

        Ok(rows
            .into_iter()
            .take(filter.limit as usize)
            .map(|(_, u)| AdminUser {
                id: u.id.clone(),
                nickname: u.nickname.clone(),
                role: u.role,
                created_at: format_timestamp(u.created_at),
            })
            .collect())
    }

    // --- Sessions ------------------------------------------------------------

    async fn put_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.sessions.contains_key(&session.sid) {
            return Err(StorageError::Conflict("session id collision".into()));
        }
        inner.sessions.insert(session.sid.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, sid: &str) -> Result<Option<SessionLookup>, StorageError> {
        let inner = self.read();
        let Some(session) = inner.sessions.get(sid) else {
            return Ok(None);
        };
        // Inner join: a session whose user is gone resolves to nothing.
        Ok(inner.users.get(&session.user_id).map(|(_, user)| SessionLookup {
            session: session.clone(),
            nickname: user.nickname.clone(),
            role: user.role,
        }))
    }

    async fn delete_session(&self, sid: &str) -> Result<(), StorageError> {
        self.write().sessions.remove(sid);
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut inner = self.write();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }

    // --- Posts ---------------------------------------------------------------

    async fn insert_post(&self, post: &Post) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.posts.contains_key(&post.id) {
            return Err(StorageError::Conflict(format!("post {} already exists", post.id)));
        }
        if let Some(guid) = &post.source_guid {
            if inner
                .posts
                .values()
                .any(|(_, p)| p.source_guid.as_ref() == Some(guid))
            {
                return Err(StorageError::Conflict(format!("source_guid {guid} already imported")));
            }
        }
        let seq = inner.next_seq();
        inner.posts.insert(post.id.clone(), (seq, post.clone()));
        Ok(())
    }

    async fn insert_post_if_absent(&self, post: &Post) -> Result<bool, StorageError> {
        match self.insert_post(post).await {
            Ok(()) => Ok(true),
            Err(StorageError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StorageError> {
        Ok(self.read().posts.get(id).map(|(_, p)| p.clone()))
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostSummary>, StorageError> {
        let inner = self.read();
        let needle = filter.query.as_deref().map(str::to_lowercase);

        let mut rows: Vec<&(u64, Post)> = inner
            .posts
            .values()
            .filter(|(_, p)| p.board == filter.board)
            .filter(|(_, p)| match &needle {
                Some(q) => {
                    contains_ci(&p.title, q)
                        || contains_ci(&p.content, q)
                        || contains_ci(&p.author_nickname, q)
                }
                None => true,
            })
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then(sb.cmp(sa))
        });

        Ok(rows
            .into_iter()
            .take(filter.limit as usize)
            .map(|(_, p)| PostSummary::from(p))
            .collect())
    }

    async fn delete_post(&self, id: &str) -> Result<bool, StorageError> {
        let mut inner = self.write();
        if inner.posts.remove(id).is_none() {
            return Ok(false);
        }
        inner.comments.retain(|_, (_, c)| c.post_id != id);
        Ok(true)
    }

    async fn set_post_pinned(&self, id: &str, pinned: bool) -> Result<bool, StorageError> {
        let mut inner = self.write();
        match inner.posts.get_mut(id) {
            Some((_, post)) => {
                post.is_pinned = pinned;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_posts_by_author(
        &self,
        author_id: &str,
        limit: u32,
    ) -> Result<Vec<AdminPost>, StorageError> {
        let inner = self.read();
        let mut rows: Vec<&(u64, Post)> = inner
            .posts
            .values()
            .filter(|(_, p)| p.author_id == author_id)
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));

        Ok(rows
            .into_iter()
            .take(limit as usize)
            .map(|(_, p)| AdminPost {
                id: p.id.clone(),
                board: p.board.clone(),
                title: p.title.clone(),
                created_at: p.created_at.clone(),
                is_pinned: p.is_pinned,
            })
            .collect())
    }

    // --- Comments ------------------------------------------------------------

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.comments.contains_key(&comment.id) {
            return Err(StorageError::Conflict(format!(
                "comment {} already exists",
                comment.id
            )));
        }
        let seq = inner.next_seq();
        inner.comments.insert(comment.id.clone(), (seq, comment.clone()));
        Ok(())
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, StorageError> {
        Ok(self.read().comments.get(id).map(|(_, c)| c.clone()))
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, StorageError> {
        let inner = self.read();
        let mut rows: Vec<&(u64, Comment)> = inner
            .comments
            .values()
            .filter(|(_, c)| c.post_id == post_id)
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| a.created_at.cmp(&b.created_at).then(sa.cmp(sb)));
        Ok(rows.into_iter().map(|(_, c)| c.clone()).collect())
    }

    async fn delete_comment(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.write().comments.remove(id).is_some())
    }

    // --- Banners -------------------------------------------------------------

    async fn insert_banner(&self, banner: &Banner) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.banners.contains_key(&banner.id) {
            return Err(StorageError::Conflict(format!("banner {} already exists", banner.id)));
        }
        let seq = inner.next_seq();
        inner.banners.insert(banner.id.clone(), (seq, banner.clone()));
        Ok(())
    }

    async fn list_banners(&self) -> Result<Vec<Banner>, StorageError> {
        let inner = self.read();
        let mut rows: Vec<&(u64, Banner)> = inner.banners.values().collect();
        rows.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(rows.into_iter().map(|(_, b)| b.clone()).collect())
    }

    async fn delete_banner(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.write().banners.remove(id).is_some())
    }

    // --- Audit log -----------------------------------------------------------

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StorageError> {
        self.write().audit.push(entry.clone());
        Ok(())
    }

    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut inner = self.write();
        let before = inner.audit.len();
        inner.audit.retain(|e| e.created_at >= cutoff);
        Ok((before - inner.audit.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
