//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! - `users`: accounts with base64 salt/hash.
//! - `sessions`: bearer tokens; cascade-deleted with their user.
//! - `posts`: board posts; `media_json` holds the opaque media list and
//!   `source_guid` is unique so feed imports are insert-once.
//! - `comments`: cascade-deleted with their post.
//! - `banners`: admin-managed banners.
//! - `ip_logs`: the append-only audit log.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (see
//! [`super::format_timestamp`]), so `ORDER BY created_at` and `<` comparisons
//! are chronological. `rowid` breaks ties within one millisecond.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hanboard_api::{AdminPost, AdminUser, Banner, Comment, Post, PostSummary, Role};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::warn;

use super::{
    format_timestamp, AuditEntry, PostFilter, SessionLookup, SessionRecord, Storage,
    StorageError, UserFilter, UserRecord,
};
use crate::credentials::PasswordHash;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    nickname    TEXT NOT NULL,
    role        TEXT NOT NULL DEFAULT 'user',
    pass_salt   TEXT NOT NULL,
    pass_hash   TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);

CREATE TABLE IF NOT EXISTS sessions (
    sid         TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_user       ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);

CREATE TABLE IF NOT EXISTS posts (
    id              TEXT PRIMARY KEY,
    board           TEXT NOT NULL,
    title           TEXT NOT NULL,
    content         TEXT NOT NULL,
    author_id       TEXT NOT NULL,
    author_nickname TEXT NOT NULL,
    media_json      TEXT NOT NULL DEFAULT '[]',
    is_pinned       INTEGER NOT NULL DEFAULT 0,
    source_url      TEXT,
    source_guid     TEXT UNIQUE,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_board   ON posts(board, is_pinned, created_at);
CREATE INDEX IF NOT EXISTS idx_posts_author  ON posts(author_id);

CREATE TABLE IF NOT EXISTS comments (
    id              TEXT PRIMARY KEY,
    post_id         TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    author_id       TEXT NOT NULL,
    author_nickname TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);

CREATE TABLE IF NOT EXISTS banners (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    link        TEXT NOT NULL,
    media_key   TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ip_logs (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    ref_id      TEXT,
    ip          TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ip_logs_created_at ON ip_logs(created_at);
";

const POST_COLUMNS: &str = "id, board, title, content, author_id, author_nickname, is_pinned, \
     media_json, source_url, source_guid, created_at, updated_at";

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Storage`].
///
/// Holds a single database connection protected by a `Mutex`. All operations
/// run inside `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn call<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|p| p.into_inner());
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Error conversions
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StorageError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation => {
            StorageError::Conflict(e.to_string())
        }
        _ => StorageError::Internal(e.to_string()),
    }
}

fn map_json_err(e: serde_json::Error) -> StorageError {
    StorageError::Internal(format!("JSON error: {e}"))
}

fn conversion_err(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn role_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    raw.parse::<Role>().map_err(|e| conversion_err(idx, e))
}

/// `%q%` with LIKE metacharacters escaped (used with `ESCAPE '\'`).
fn like_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn read_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        nickname: row.get(1)?,
        role: role_column(row, 2)?,
        password: PasswordHash {
            salt: row.get(3)?,
            hash: row.get(4)?,
        },
        created_at: ts_column(row, 5)?,
    })
}

/// Expects the columns of [`POST_COLUMNS`] in order.
fn read_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    let id: String = row.get(0)?;
    let media_json: String = row.get(7)?;
    let media = serde_json::from_str(&media_json).unwrap_or_else(|e| {
        warn!("corrupt media_json on post {id}: {e}");
        vec![]
    });
    Ok(Post {
        id,
        board: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        author_id: row.get(4)?,
        author_nickname: row.get(5)?,
        is_pinned: row.get::<_, i64>(6)? != 0,
        media,
        source_url: row.get(8)?,
        source_guid: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn read_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_nickname: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// ---------------------------------------------------------------------------
// Dynamic query parameter helper
// ---------------------------------------------------------------------------

/// Typed SQL parameter for building dynamic WHERE clauses.
enum SqlParam {
    Text(String),
    Integer(i64),
}

impl rusqlite::ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        match self {
            SqlParam::Text(s) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
            SqlParam::Integer(i) => Ok(ToSqlOutput::Borrowed(ValueRef::Integer(*i))),
        }
    }
}

fn insert_post_sql(conn: &Connection, verb: &str, post: &Post) -> Result<usize, StorageError> {
    let media_json = serde_json::to_string(&post.media).map_err(map_json_err)?;
    conn.execute(
        &format!(
            "{verb} INTO posts ({POST_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            post.id,
            post.board,
            post.title,
            post.content,
            post.author_id,
            post.author_nickname,
            post.is_pinned as i64,
            media_json,
            post.source_url,
            post.source_guid,
            post.created_at,
            post.updated_at,
        ],
    )
    .map_err(map_err)
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for SqliteStorage {
    // --- Users ---------------------------------------------------------------

    async fn create_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let user = user.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, nickname, role, pass_salt, pass_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id,
                    user.nickname,
                    user.role.as_str(),
                    user.password.salt,
                    user.password.hash,
                    format_timestamp(user.created_at),
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, nickname, role, pass_salt, pass_hash, created_at
                 FROM users WHERE id = ?1",
                params![id],
                read_user,
            )
            .optional()
            .map_err(map_err)
        })
        .await
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            let n = conn
                .execute("DELETE FROM users WHERE id = ?1", params![id])
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<AdminUser>, StorageError> {
        let filter = filter.clone();
        self.call(move |conn| {
            let mut sql = String::from("SELECT id, nickname, role, created_at FROM users");
            let mut params_vec: Vec<SqlParam> = Vec::new();

            if let Some(q) = &filter.query {
                sql.push_str(" WHERE id LIKE ?1 ESCAPE '\\' OR nickname LIKE ?1 ESCAPE '\\'");
                params_vec.push(SqlParam::Text(like_pattern(q)));
            }
            sql.push_str(&format!(
                " ORDER BY created_at DESC, rowid DESC LIMIT ?{}",
                params_vec.len() + 1
            ));
            params_vec.push(SqlParam::Integer(filter.limit as i64));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

            let mut stmt = conn.prepare(&sql).map_err(map_err)?;
            let rows = stmt
                .query_map(params_refs.as_slice(), |row| {
                    Ok(AdminUser {
                        id: row.get(0)?,
                        nickname: row.get(1)?,
                        role: role_column(row, 2)?,
                        created_at: row.get(3)?,
                    })
                })
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            Ok(rows)
        })
        .await
    }

    // --- Sessions ------------------------------------------------------------

    async fn put_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let session = session.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (sid, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.sid,
                    session.user_id,
                    format_timestamp(session.expires_at),
                    format_timestamp(session.created_at),
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn find_session(&self, sid: &str) -> Result<Option<SessionLookup>, StorageError> {
        let sid = sid.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT s.sid, s.user_id, s.expires_at, s.created_at, u.nickname, u.role
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.sid = ?1",
                params![sid],
                |row| {
                    Ok(SessionLookup {
                        session: SessionRecord {
                            sid: row.get(0)?,
                            user_id: row.get(1)?,
                            expires_at: ts_column(row, 2)?,
                            created_at: ts_column(row, 3)?,
                        },
                        nickname: row.get(4)?,
                        role: role_column(row, 5)?,
                    })
                },
            )
            .optional()
            .map_err(map_err)
        })
        .await
    }

    async fn delete_session(&self, sid: &str) -> Result<(), StorageError> {
        let sid = sid.to_string();
        self.call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE sid = ?1", params![sid])
                .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let now = format_timestamp(now);
        self.call(move |conn| {
            let n = conn
                .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
                .map_err(map_err)?;
            Ok(n as u64)
        })
        .await
    }

    // --- Posts ---------------------------------------------------------------

    async fn insert_post(&self, post: &Post) -> Result<(), StorageError> {
        let post = post.clone();
        self.call(move |conn| insert_post_sql(conn, "INSERT", &post).map(|_| ()))
            .await
    }

    async fn insert_post_if_absent(&self, post: &Post) -> Result<bool, StorageError> {
        let post = post.clone();
        self.call(move |conn| insert_post_sql(conn, "INSERT OR IGNORE", &post).map(|n| n > 0))
            .await
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                read_post,
            )
            .optional()
            .map_err(map_err)
        })
        .await
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostSummary>, StorageError> {
        let filter = filter.clone();
        self.call(move |conn| {
            let mut sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE board = ?1");
            let mut params_vec: Vec<SqlParam> = vec![SqlParam::Text(filter.board.clone())];

            if let Some(q) = &filter.query {
                sql.push_str(
                    " AND (title LIKE ?2 ESCAPE '\\'
                        OR content LIKE ?2 ESCAPE '\\'
                        OR author_nickname LIKE ?2 ESCAPE '\\')",
                );
                params_vec.push(SqlParam::Text(like_pattern(q)));
            }

            sql.push_str(&format!(
                " ORDER BY is_pinned DESC, created_at DESC, rowid DESC LIMIT ?{}",
                params_vec.len() + 1
            ));
            params_vec.push(SqlParam::Integer(filter.limit as i64));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

            let mut stmt = conn.prepare(&sql).map_err(map_err)?;
            let posts = stmt
                .query_map(params_refs.as_slice(), read_post)
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;

            Ok(posts.iter().map(PostSummary::from).collect())
        })
        .await
    }

    async fn delete_post(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            let n = conn
                .execute("DELETE FROM posts WHERE id = ?1", params![id])
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn set_post_pinned(&self, id: &str, pinned: bool) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            let n = conn
                .execute(
                    "UPDATE posts SET is_pinned = ?1 WHERE id = ?2",
                    params![pinned as i64, id],
                )
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn list_posts_by_author(
        &self,
        author_id: &str,
        limit: u32,
    ) -> Result<Vec<AdminPost>, StorageError> {
        let author_id = author_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, board, title, created_at, is_pinned FROM posts
                     WHERE author_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                )
                .map_err(map_err)?;
            let rows = stmt
                .query_map(params![author_id, limit as i64], |row| {
                    Ok(AdminPost {
                        id: row.get(0)?,
                        board: row.get(1)?,
                        title: row.get(2)?,
                        created_at: row.get(3)?,
                        is_pinned: row.get::<_, i64>(4)? != 0,
                    })
                })
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            Ok(rows)
        })
        .await
    }

    // --- Comments ------------------------------------------------------------

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StorageError> {
        let c = comment.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, author_nickname, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![c.id, c.post_id, c.author_id, c.author_nickname, c.content, c.created_at],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, post_id, author_id, author_nickname, content, created_at
                 FROM comments WHERE id = ?1",
                params![id],
                read_comment,
            )
            .optional()
            .map_err(map_err)
        })
        .await
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, StorageError> {
        let post_id = post_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, post_id, author_id, author_nickname, content, created_at
                     FROM comments WHERE post_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(map_err)?;
            let rows = stmt
                .query_map(params![post_id], read_comment)
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            Ok(rows)
        })
        .await
    }

    async fn delete_comment(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            let n = conn
                .execute("DELETE FROM comments WHERE id = ?1", params![id])
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    // --- Banners -------------------------------------------------------------

    async fn insert_banner(&self, banner: &Banner) -> Result<(), StorageError> {
        let b = banner.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO banners (id, title, link, media_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![b.id, b.title, b.link, b.media_key, b.created_at],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn list_banners(&self) -> Result<Vec<Banner>, StorageError> {
        self.call(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, link, media_key, created_at FROM banners
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(map_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Banner {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        link: row.get(2)?,
                        media_key: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            Ok(rows)
        })
        .await
    }

    async fn delete_banner(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.call(move |conn| {
            let n = conn
                .execute("DELETE FROM banners WHERE id = ?1", params![id])
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    // --- Audit log -----------------------------------------------------------

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StorageError> {
        let e = entry.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO ip_logs (id, kind, ref_id, ip, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    e.id,
                    e.kind.as_str(),
                    e.ref_id,
                    e.ip,
                    format_timestamp(e.created_at)
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let cutoff = format_timestamp(cutoff);
        self.call(move |conn| {
            let n = conn
                .execute("DELETE FROM ip_logs WHERE created_at < ?1", params![cutoff])
                .map_err(map_err)?;
            Ok(n as u64)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
