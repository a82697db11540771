//! Object storage for uploaded media.
//!
//! Objects are opaque bytes plus a content type, addressed by a
//! slash-separated key such as `u1/1767225600000_<uuid>.png`.
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryMediaStore`] | Tests, throwaway servers |
//! | [`FsMediaStore`] | Production; one file per object under a root directory |
//!
//! [`MemoryMediaStore`]: memory::MemoryMediaStore
//! [`FsMediaStore`]: fs::FsMediaStore

pub mod fs;
pub mod memory;
pub mod signing;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use tokio_util::io::ReaderStream;

const MAX_KEY_LEN: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("object not found")]
    NotFound,

    /// The key is empty, absolute, or escapes the store root.
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object payload: buffered bytes or an open file streamed on demand.
pub enum MediaBody {
    Bytes(Bytes),
    File(tokio::fs::File),
}

pub struct MediaObject {
    pub content_type: String,
    pub body: MediaBody,
}

impl MediaObject {
    pub fn into_body(self) -> Body {
        match self.body {
            MediaBody::Bytes(bytes) => Body::from(bytes),
            MediaBody::File(file) => Body::from_stream(ReaderStream::new(file)),
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    /// Store `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<(), MediaError>;

    async fn get(&self, key: &str) -> Result<Option<MediaObject>, MediaError>;

    async fn exists(&self, key: &str) -> Result<bool, MediaError>;
}

/// Reject keys that are empty, absolute, contain backslashes or NULs, or have
/// empty, `.` or `..` segments.
pub fn validate_key(key: &str) -> Result<(), MediaError> {
    let bad = key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(MediaError::InvalidKey(key.to_string()));
    }
    Ok(())
}
