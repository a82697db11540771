//! Filesystem media store.
//!
//! Layout under the root directory:
//!
//! ```text
//! objects/<key>   object bytes
//! types/<key>     content type, UTF-8 text
//! ```
//!
//! Object bytes are written to a temporary sibling and renamed into place, so
//! a reader never sees a partial object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{validate_key, MediaBody, MediaError, MediaObject, MediaStore};

pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    /// Use `root` as the store directory, creating it if necessary.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, MediaError> {
        let root = root.into();
        fs::create_dir_all(root.join("objects")).await?;
        fs::create_dir_all(root.join("types")).await?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn type_path(&self, key: &str) -> PathBuf {
        self.root.join("types").join(key)
    }
}

/// Only regular files are objects; a key naming a directory of other keys is
/// absent.
async fn is_object(path: &Path) -> Result<bool, MediaError> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn ensure_parent(path: &Path) -> Result<(), MediaError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<(), MediaError> {
        validate_key(key)?;
        let object = self.object_path(key);
        let ctype = self.type_path(key);
        ensure_parent(&object).await?;
        ensure_parent(&ctype).await?;

        fs::write(&ctype, content_type.as_bytes()).await?;

        let tmp = object.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, &body).await?;
        if let Err(e) = fs::rename(&tmp, &object).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<MediaObject>, MediaError> {
        validate_key(key)?;
        let path = self.object_path(key);
        if !is_object(&path).await? {
            return Ok(None);
        }
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match fs::read_to_string(self.type_path(key)).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                "application/octet-stream".to_string()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(MediaObject {
            content_type,
            body: MediaBody::File(file),
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool, MediaError> {
        validate_key(key)?;
        is_object(&self.object_path(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("hanboard-media-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn put_get_roundtrip_on_disk() {
        let dir = scratch_dir();
        let store = FsMediaStore::open(&dir).await.unwrap();

        store
            .put("u1/1_clip.mp4", "video/mp4", Bytes::from_static(b"frames"))
            .await
            .unwrap();
        assert!(store.exists("u1/1_clip.mp4").await.unwrap());

        let obj = store.get("u1/1_clip.mp4").await.unwrap().unwrap();
        assert_eq!(obj.content_type, "video/mp4");
        let MediaBody::File(mut file) = obj.body else {
            panic!("fs store returned buffered bytes");
        };
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"frames");

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn absent_object_is_none() {
        let dir = scratch_dir();
        let store = FsMediaStore::open(&dir).await.unwrap();
        assert!(store.get("u1/missing.png").await.unwrap().is_none());
        assert!(!store.exists("u1/missing.png").await.unwrap());
        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn key_prefix_directory_is_not_an_object() {
        let dir = scratch_dir();
        let store = FsMediaStore::open(&dir).await.unwrap();
        store
            .put("u1/1_a.png", "image/png", Bytes::from_static(b"png"))
            .await
            .unwrap();

        assert!(!store.exists("u1").await.unwrap());
        assert!(store.get("u1").await.unwrap().is_none());
        assert!(store.exists("u1/1_a.png").await.unwrap());
        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn traversal_never_touches_the_filesystem() {
        let dir = scratch_dir();
        let store = FsMediaStore::open(&dir).await.unwrap();
        let err = store
            .put("../escape.txt", "text/plain", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidKey(_)));
        assert!(!dir.join("escape.txt").exists());
        assert!(!dir.join("objects").join("..").join("escape.txt").exists());
        fs::remove_dir_all(&dir).await.unwrap();
    }
}
