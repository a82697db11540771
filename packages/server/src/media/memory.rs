//! In-memory media store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::{validate_key, MediaBody, MediaError, MediaObject, MediaStore};

#[derive(Default)]
pub struct MemoryMediaStore {
    objects: RwLock<HashMap<String, (String, Bytes)>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<(), MediaError> {
        validate_key(key)?;
        self.objects
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), (content_type.to_string(), body));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<MediaObject>, MediaError> {
        validate_key(key)?;
        let objects = self.objects.read().unwrap_or_else(|p| p.into_inner());
        Ok(objects.get(key).map(|(content_type, body)| MediaObject {
            content_type: content_type.clone(),
            body: MediaBody::Bytes(body.clone()),
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool, MediaError> {
        validate_key(key)?;
        Ok(self
            .objects
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(key))
    }
}
