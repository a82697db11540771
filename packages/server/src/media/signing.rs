//! HMAC-signed, expiring upload URLs.
//!
//! A signed URL authorises exactly one `PUT` of one key with one content
//! type until `expires` (unix seconds):
//!
//! ```text
//! {public_url}/storage/{key}?ct={content_type}&expires={unix}&signature={hex}
//! ```
//!
//! The signature is HMAC-SHA256 over `PUT\n{key}\n{content_type}\n{expires}`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid upload signature")]
    Invalid,
    #[error("upload URL expired")]
    Expired,
}

/// Signs and verifies upload URLs with a server-held secret.
#[derive(Clone)]
pub struct UploadSigner {
    secret: Vec<u8>,
    public_url: String,
    ttl: Duration,
}

impl UploadSigner {
    pub fn new(secret: &str, public_url: &str, ttl: Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            public_url: public_url.trim_end_matches('/').to_string(),
            ttl,
        }
    }

    fn mac(&self, key: &str, content_type: &str, expires: i64) -> HmacSha256 {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC key of any length is valid"));
        mac.update(format!("PUT\n{key}\n{content_type}\n{expires}").as_bytes());
        mac
    }

    pub fn signature(&self, key: &str, content_type: &str, expires: i64) -> String {
        hex::encode(self.mac(key, content_type, expires).finalize().into_bytes())
    }

    /// Build a URL for uploading `key` that stays valid for the signer's TTL.
    pub fn signed_url(&self, key: &str, content_type: &str, now: DateTime<Utc>) -> String {
        let expires = (now + self.ttl).timestamp();
        let signature = self.signature(key, content_type, expires);
        let path = key
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/storage/{path}?ct={}&expires={expires}&signature={signature}",
            self.public_url,
            urlencoding::encode(content_type),
        )
    }

    /// Check a presented signature. The comparison is constant-time; the
    /// URL is dead once `now >= expires`.
    pub fn verify(
        &self,
        key: &str,
        content_type: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let presented = hex::decode(signature).map_err(|_| SignatureError::Invalid)?;
        self.mac(key, content_type, expires)
            .verify_slice(&presented)
            .map_err(|_| SignatureError::Invalid)?;
        if now.timestamp() >= expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }
}
