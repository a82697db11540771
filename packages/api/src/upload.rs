//! Signed upload types for `POST /api/upload/sign`.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/upload/sign`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignUploadRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
}

/// Payload of `POST /api/upload/sign`.
///
/// The client `PUT`s the file body to `url` with the same `Content-Type`
/// before the URL expires, then references `key` from a post or banner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignUploadBody {
    pub key: String,
    pub url: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
}
