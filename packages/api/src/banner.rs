//! Banner (advertising slot) types.

use serde::{Deserialize, Serialize};

/// An admin-managed banner pointing at an uploaded media object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Banner {
    pub id: String,
    pub title: String,
    pub link: String,
    pub media_key: String,
    pub created_at: String,
}

/// Body of `POST /api/banners`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBannerRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, rename = "mediaKey")]
    pub media_key: String,
}
