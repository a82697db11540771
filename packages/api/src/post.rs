//! Post and comment types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A full post, as returned by `GET /api/posts/{id}`.
///
/// `author_nickname` is copied from the author at write time so the post
/// still renders after the account is deleted.
///
/// `media` is stored opaquely; clients send entries shaped like
/// `{"key": "...", "type": "image/png", "name": "a.png", "size": 1234}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub board: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub author_nickname: String,
    pub is_pinned: bool,
    #[serde(default)]
    pub media: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_guid: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Number of characters of `content` kept in [`PostSummary::excerpt`].
pub const EXCERPT_CHARS: usize = 180;

/// A post as it appears in board listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub board: String,
    pub title: String,
    pub excerpt: String,
    pub author_nickname: String,
    pub is_pinned: bool,
    pub created_at: String,
    #[serde(default)]
    pub media: Vec<Value>,
}

impl From<&Post> for PostSummary {
    fn from(p: &Post) -> Self {
        Self {
            id: p.id.clone(),
            board: p.board.clone(),
            title: p.title.clone(),
            excerpt: p.content.chars().take(EXCERPT_CHARS).collect(),
            author_nickname: p.author_nickname.clone(),
            is_pinned: p.is_pinned,
            created_at: p.created_at.clone(),
            media: p.media.clone(),
        }
    }
}

/// A comment on a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_nickname: String,
    pub content: String,
    pub created_at: String,
}

/// Body of `POST /api/posts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Anything that is not a JSON array is treated as "no media".
    #[serde(default)]
    pub media: Option<Value>,
}

/// Body of `POST /api/posts/{id}/pin`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinRequest {
    #[serde(default)]
    pub pinned: bool,
}

/// Body of `POST /api/posts/{id}/comments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
}

/// Payload of `GET /api/posts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostListBody {
    pub items: Vec<PostSummary>,
    pub count: usize,
}

/// Payload of `GET /api/posts/{id}`. Comments are oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostDetailBody {
    pub post: Post,
    pub comments: Vec<Comment>,
}
