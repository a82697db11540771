//! Request and response types for the hanboard HTTP API.
//!
//! Every success body is an [`Envelope`] (`{"ok": true, ...}`) and every
//! failure body is an [`ErrorResponse`] (`{"ok": false, "error": "..."}`).
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | POST | `/api/auth/signup` | [`SignupRequest`] → [`UserBody`] |
//! | POST | `/api/auth/login` | [`LoginRequest`] → [`UserBody`] |
//! | POST | `/api/auth/logout` | → [`Ack`] |
//! | GET | `/api/me` | → [`MeBody`] |
//! | GET | `/api/posts` | → [`PostListBody`] |
//! | GET | `/api/posts/{id}` | → [`PostDetailBody`] |
//! | POST | `/api/posts` | [`CreatePostRequest`] → [`CreatedBody`] |
//! | DELETE | `/api/posts/{id}` | → [`Ack`] |
//! | POST | `/api/posts/{id}/pin` | [`PinRequest`] → [`Ack`] |
//! | POST | `/api/posts/{id}/comments` | [`CreateCommentRequest`] → [`CreatedBody`] |
//! | DELETE | `/api/comments/{id}` | → [`Ack`] |
//! | GET | `/api/banners` | → [`ItemsBody<Banner>`] |
//! | POST | `/api/banners` | [`CreateBannerRequest`] → [`CreatedBody`] |
//! | DELETE | `/api/banners/{id}` | → [`Ack`] |
//! | GET | `/api/admin/users` | → [`ItemsBody<AdminUser>`] |
//! | DELETE | `/api/admin/users/{id}` | → [`Ack`] |
//! | GET | `/api/admin/users/{id}/posts` | → [`ItemsBody<AdminPost>`] |
//! | POST | `/api/upload/sign` | [`SignUploadRequest`] → [`SignUploadBody`] |

pub mod admin;
pub mod auth;
pub mod banner;
pub mod envelope;
pub mod error;
pub mod post;
pub mod upload;

pub use admin::{AdminPost, AdminUser};
pub use auth::{LoginRequest, MeBody, PublicUser, Role, SignupRequest, UserBody};
pub use banner::{Banner, CreateBannerRequest};
pub use envelope::{Ack, CreatedBody, Envelope, ItemsBody};
pub use error::ErrorResponse;
pub use post::{
    Comment, CreateCommentRequest, CreatePostRequest, PinRequest, Post, PostDetailBody,
    PostListBody, PostSummary,
};
pub use upload::{SignUploadBody, SignUploadRequest};
