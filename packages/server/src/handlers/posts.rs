//! Post handlers: listing, reading, writing, deleting and pinning posts.

use axum::{
    extract::{Path, State},
    response::Response,
};
use hanboard_api::{
    Ack, CreatePostRequest, CreatedBody, PinRequest, Post, PostDetailBody, PostListBody,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    error::AppError,
    middleware::{
        auth::{require_owner_or_admin, RequireAdmin, RequireUser},
        client_ip::ClientIp,
    },
    storage::{AuditKind, PostFilter},
};

use super::{new_id, now_timestamp, ok, AppState, JsonBody, JsonQuery};

pub const DEFAULT_BOARD: &str = "free";

/// Query parameters for `GET /api/posts`.
///
/// Everything arrives as text so a malformed `limit` falls back to the
/// default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub board: Option<String>,
    pub q: Option<String>,
    pub limit: Option<String>,
}

/// `GET /api/posts?board=&q=&limit=`
pub async fn list(
    State(state): State<AppState>,
    JsonQuery(params): JsonQuery<ListParams>,
) -> Result<Response, AppError> {
    let board = params
        .board
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BOARD)
        .to_lowercase();
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(String::from);
    let limit = params
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<i64>().ok())
        .unwrap_or(state.config.post_list_default as i64)
        .clamp(1, state.config.post_list_max as i64) as u32;

    let items = state
        .storage
        .list_posts(&PostFilter { board, query, limit })
        .await?;
    let count = items.len();
    Ok(ok(PostListBody { items, count }))
}

/// `GET /api/posts/{id}`: the post with its comments, oldest first.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let post = state
        .storage
        .get_post(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("post not found".into()))?;
    let comments = state.storage.list_comments(&id).await?;
    Ok(ok(PostDetailBody { post, comments }))
}

/// `POST /api/posts`
pub async fn create(
    State(state): State<AppState>,
    RequireUser(session): RequireUser,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> Result<Response, AppError> {
    let board = req
        .board
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BOARD)
        .to_lowercase();
    if !state.config.is_board(&board) {
        return Err(AppError::BadRequest(format!("unknown board: {board}")));
    }

    let title = req.title.trim();
    let content = req.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::BadRequest("title and content are required".into()));
    }

    let media = match req.media {
        Some(Value::Array(items)) => items,
        _ => vec![],
    };

    let now = now_timestamp();
    let post = Post {
        id: new_id("post"),
        board,
        title: title.to_string(),
        content: content.to_string(),
        author_id: session.user_id.clone(),
        author_nickname: session.nickname.clone(),
        is_pinned: false,
        media,
        source_url: None,
        source_guid: None,
        created_at: now.clone(),
        updated_at: now,
    };
    state.storage.insert_post(&post).await?;
    state.audit(AuditKind::Post, Some(&post.id), &ip).await?;
    info!(post = %post.id, board = %post.board, author = %post.author_id, "post created");

    Ok(ok(CreatedBody { id: post.id }))
}

/// `DELETE /api/posts/{id}`: author or admin. Comments go with the post.
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(session): RequireUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let post = state
        .storage
        .get_post(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("post not found".into()))?;
    require_owner_or_admin(Some(&session), &post.author_id)?;

    state.storage.delete_post(&id).await?;
    info!(post = %id, by = %session.user_id, "post deleted");
    Ok(ok(Ack {}))
}

/// `POST /api/posts/{id}/pin`: admin only; setting the current value is a no-op.
pub async fn pin(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<PinRequest>,
) -> Result<Response, AppError> {
    if !state.storage.set_post_pinned(&id, req.pinned).await? {
        return Err(AppError::NotFound("post not found".into()));
    }
    Ok(ok(Ack {}))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use super::super::test_support::*;

    async fn create_post(app: &axum::Router, cookie: &str, body: Value) -> String {
        let (status, resp, _) = send(app, "POST", "/api/posts", Some(cookie), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{resp}");
        resp["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_then_read_back() {
        let state = test_state();
        let app = app(&state);
        let cookie = login_as(&app, "u1", None).await;

        let media = json!([{ "key": "u1/1_a.png", "type": "image/png", "name": "a.png", "size": 3 }]);
        let id = create_post(
            &app,
            &cookie,
            json!({ "board": "Free", "title": "  hi ", "content": "body", "media": media }),
        )
        .await;
        assert!(id.starts_with("post_"));

        let (status, body, _) = send(&app, "GET", &format!("/api/posts/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["board"], "free");
        assert_eq!(body["post"]["title"], "hi");
        assert_eq!(body["post"]["author_nickname"], "nick-u1");
        assert_eq!(body["post"]["media"], media);
        assert_eq!(body["comments"], json!([]));

        let (_, list, _) = send(&app, "GET", "/api/posts?board=free", None, None).await;
        assert_eq!(list["count"], 1);
        assert_eq!(list["items"][0]["excerpt"], "body");
    }

    #[tokio::test]
    async fn create_requires_login_and_valid_fields() {
        let state = test_state();
        let app = app(&state);

        let (status, _, _) = send(
            &app,
            "POST",
            "/api/posts",
            None,
            Some(json!({ "title": "t", "content": "c" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let cookie = login_as(&app, "u1", None).await;
        for body in [
            json!({ "title": " ", "content": "c" }),
            json!({ "title": "t", "content": "" }),
            json!({ "board": "nope", "title": "t", "content": "c" }),
        ] {
            let (status, _, _) = send(&app, "POST", "/api/posts", Some(&cookie), Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }

        // Non-list media is dropped, board defaults to free.
        let id = create_post(
            &app,
            &cookie,
            json!({ "title": "t", "content": "c", "media": "oops" }),
        )
        .await;
        let (_, body, _) = send(&app, "GET", &format!("/api/posts/{id}"), None, None).await;
        assert_eq!(body["post"]["board"], "free");
        assert_eq!(body["post"]["media"], json!([]));
    }

    #[tokio::test]
    async fn missing_post_is_404() {
        let state = test_state();
        let app = app(&state);
        let (status, body, _) = send(&app, "GET", "/api/posts/post_missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn only_author_or_admin_may_delete() {
        let state = test_state();
        let app = app(&state);
        let author = login_as(&app, "u1", None).await;
        let other = login_as(&app, "u2", None).await;
        let admin = login_as(&app, "admin_x", Some("letmein")).await;

        let id = create_post(&app, &author, json!({ "title": "t", "content": "c" })).await;
        let path = format!("/api/posts/{id}");

        let (status, _, _) = send(&app, "DELETE", &path, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _, _) = send(&app, "GET", &path, None, None).await;
        assert_eq!(status, StatusCode::OK, "post must survive a forbidden delete");

        let (status, _, _) = send(&app, "DELETE", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(&app, "GET", &path, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(&app, "DELETE", &path, Some(&author), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pinned_posts_list_first_and_pin_is_idempotent() {
        let state = test_state();
        let app = app(&state);
        let user = login_as(&app, "u1", None).await;
        let admin = login_as(&app, "admin_x", Some("letmein")).await;

        let first = create_post(&app, &user, json!({ "title": "first", "content": "c" })).await;
        let second = create_post(&app, &user, json!({ "title": "second", "content": "c" })).await;

        let pin_uri = format!("/api/posts/{first}/pin");
        let (status, _, _) = send(&app, "POST", &pin_uri, Some(&user), Some(json!({ "pinned": true }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        for _ in 0..2 {
            let (status, _, _) =
                send(&app, "POST", &pin_uri, Some(&admin), Some(json!({ "pinned": true }))).await;
            assert_eq!(status, StatusCode::OK);
            let (_, list, _) = send(&app, "GET", "/api/posts", None, None).await;
            let ids: Vec<&str> = list["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|p| p["id"].as_str().unwrap())
                .collect();
            assert_eq!(ids, vec![first.as_str(), second.as_str()]);
            assert_eq!(list["items"][0]["is_pinned"], true);
        }

        let (status, _, _) = send(
            &app,
            "POST",
            "/api/posts/post_missing/pin",
            Some(&admin),
            Some(json!({ "pinned": true })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_limits_and_search() {
        let state = test_state();
        let app = app(&state);
        let cookie = login_as(&app, "u1", None).await;
        for i in 0..3 {
            create_post(&app, &cookie, json!({ "title": format!("Apple {i}"), "content": "c" })).await;
        }
        create_post(&app, &cookie, json!({ "title": "banana", "content": "c", "board": "jobs" })).await;

        let (_, list, _) = send(&app, "GET", "/api/posts?limit=2", None, None).await;
        assert_eq!(list["count"], 2);
        let (_, list, _) = send(&app, "GET", "/api/posts?limit=0", None, None).await;
        assert_eq!(list["count"], 1);
        let (_, list, _) = send(&app, "GET", "/api/posts?limit=abc", None, None).await;
        assert_eq!(list["count"], 3);

        let (_, list, _) = send(&app, "GET", "/api/posts?q=%20apple%20", None, None).await;
        assert_eq!(list["count"], 3);
        let (_, list, _) = send(&app, "GET", "/api/posts?board=JOBS&q=BAN", None, None).await;
        assert_eq!(list["count"], 1);
        let (_, list, _) = send(&app, "GET", "/api/posts?q=banana", None, None).await;
        assert_eq!(list["count"], 0, "search is scoped to the board");
    }
}
