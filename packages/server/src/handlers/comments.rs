//! Comment handlers: `POST /api/posts/{id}/comments` and `DELETE /api/comments/{id}`.

use axum::{
    extract::{Path, State},
    response::Response,
};
use hanboard_api::{Ack, Comment, CreateCommentRequest, CreatedBody};

use crate::{
    error::AppError,
    middleware::{
        auth::{require_owner_or_admin, RequireUser},
        client_ip::ClientIp,
    },
    storage::AuditKind,
};

use super::{new_id, now_timestamp, ok, AppState, JsonBody};

pub async fn create(
    State(state): State<AppState>,
    RequireUser(session): RequireUser,
    ClientIp(ip): ClientIp,
    Path(post_id): Path<String>,
    JsonBody(req): JsonBody<CreateCommentRequest>,
) -> Result<Response, AppError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("comment content is required".into()));
    }
    if state.storage.get_post(&post_id).await?.is_none() {
        return Err(AppError::NotFound("post not found".into()));
    }

    let comment = Comment {
        id: new_id("cmt"),
        post_id,
        author_id: session.user_id,
        author_nickname: session.nickname,
        content: content.to_string(),
        created_at: now_timestamp(),
    };
    state.storage.insert_comment(&comment).await?;
    state.audit(AuditKind::Comment, Some(&comment.id), &ip).await?;

    Ok(ok(CreatedBody { id: comment.id }))
}

/// Author or admin only.
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(session): RequireUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let comment = state
        .storage
        .get_comment(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("comment not found".into()))?;
    require_owner_or_admin(Some(&session), &comment.author_id)?;

    state.storage.delete_comment(&id).await?;
    Ok(ok(Ack {}))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::*;

    #[tokio::test]
    async fn comments_attach_in_order_and_obey_ownership() {
        let state = test_state();
        let app = app(&state);
        let author = login_as(&app, "u1", None).await;
        let other = login_as(&app, "u2", None).await;

        let (_, created, _) = send(
            &app,
            "POST",
            "/api/posts",
            Some(&author),
            Some(json!({ "title": "t", "content": "c" })),
        )
        .await;
        let post_id = created["id"].as_str().unwrap().to_string();
        let uri = format!("/api/posts/{post_id}/comments");

        let (status, first, _) =
            send(&app, "POST", &uri, Some(&author), Some(json!({ "content": " one " }))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) =
            send(&app, "POST", &uri, Some(&other), Some(json!({ "content": "two" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (_, detail, _) = send(&app, "GET", &format!("/api/posts/{post_id}"), None, None).await;
        let contents: Vec<&str> = detail["comments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["one", "two"]);
        assert_eq!(detail["comments"][1]["author_nickname"], "nick-u2");

        let first_uri = format!("/api/comments/{}", first["id"].as_str().unwrap());
        let (status, _, _) = send(&app, "DELETE", &first_uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _, _) = send(&app, "DELETE", &first_uri, Some(&author), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(&app, "DELETE", &first_uri, Some(&author), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn comment_validation() {
        let state = test_state();
        let app = app(&state);
        let cookie = login_as(&app, "u1", None).await;

        let (status, _, _) = send(
            &app,
            "POST",
            "/api/posts/post_missing/comments",
            None,
            Some(json!({ "content": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(
            &app,
            "POST",
            "/api/posts/post_missing/comments",
            Some(&cookie),
            Some(json!({ "content": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(
            &app,
            "POST",
            "/api/posts/post_missing/comments",
            Some(&cookie),
            Some(json!({ "content": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deleting_a_post_removes_its_comments() {
        let state = test_state();
        let app = app(&state);
        let cookie = login_as(&app, "u1", None).await;
        let (_, created, _) = send(
            &app,
            "POST",
            "/api/posts",
            Some(&cookie),
            Some(json!({ "title": "t", "content": "c" })),
        )
        .await;
        let post_id = created["id"].as_str().unwrap().to_string();
        let (_, comment, _) = send(
            &app,
            "POST",
            &format!("/api/posts/{post_id}/comments"),
            Some(&cookie),
            Some(json!({ "content": "x" })),
        )
        .await;
        let comment_id = comment["id"].as_str().unwrap();

        send(&app, "DELETE", &format!("/api/posts/{post_id}"), Some(&cookie), None).await;
        assert!(state.storage.get_comment(comment_id).await.unwrap().is_none());
    }
}
