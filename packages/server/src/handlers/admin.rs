//! Admin handlers under `/api/admin/*`. Every route, including unknown
//! ones, requires an admin session.

use axum::{
    extract::{Path, State},
    response::Response,
};
use hanboard_api::{Ack, ItemsBody};
use serde::Deserialize;
use tracing::info;

use crate::{error::AppError, middleware::auth::RequireAdmin, storage::UserFilter};

use super::{ok, AppState, JsonQuery};

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}

/// `GET /api/admin/users?q=`
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    JsonQuery(search): JsonQuery<UserSearch>,
) -> Result<Response, AppError> {
    let query = search
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(String::from);
    let items = state
        .storage
        .list_users(&UserFilter {
            query,
            limit: state.config.admin_user_list_max,
        })
        .await?;
    Ok(ok(ItemsBody { items }))
}

/// `DELETE /api/admin/users/{id}`: an admin cannot delete their own account.
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if id == admin.user_id {
        return Err(AppError::BadRequest("you cannot delete your own account".into()));
    }
    if state.storage.delete_user(&id).await? {
        info!(user = %id, by = %admin.user_id, "user deleted");
    }
    Ok(ok(Ack {}))
}

/// `GET /api/admin/users/{id}/posts`
pub async fn user_posts(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let items = state
        .storage
        .list_posts_by_author(&id, state.config.admin_user_posts_max)
        .await?;
    Ok(ok(ItemsBody { items }))
}

/// Fallback for unmatched `/api/admin/*` paths: authorize first, then 404.
pub async fn not_found(RequireAdmin(_): RequireAdmin) -> AppError {
    AppError::NotFound("not found".into())
}
