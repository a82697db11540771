//! Banner handlers. Listing is public; creating and deleting are admin-only.

use axum::{
    extract::{Path, State},
    response::Response,
};
use hanboard_api::{Ack, Banner, CreateBannerRequest, CreatedBody, ItemsBody};

use crate::{
    error::AppError,
    media::MediaError,
    middleware::{auth::RequireAdmin, client_ip::ClientIp},
    storage::AuditKind,
};

use super::{new_id, now_timestamp, ok, AppState, JsonBody};

/// `GET /api/banners`: newest first.
pub async fn list(State(state): State<AppState>) -> Result<Response, AppError> {
    let items = state.storage.list_banners().await?;
    Ok(ok(ItemsBody { items }))
}

/// `POST /api/banners`: the media key must name an uploaded object.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<CreateBannerRequest>,
) -> Result<Response, AppError> {
    let title = req.title.trim();
    let link = req.link.trim();
    let media_key = req.media_key.trim();
    if title.is_empty() || link.is_empty() || media_key.is_empty() {
        return Err(AppError::BadRequest("title, link and mediaKey are required".into()));
    }
    match state.media.exists(media_key).await {
        Ok(true) => {}
        Ok(false) | Err(MediaError::InvalidKey(_)) => {
            return Err(AppError::BadRequest(format!("unknown media key: {media_key}")));
        }
        Err(e) => return Err(e.into()),
    }

    let banner = Banner {
        id: new_id("bnr"),
        title: title.to_string(),
        link: link.to_string(),
        media_key: media_key.to_string(),
        created_at: now_timestamp(),
    };
    state.storage.insert_banner(&banner).await?;
    state.audit(AuditKind::Banner, Some(&banner.id), &ip).await?;

    Ok(ok(CreatedBody { id: banner.id }))
}

/// `DELETE /api/banners/{id}`: succeeds whether or not the banner existed.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    state.storage.delete_banner(&id).await?;
    Ok(ok(Ack {}))
}
