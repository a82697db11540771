//! Media upload and delivery.
//!
//! - `POST /api/upload/sign`: issue a signed, expiring upload URL.
//! - `PUT /storage/{*key}`: the object store's write endpoint; accepts only
//!   requests carrying a valid signature.
//! - `GET /media/{*key}`: public, long-cached reads.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hanboard_api::{Ack, Envelope, SignUploadBody, SignUploadRequest};
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    error::AppError,
    media::{validate_key, MediaError},
    middleware::auth::RequireUser,
};

use super::{ok, AppState, JsonBody, JsonQuery};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const MEDIA_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// `POST /api/upload/sign`
pub async fn sign(
    State(state): State<AppState>,
    RequireUser(session): RequireUser,
    JsonBody(req): JsonBody<SignUploadRequest>,
) -> Result<Response, AppError> {
    let filename = sanitize_filename(
        req.filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("file"),
    );
    let content_type = req
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_lowercase();
    if !state.config.media_policy.allows(&content_type) {
        return Err(AppError::UnsupportedMedia(format!(
            "file type not allowed: {content_type}"
        )));
    }

    let now = Utc::now();
    let key = object_key(&session.user_id, &filename, now);
    let url = state.signer.signed_url(&key, &content_type, now);
    Ok(ok(SignUploadBody {
        key,
        url,
        content_type,
    }))
}

/// Query string of a signed upload URL.
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub ct: Option<String>,
    pub expires: Option<String>,
    pub signature: Option<String>,
}

/// `PUT /storage/{*key}?ct=&expires=&signature=`
pub async fn put_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    JsonQuery(params): JsonQuery<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signed_type = params.ct.unwrap_or_default();
    let expires = params.expires.as_deref().and_then(|e| e.parse::<i64>().ok());
    let (Some(expires), Some(signature)) = (expires, params.signature) else {
        return Err(AppError::Forbidden("missing upload signature".into()));
    };
    state
        .signer
        .verify(&key, &signed_type, expires, &signature, Utc::now())
        .map_err(|e| AppError::Forbidden(e.to_string()))?;

    let request_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if request_type != signed_type {
        return Err(AppError::UnsupportedMedia(
            "content type does not match the signed upload".into(),
        ));
    }

    validate_key(&key)?;
    if body.is_empty() {
        return Err(AppError::BadRequest("empty upload".into()));
    }

    let size = body.len();
    state.media.put(&key, &signed_type, body).await?;
    info!(key = %key, size, content_type = %signed_type, "object stored");

    Ok((StatusCode::CREATED, Json(Envelope::ok(Ack {}))).into_response())
}

/// `GET /media/{*key}`
pub async fn get_object(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let object = match state.media.get(&key).await {
        Ok(Some(object)) => object,
        Ok(None) | Err(MediaError::InvalidKey(_)) | Err(MediaError::NotFound) => {
            return (StatusCode::NOT_FOUND, "Not found").into_response();
        }
        Err(e) => {
            error!(key = %key, "media read failed: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static(MEDIA_CACHE_CONTROL)),
        ],
        object.into_body(),
    )
        .into_response()
}

/// Replace every character outside `[A-Za-z0-9_.\-()\[\]]` and ASCII
/// whitespace with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || "_.-()[]".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{owner}/{unix_millis}_{uuid}[.{ext}]`, where `ext` follows the last `.`
/// of the sanitized filename.
pub fn object_key(owner: &str, filename: &str, now: DateTime<Utc>) -> String {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty());
    let stem = format!("{owner}/{}_{}", now.timestamp_millis(), uuid::Uuid::new_v4());
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}
