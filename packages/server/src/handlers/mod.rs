//! HTTP request handlers for all board endpoints.
//!
//! Each submodule covers one route group. Handlers are async functions that
//! receive Axum extractors and return `Result<impl IntoResponse, AppError>`.
//!
//! Authorization decisions live here (via [`crate::middleware::auth`]), never
//! in storage.

pub mod admin;
pub mod auth;
pub mod banners;
pub mod comments;
pub mod posts;
pub mod upload;

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use hanboard_api::Envelope;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::BoardConfig,
    error::AppError,
    media::{signing::UploadSigner, MediaStore},
    session::SessionManager,
    storage::{format_timestamp, AuditEntry, AuditKind, Storage},
};

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub media: Arc<dyn MediaStore>,
    pub sessions: SessionManager,
    pub signer: UploadSigner,
    pub config: Arc<BoardConfig>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, media: Arc<dyn MediaStore>, config: BoardConfig) -> Self {
        let sessions = SessionManager::new(Arc::clone(&storage), config.session_ttl());
        let signer = UploadSigner::new(&config.upload_secret, &config.public_url, config.upload_ttl());
        Self {
            storage,
            media,
            sessions,
            signer,
            config: Arc::new(config),
        }
    }

    /// Append one audit log row stamped with the current time.
    pub async fn audit(
        &self,
        kind: AuditKind,
        ref_id: Option<&str>,
        ip: &str,
    ) -> Result<(), AppError> {
        let entry = AuditEntry {
            id: new_id("ip"),
            kind,
            ref_id: ref_id.map(String::from),
            ip: ip.to_string(),
            created_at: Utc::now(),
        };
        self.storage.append_audit(&entry).await?;
        Ok(())
    }
}

/// `{prefix}_{uuid}`
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4())
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// `200 {"ok": true, ...data}`
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope::ok(data)).into_response()
}

/// JSON body extractor whose rejection is a `400 {"ok":false,...}` rather
/// than axum's plain-text rejection.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| AppError::BadRequest("invalid JSON body".into()))?;
        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|_| AppError::BadRequest("invalid JSON body".into()))
    }
}

/// Query-string extractor; a malformed query is a JSON 400 like [`JsonBody`].
pub struct JsonQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for JsonQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| JsonQuery(value))
            .map_err(|_| AppError::BadRequest("invalid query string".into()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers shared by the handler tests.

    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
        Router,
    };
    use std::sync::Arc;

    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::AppState;
    use crate::{
        config::BoardConfig, media::memory::MemoryMediaStore, router::build_router,
        storage::memory::MemoryStorage,
    };

    pub fn test_state() -> AppState {
        memory_state().0
    }

    /// State plus a typed handle on its storage, for inspecting the audit log.
    pub fn memory_state() -> (AppState, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::new(
            Arc::clone(&storage) as Arc<dyn crate::storage::Storage>,
            Arc::new(MemoryMediaStore::new()),
            BoardConfig::for_tests(),
        );
        (state, storage)
    }

    pub fn app(state: &AppState) -> Router {
        build_router(state.clone())
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        split(resp).await
    }

    pub async fn split(resp: Response<Body>) -> (StatusCode, Value, Option<String>) {
        let status = resp.status();
        let set_cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json, set_cookie)
    }

    /// `sid=...` from a `Set-Cookie` value, ready for a `Cookie` header.
    pub fn cookie_pair(set_cookie: &str) -> String {
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// Sign up and log in; returns the `Cookie` header value.
    pub async fn login_as(app: &Router, id: &str, invite: Option<&str>) -> String {
        let mut body = serde_json::json!({ "id": id, "password": "secret1", "nickname": format!("nick-{id}") });
        if let Some(code) = invite {
            body["inviteCode"] = code.into();
        }
        let (status, _, _) = send(app, "POST", "/api/auth/signup", None, Some(body)).await;
        assert_eq!(status, StatusCode::OK, "signup {id}");

        let (status, _, set_cookie) = send(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({ "id": id, "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login {id}");
        cookie_pair(&set_cookie.unwrap())
    }
}
