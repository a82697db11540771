//! Session resolution and authorization.
//!
//! [`resolve_session`] runs once per request: it reads the `sid` cookie,
//! resolves it, and stores a [`CurrentSession`] in the request extensions.
//! Handlers then pick one of three extractors:
//!
//! - [`CurrentSession`]: the session if any; never rejects.
//! - [`RequireUser`]: 401 without a valid session.
//! - [`RequireAdmin`]: 401 without a session, 403 for non-admins.
//!
//! The checks themselves are plain functions ([`require_authenticated`],
//! [`require_admin`], [`require_owner_or_admin`]) so handlers can apply them
//! to a resource owner after loading it.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    error::AppError,
    handlers::AppState,
    session::{sid_from_headers, SessionInfo},
};

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

pub fn require_authenticated(session: Option<&SessionInfo>) -> Result<&SessionInfo, AppError> {
    session.ok_or_else(|| AppError::Unauthorized("login required".into()))
}

pub fn require_admin(session: Option<&SessionInfo>) -> Result<&SessionInfo, AppError> {
    let session = require_authenticated(session)?;
    if !session.is_admin() {
        return Err(AppError::Forbidden("admin privileges required".into()));
    }
    Ok(session)
}

/// Passes for admins and for the user who owns the resource.
pub fn require_owner_or_admin<'a>(
    session: Option<&'a SessionInfo>,
    owner_id: &str,
) -> Result<&'a SessionInfo, AppError> {
    let session = require_authenticated(session)?;
    if session.is_admin() || session.user_id == owner_id {
        Ok(session)
    } else {
        Err(AppError::Forbidden("not allowed".into()))
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Axum `from_fn_with_state` middleware that resolves the session cookie.
///
/// A storage failure during lookup is logged and treated as "no session".
pub async fn resolve_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = match sid_from_headers(req.headers()) {
        Some(sid) => state.sessions.resolve(&sid).await.unwrap_or_else(|e| {
            warn!("session lookup failed: {e}");
            None
        }),
        None => None,
    };
    req.extensions_mut().insert(CurrentSession(session));
    next.run(req).await
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// The request's session, if it carried a valid one.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<SessionInfo>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let current = parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .unwrap_or_default();
        async move { Ok(current) }
    }
}

/// Requires a logged-in user.
pub struct RequireUser(pub SessionInfo);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = require_authenticated(current(parts)).map(|s| RequireUser(s.clone()));
        async move { result }
    }
}

/// Requires a logged-in admin.
pub struct RequireAdmin(pub SessionInfo);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = require_admin(current(parts)).map(|s| RequireAdmin(s.clone()));
        async move { result }
    }
}

fn current(parts: &Parts) -> Option<&SessionInfo> {
    parts
        .extensions
        .get::<CurrentSession>()
        .and_then(|c| c.0.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use hanboard_api::Role;

    fn session(user_id: &str, role: Role) -> SessionInfo {
        SessionInfo {
            session_id: "sid_x".into(),
            user_id: user_id.into(),
            nickname: "N".into(),
            role,
        }
    }

    #[test]
    fn anonymous_is_unauthorized_everywhere() {
        assert_eq!(require_authenticated(None).unwrap_err().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(require_admin(None).unwrap_err().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            require_owner_or_admin(None, "u1").unwrap_err().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn plain_user_is_forbidden_from_admin_checks() {
        let s = session("u1", Role::User);
        assert!(require_authenticated(Some(&s)).is_ok());
        assert_eq!(require_admin(Some(&s)).unwrap_err().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn ownership_or_admin_role_grants_access() {
        let owner = session("u1", Role::User);
        let other = session("u2", Role::User);
        let admin = session("admin_x", Role::Admin);

        assert!(require_owner_or_admin(Some(&owner), "u1").is_ok());
        assert!(require_owner_or_admin(Some(&admin), "u1").is_ok());
        assert_eq!(
            require_owner_or_admin(Some(&other), "u1").unwrap_err().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn extractors_read_the_resolved_session() {
        let req = axum::http::Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        parts
            .extensions
            .insert(CurrentSession(Some(session("u1", Role::User))));

        let RequireUser(user) = RequireUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, "u1");
        let rejected = RequireAdmin::from_request_parts(&mut parts, &()).await;
        assert!(matches!(rejected, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn missing_extension_means_anonymous() {
        let req = axum::http::Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let CurrentSession(s) = CurrentSession::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(s.is_none());
        assert!(matches!(
            RequireUser::from_request_parts(&mut parts, &()).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
