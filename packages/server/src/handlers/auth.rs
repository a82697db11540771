//! Account handlers: `POST /api/auth/signup`, `POST /api/auth/login`,
//! `POST /api/auth/logout` and `GET /api/me`.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use hanboard_api::{Ack, LoginRequest, MeBody, PublicUser, Role, SignupRequest, UserBody};
use tracing::info;

use crate::{
    credentials::{self, PasswordHash},
    error::AppError,
    middleware::{auth::CurrentSession, client_ip::ClientIp},
    session::{clear_cookie, sid_from_headers},
    storage::{AuditKind, StorageError, UserRecord},
};

use super::{ok, AppState, JsonBody};

pub const MIN_PASSWORD_CHARS: usize = 6;

/// `POST /api/auth/signup`: create an account. Does not log the user in.
pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<Response, AppError> {
    let id = req.id.trim();
    let nickname = req.nickname.trim();

    if id.is_empty() || nickname.is_empty() || req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::BadRequest(format!(
            "id and nickname are required and the password needs at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    if id == state.config.system_user_id {
        return Err(AppError::BadRequest("id is reserved".into()));
    }
    if state.storage.get_user(id).await?.is_some() {
        return Err(AppError::Conflict("id already exists".into()));
    }

    let role = if id.starts_with(state.config.admin_prefix.as_str()) {
        let expected = state.config.admin_invite_code.as_str();
        if expected.is_empty() || req.invite_code.as_deref() != Some(expected) {
            return Err(AppError::Forbidden("a valid admin invite code is required".into()));
        }
        Role::Admin
    } else {
        Role::User
    };

    let password = hash_blocking(req.password.clone(), state.config.pbkdf2_iterations).await?;
    let user = UserRecord {
        id: id.to_string(),
        nickname: nickname.to_string(),
        role,
        password,
        created_at: Utc::now(),
    };
    state.storage.create_user(&user).await.map_err(|e| match e {
        StorageError::Conflict(_) => AppError::Conflict("id already exists".into()),
        other => other.into(),
    })?;

    state.audit(AuditKind::Signup, Some(id), &ip).await?;
    info!(user = %user.id, role = %user.role, "account created");

    Ok(ok(UserBody {
        user: PublicUser {
            id: user.id,
            nickname: user.nickname,
            role: user.role,
        },
    }))
}

/// `POST /api/auth/login`: verify credentials and start a session.
///
/// Every attempt is audited before the credentials are checked.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let id = req.id.trim();
    let user = state.storage.get_user(id).await?;

    let ref_id = (!id.is_empty()).then_some(id);
    state.audit(AuditKind::Login, ref_id, &ip).await?;

    let stored = stored_password(user.as_ref());
    let verified = verify_blocking(req.password, stored, state.config.pbkdf2_iterations).await?;
    let user = match user {
        Some(user) if verified => user,
        _ => return Err(AppError::Unauthorized("invalid id or password".into())),
    };

    let (_, cookie) = state.sessions.create(&user.id).await?;
    let body = UserBody {
        user: PublicUser {
            id: user.id,
            nickname: user.nickname,
            role: user.role,
        },
    };
    Ok(([(header::SET_COOKIE, cookie)], ok(body)).into_response())
}

/// `POST /api/auth/logout`: revoke the session (if any) and clear the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(sid) = sid_from_headers(&headers) {
        state.sessions.revoke(&sid).await?;
    }
    Ok(([(header::SET_COOKIE, clear_cookie())], ok(Ack {})).into_response())
}

/// `GET /api/me`: the current user, or `null`.
pub async fn me(CurrentSession(session): CurrentSession) -> Response {
    ok(MeBody {
        user: session.map(|s| s.public_user()),
    })
}

/// The hash a login attempt is checked against. Unknown ids get a throwaway
/// hash so they cost the same derivation as a wrong password.
fn stored_password(user: Option<&UserRecord>) -> PasswordHash {
    match user {
        Some(user) => user.password.clone(),
        None => credentials::unusable_password(),
    }
}

// PBKDF2 runs on the blocking pool.

async fn hash_blocking(password: String, iterations: u32) -> Result<PasswordHash, AppError> {
    tokio::task::spawn_blocking(move || credentials::hash_password(&password, iterations))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {e}")))
}

async fn verify_blocking(
    password: String,
    stored: PasswordHash,
    iterations: u32,
) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || credentials::verify(&password, &stored, iterations))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::*;
    use crate::storage::AuditKind;

    #[tokio::test]
    async fn signup_then_login_sets_cookie() {
        let state = test_state();
        let app = app(&state);

        let (status, body, set_cookie) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "id": "u1", "password": "secret1", "nickname": "Bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "user": { "id": "u1", "nickname": "Bob", "role": "user" } }));
        assert!(set_cookie.is_none(), "signup must not log in");

        let (status, body, set_cookie) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "id": "u1", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "user");
        let set_cookie = set_cookie.unwrap();
        assert!(set_cookie.starts_with("sid=sid_"));
        assert!(set_cookie.contains("HttpOnly"));

        let (_, me, _) = send(&app, "GET", "/api/me", Some(&cookie_pair(&set_cookie)), None).await;
        assert_eq!(me["user"]["id"], "u1");
    }

    #[test]
    fn unknown_id_is_checked_against_a_well_formed_hash() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let dummy = super::stored_password(None);
        assert_eq!(STANDARD.decode(&dummy.salt).unwrap().len(), crate::credentials::SALT_LEN);
        assert_eq!(STANDARD.decode(&dummy.hash).unwrap().len(), crate::credentials::HASH_LEN);
        assert!(!crate::credentials::verify("secret1", &dummy, 1_000));
    }

    #[tokio::test]
    async fn unknown_id_and_wrong_password_look_alike() {
        let state = test_state();
        let app = app(&state);
        login_as(&app, "u1", None).await;

        let wrong = send(&app, "POST", "/api/auth/login", None, Some(json!({ "id": "u1", "password": "nope99" }))).await;
        let ghost = send(&app, "POST", "/api/auth/login", None, Some(json!({ "id": "ghost", "password": "nope99" }))).await;
        assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, ghost);
    }

    #[tokio::test]
    async fn wrong_password_is_401_and_audited() {
        let (state, storage) = memory_state();
        let app = app(&state);
        login_as(&app, "u1", None).await;

        let (status, body, set_cookie) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "id": "u1", "password": "secret2" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);
        assert!(set_cookie.is_none());

        let (status, _, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "id": "ghost", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let logins: Vec<_> = storage
            .audit_entries()
            .into_iter()
            .filter(|e| e.kind == AuditKind::Login)
            .collect();
        assert_eq!(logins.len(), 3, "one entry per attempt");
        assert_eq!(logins[2].ref_id.as_deref(), Some("ghost"));
    }

    #[tokio::test]
    async fn admin_prefix_needs_the_invite_code() {
        let state = test_state();
        let app = app(&state);

        let (status, _, _) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "id": "admin_x", "password": "secret1", "nickname": "X", "inviteCode": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(state.storage.get_user("admin_x").await.unwrap().is_none());

        let (status, body, _) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "id": "admin_x", "password": "secret1", "nickname": "X", "inviteCode": "letmein" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn signup_validation() {
        let state = test_state();
        let app = app(&state);

        for body in [
            json!({ "id": "", "password": "secret1", "nickname": "N" }),
            json!({ "id": "u1", "password": "short", "nickname": "N" }),
            json!({ "id": "u1", "password": "secret1", "nickname": "   " }),
            json!({ "id": "system", "password": "secret1", "nickname": "N" }),
        ] {
            let (status, _, _) = send(&app, "POST", "/api/auth/signup", None, Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }

        login_as(&app, "u1", None).await;
        let (status, body, _) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "id": " u1 ", "password": "secret1", "nickname": "Again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "id already exists");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let state = test_state();
        let app = app(&state);
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let resp = tower::ServiceExt::oneshot(app, req).await.unwrap();
        let (status, body, _) = split(resp).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "ok": false, "error": "invalid JSON body" }));
    }

    #[tokio::test]
    async fn logout_revokes_and_clears() {
        let state = test_state();
        let app = app(&state);
        let cookie = login_as(&app, "u1", None).await;

        let (status, body, set_cookie) = send(&app, "POST", "/api/auth/logout", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert!(set_cookie.unwrap().contains("Max-Age=0"));

        let (_, me, _) = send(&app, "GET", "/api/me", Some(&cookie), None).await;
        assert_eq!(me, json!({ "ok": true, "user": null }));

        // Without any cookie logout still succeeds.
        let (status, _, _) = send(&app, "POST", "/api/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
