//! Assembles the Axum [`Router`] from all handler modules.
//!
//! Route groups are merged in the order auth → upload/media → banners →
//! admin → posts. Every request first passes through the session resolver;
//! CORS and request tracing wrap everything. A known path with an unrouted
//! method is answered like an unknown path.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    handlers::{admin, auth, banners, comments, posts, upload, AppState},
    middleware::auth::resolve_session,
};

/// Build the complete application router with shared state.
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    let auth_routes = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(auth::me));

    let upload_routes = Router::new()
        .route("/api/upload/sign", post(upload::sign))
        .route(
            "/storage/{*key}",
            put(upload::put_object).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/media/{*key}", get(upload::get_object));

    let banner_routes = Router::new()
        .route("/api/banners", get(banners::list).post(banners::create))
        .route("/api/banners/{id}", delete(banners::delete));

    // Unknown admin paths still demand an admin before answering 404.
    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/users/{id}/posts", get(admin::user_posts))
        .method_not_allowed_fallback(admin::not_found)
        .fallback(admin::not_found);

    let post_routes = Router::new()
        .route("/api/posts", get(posts::list).post(posts::create))
        .route("/api/posts/{id}", get(posts::get_by_id).delete(posts::delete))
        .route("/api/posts/{id}/pin", post(posts::pin))
        .route("/api/posts/{id}/comments", post(comments::create))
        .route("/api/comments/{id}", delete(comments::delete));

    Router::new()
        .merge(auth_routes)
        .merge(upload_routes)
        .merge(banner_routes)
        .nest("/api/admin", admin_routes)
        .merge(post_routes)
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), resolve_session))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Mirror the caller's origin and allow credentials; preflights are
/// answered by the layer itself.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// JSON 404 under `/api`, plain text elsewhere.
async fn not_found(uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        AppError::NotFound("not found".into()).into_response()
    } else {
        (StatusCode::NOT_FOUND, "Not found").into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::handlers::test_support::*;

    #[tokio::test]
    async fn unknown_api_path_is_json_404() {
        let state = test_state();
        let app = app(&state);
        let (status, body, _) = send(&app, "GET", "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "ok": false, "error": "not found" }));
    }

    #[tokio::test]
    async fn unknown_other_path_is_plain_404() {
        let state = test_state();
        let app = app(&state);
        let req = Request::builder().uri("/favicon.ico").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Not found");
    }

    #[tokio::test]
    async fn wrong_method_is_json_404() {
        let state = test_state();
        let app = app(&state);
        for (method, uri) in [("GET", "/api/auth/login"), ("PUT", "/api/posts"), ("POST", "/api/me")] {
            let (status, body, _) = send(&app, method, uri, None, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body, json!({ "ok": false, "error": "not found" }), "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn wrong_method_under_admin_still_requires_admin() {
        let state = test_state();
        let app = app(&state);
        let (status, body, _) = send(&app, "POST", "/api/admin/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);

        let user = login_as(&app, "alice", None).await;
        let (status, _, _) = send(&app, "POST", "/api/admin/users", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = login_as(&app, "admin_x", Some("letmein")).await;
        let (status, body, _) = send(&app, "POST", "/api/admin/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "ok": false, "error": "not found" }));
    }

    #[tokio::test]
    async fn malformed_query_is_json_400() {
        let state = test_state();
        let app = app(&state);
        let (status, body, _) = send(&app, "GET", "/api/posts?board=free&board=jobs", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn cors_mirrors_origin_with_credentials() {
        let state = test_state();
        let app = app(&state);
        let req = Request::builder()
            .uri("/api/me")
            .header(header::ORIGIN, "https://board.example")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let h = resp.headers();
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://board.example");
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(h
            .get_all(header::VARY)
            .iter()
            .any(|v| v.to_str().unwrap().to_ascii_lowercase().contains("origin")));
    }

    #[tokio::test]
    async fn preflight_is_answered_without_auth() {
        let state = test_state();
        let app = app(&state);
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/posts")
            .header(header::ORIGIN, "https://board.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
        let methods = resp.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .to_string();
        for m in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
            assert!(methods.contains(m), "{methods}");
        }
    }

    #[tokio::test]
    async fn garbage_session_cookie_is_anonymous() {
        let state = test_state();
        let app = app(&state);
        let (status, body, _) = send(&app, "GET", "/api/me", Some("sid=sid_forged"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "user": null }));
    }
}
