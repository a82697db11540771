//! Shared helpers for the hanboard conformance test suite.
//!
//! Provides [`spawn_server`], which binds a `TcpListener` on an ephemeral
//! port, wires up an in-process server backed by `MemoryStorage` and
//! `MemoryMediaStore`, and returns the local URL together with the storage
//! so tests can inspect state without going through the HTTP layer.

use std::sync::Arc;

use hanboard_server::{
    build_router, AppState, BoardConfig, MediaStore, MemoryMediaStore, MemoryStorage, Storage,
};

/// Invite code accepted for `admin_*` signups on servers from [`spawn_server`].
pub const INVITE_CODE: &str = "letmein";

/// Start an ephemeral in-process server and return `(base_url, storage)`.
///
/// The server is bound to an OS-assigned port on `127.0.0.1` and its public
/// URL is set to that address, so signed upload URLs point back at it.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or the server fails.
pub async fn spawn_server() -> (String, Arc<MemoryStorage>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let mem_storage = Arc::new(MemoryStorage::new());
    let storage: Arc<dyn Storage> = Arc::clone(&mem_storage) as Arc<dyn Storage>;
    let media: Arc<dyn MediaStore> = Arc::new(MemoryMediaStore::new());

    let mut config = BoardConfig::for_tests();
    config.bind_addr = addr;
    config.public_url = base_url.clone();
    config.admin_invite_code = INVITE_CODE.into();

    let router = build_router(AppState::new(storage, media, config));

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance server error");
    });

    (base_url, mem_storage)
}

/// The `name=value` pair of a `Set-Cookie` header, ready for a `Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().trim().to_string()
}
