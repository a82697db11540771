//! Public surface for the `hanboard-server` crate.
//!
//! Exposes the router builder, config and storage types so that external
//! crates (e.g. the conformance test suite) can run an in-process server
//! without spawning a subprocess.

pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod jobs;
pub mod maintenance;
pub mod media;
pub mod middleware;
pub mod router;
pub mod session;
pub mod storage;

pub use config::BoardConfig;
pub use handlers::AppState;
pub use media::{fs::FsMediaStore, memory::MemoryMediaStore, MediaStore};
pub use router::build_router;
pub use storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage};
