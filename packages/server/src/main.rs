//! `hanboard`: community bulletin-board API server.
//!
//! # Quick start
//!
//! ```sh
//! # Everything in memory on the default port:
//! hanboard
//!
//! # Persistent database and media, admin signups enabled:
//! HANBOARD_DB=./board.db HANBOARD_MEDIA_DIR=./media \
//!   HANBOARD_ADMIN_INVITE_CODE=change-me hanboard
//! ```
//!
//! # Environment variables
//!
//! See [`hanboard_server::config::BoardConfig`] for the full list. A `.env`
//! file in the working directory is loaded first if present.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hanboard_server::{
    build_router,
    ingest::FeedIngestor,
    jobs::Scheduler,
    AppState, BoardConfig, FsMediaStore, MediaStore, MemoryMediaStore, MemoryStorage,
    SqliteStorage, Storage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hanboard_server=info,tower_http=debug".into()),
        )
        .init();

    let config = BoardConfig::from_env().context("invalid configuration")?;

    let storage: Arc<dyn Storage> = match &config.db_path {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            Arc::new(
                SqliteStorage::open(path)
                    .with_context(|| format!("failed to open SQLite database at {path}"))?,
            )
        }
        None => {
            tracing::info!("storage: in-memory (data will not survive restart)");
            Arc::new(MemoryStorage::new())
        }
    };

    let media: Arc<dyn MediaStore> = match &config.media_dir {
        Some(dir) => {
            tracing::info!("media: filesystem at {dir}");
            Arc::new(
                FsMediaStore::open(dir)
                    .await
                    .with_context(|| format!("failed to open media directory {dir}"))?,
            )
        }
        None => {
            tracing::info!("media: in-memory (uploads will not survive restart)");
            Arc::new(MemoryMediaStore::new())
        }
    };

    if config.admin_invite_code.is_empty() {
        tracing::info!("admin signup disabled (HANBOARD_ADMIN_INVITE_CODE is empty)");
    }

    // Spawn the background ingestion/maintenance loop.
    {
        let jobs_config = Arc::new(config.clone());
        let ingestor = FeedIngestor::new(Arc::clone(&storage), Arc::clone(&jobs_config))
            .context("failed to build HTTP client for feed ingestion")?;
        let interval = Duration::from_secs(config.job_interval_secs);
        tracing::info!(
            "jobs: scheduler starting (interval = {}s, {} feeds)",
            config.job_interval_secs,
            config.news_feeds.len()
        );
        let scheduler = Scheduler::new(Arc::clone(&storage), jobs_config, ingestor);
        tokio::spawn(scheduler.run(interval));
    }

    let bind_addr = config.bind_addr;
    let app = build_router(AppState::new(storage, media, config));

    tracing::info!("listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
