//! Background scheduler for ingestion and the retention sweeps.
//!
//! Each tick runs, in order: ensure the system user, ingest feeds, purge the
//! audit log, purge expired sessions. A failing step is logged and the next
//! step still runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    config::BoardConfig,
    ingest::{ensure_system_user, FeedIngestor, IngestReport},
    maintenance,
    storage::Storage,
};

/// What one scheduler tick accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    pub ingest: IngestReport,
    /// `None` when the sweep failed.
    pub audit_purged: Option<u64>,
    pub sessions_purged: Option<u64>,
}

pub struct Scheduler {
    storage: Arc<dyn Storage>,
    config: Arc<BoardConfig>,
    ingestor: FeedIngestor,
}

impl Scheduler {
    pub fn new(storage: Arc<dyn Storage>, config: Arc<BoardConfig>, ingestor: FeedIngestor) -> Self {
        Self {
            storage,
            config,
            ingestor,
        }
    }

    /// Run every job once.
    pub async fn run_once(&self, now: DateTime<Utc>) -> JobReport {
        if let Err(e) = ensure_system_user(self.storage.as_ref(), &self.config).await {
            warn!("jobs: could not ensure system user: {e}");
        }

        let ingest = if self.config.news_feeds.is_empty() {
            IngestReport::default()
        } else {
            self.ingestor.run_once().await
        };

        let audit_purged =
            maintenance::purge_audit_logs(self.storage.as_ref(), now, self.config.audit_retention())
                .await
                .map_err(|e| warn!("jobs: audit purge failed: {e}"))
                .ok();

        let sessions_purged = maintenance::purge_expired_sessions(self.storage.as_ref(), now)
            .await
            .map_err(|e| warn!("jobs: session purge failed: {e}"))
            .ok();

        JobReport {
            ingest,
            audit_purged,
            sessions_purged,
        }
    }

    /// Run the jobs immediately, then every `interval`, forever.
    ///
    /// Spawn it with [`tokio::spawn`].
    pub async fn run(self, interval: Duration) {
        loop {
            let report = self.run_once(Utc::now()).await;
            info!(
                feeds_ok = report.ingest.feeds_ok,
                feeds_failed = report.ingest.feeds_failed,
                inserted = report.ingest.inserted,
                "jobs: tick complete"
            );
            tokio::time::sleep(interval).await;
        }
    }
}
