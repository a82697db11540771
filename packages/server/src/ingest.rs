//! News ingestion: pull configured RSS/Atom feeds into the `news` board.
//!
//! [`FeedIngestor`] fetches each feed with a shared [`reqwest::Client`],
//! parses it with `feed-rs`, and stores the newest entries as posts authored
//! by the system user. Posts are keyed by `source_guid`, so re-running over
//! the same feed inserts nothing and never rewrites an existing post.
//!
//! Errors from individual feeds are **logged** and **do not stop** the run;
//! the next scheduled run retries them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hanboard_api::{Post, Role};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    config::BoardConfig,
    credentials,
    handlers::{new_id, now_timestamp},
    storage::{Storage, StorageError, UserRecord},
};

/// Board that ingested posts are filed under.
pub const NEWS_BOARD: &str = "news";

/// Longest `source_guid` stored, in characters.
pub const MAX_GUID_CHARS: usize = 400;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// IngestError
// ---------------------------------------------------------------------------

/// Errors that can occur while ingesting a single feed.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned status {0}")]
    BadStatus(u16),

    #[error("unparseable feed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of one pass over every configured feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    /// Posts created by this run.
    pub inserted: usize,
    /// Entries whose `source_guid` was already stored.
    pub skipped: usize,
}

/// A feed entry reduced to what becomes a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub guid: String,
}

// ---------------------------------------------------------------------------
// System user
// ---------------------------------------------------------------------------

/// Create the synthetic author of news posts if it does not exist yet.
///
/// The account gets the admin role and a password nothing derives to, so it
/// can never log in. Losing a creation race to another run is not an error.
pub async fn ensure_system_user(
    storage: &dyn Storage,
    config: &BoardConfig,
) -> Result<(), StorageError> {
    if storage.get_user(&config.system_user_id).await?.is_some() {
        return Ok(());
    }
    let user = UserRecord {
        id: config.system_user_id.clone(),
        nickname: config.system_nickname.clone(),
        role: Role::Admin,
        password: credentials::unusable_password(),
        created_at: Utc::now(),
    };
    match storage.create_user(&user).await {
        Ok(()) => {
            info!(user = %user.id, "ingest: created system user");
            Ok(())
        }
        Err(StorageError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// FeedIngestor
// ---------------------------------------------------------------------------

pub struct FeedIngestor {
    client: Client,
    storage: Arc<dyn Storage>,
    config: Arc<BoardConfig>,
    markup: Regex,
    whitespace: Regex,
}

impl FeedIngestor {
    /// Build an ingestor with its own HTTP client.
    pub fn new(storage: Arc<dyn Storage>, config: Arc<BoardConfig>) -> Result<Self, IngestError> {
        let client = Client::builder()
            .user_agent(concat!("hanboard-ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, storage, config))
    }

    pub fn with_client(client: Client, storage: Arc<dyn Storage>, config: Arc<BoardConfig>) -> Self {
        Self {
            client,
            storage,
            config,
            markup: Regex::new(r"<[^>]+>").unwrap_or_else(|_| unreachable!("static pattern")),
            whitespace: Regex::new(r"\s+").unwrap_or_else(|_| unreachable!("static pattern")),
        }
    }

    /// Ingest every configured feed once.
    pub async fn run_once(&self) -> IngestReport {
        let mut report = IngestReport::default();
        for url in &self.config.news_feeds {
            match self.ingest_feed(url).await {
                Ok((inserted, skipped)) => {
                    info!("ingest: {url}: {inserted} new, {skipped} already stored");
                    report.feeds_ok += 1;
                    report.inserted += inserted;
                    report.skipped += skipped;
                }
                Err(e) => {
                    warn!("ingest: {url} failed: {e}");
                    report.feeds_failed += 1;
                }
            }
        }
        report
    }

    /// Fetch one feed and store its newest entries.
    ///
    /// Returns `(inserted, skipped)`. Posts stored before a storage failure
    /// stay stored.
    pub async fn ingest_feed(&self, url: &str) -> Result<(usize, usize), IngestError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::BadStatus(status.as_u16()));
        }
        let body = response.bytes().await?;
        let feed = feed_rs::parser::Builder::new()
            .id_generator(fallback_identifier)
            .build()
            .parse(&body[..])?;

        let mut inserted = 0;
        let mut skipped = 0;
        for entry in feed.entries.iter().take(self.config.feed_max_entries) {
            let Some(item) = self.item_from_entry(entry) else {
                debug!("ingest: {url}: entry without title or link ignored");
                continue;
            };
            if self.storage.insert_post_if_absent(&self.post_from_item(item)).await? {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }
        Ok((inserted, skipped))
    }

    fn item_from_entry(&self, entry: &feed_rs::model::Entry) -> Option<FeedItem> {
        let title = entry
            .title
            .as_ref()
            .map(|t| self.clean_title(&t.content))
            .filter(|t| !t.is_empty())?;
        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .filter(|l| !l.is_empty())?;
        let id = entry.id.trim();
        let guid = if id.is_empty() { link.clone() } else { id.to_string() };
        Some(FeedItem { title, link, guid })
    }

    /// Strip tags and collapse runs of whitespace.
    pub fn clean_title(&self, raw: &str) -> String {
        let text = self.markup.replace_all(raw, "");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }

    fn post_from_item(&self, item: FeedItem) -> Post {
        let now = now_timestamp();
        Post {
            id: new_id("post"),
            board: NEWS_BOARD.into(),
            content: format!("{}\n\nSource: {}", item.title, item.link),
            title: item.title,
            author_id: self.config.system_user_id.clone(),
            author_nickname: self.config.system_nickname.clone(),
            is_pinned: false,
            media: vec![],
            source_url: Some(item.link),
            source_guid: Some(source_guid(&item.guid)),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Identifier for entries that carry none of their own: the first link, else
/// the title. Must not depend on anything an upstream edit would change.
fn fallback_identifier(
    links: &[feed_rs::model::Link],
    title: &Option<feed_rs::model::Text>,
    _base_uri: Option<&str>,
) -> String {
    links
        .first()
        .map(|l| l.href.trim().to_string())
        .or_else(|| title.as_ref().map(|t| t.content.trim().to_string()))
        .unwrap_or_default()
}

/// `rss:{identifier}`, cut to [`MAX_GUID_CHARS`] characters.
pub fn source_guid(identifier: &str) -> String {
    format!("rss:{identifier}").chars().take(MAX_GUID_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
