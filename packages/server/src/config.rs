//! Server configuration, populated from environment variables.

use std::net::SocketAddr;

use chrono::Duration;
use rand::RngCore;

/// Boards a post may be filed under unless `HANBOARD_BOARDS` overrides them.
pub const DEFAULT_BOARDS: &[&str] = &["news", "free", "jobs", "used", "estate", "ads", "inquiry"];

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Which upload content types are accepted by `POST /api/upload/sign`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPolicy {
    /// Any content type starting with one of these is allowed (e.g. `image/`).
    pub allowed_prefixes: Vec<String>,
    /// Content types allowed by exact match.
    pub allowed_exact: Vec<String>,
}

impl MediaPolicy {
    pub fn allows(&self, content_type: &str) -> bool {
        self.allowed_prefixes
            .iter()
            .any(|p| content_type.starts_with(p.as_str()))
            || self.allowed_exact.iter().any(|t| t == content_type)
    }
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            allowed_prefixes: vec!["image/".into()],
            allowed_exact: vec![
                "video/mp4".into(),
                "video/webm".into(),
                "application/octet-stream".into(),
            ],
        }
    }
}

/// Runtime configuration for a hanboard server.
///
/// Every value has a default so the server starts with zero configuration
/// (in-memory storage, no feeds, admin signup disabled).
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `HANBOARD_BIND` | `0.0.0.0:8787` | TCP socket address to listen on |
/// | `HANBOARD_PUBLIC_URL` | `http://{HANBOARD_BIND}` | Base URL used in signed upload URLs |
/// | `HANBOARD_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `HANBOARD_MEDIA_DIR` | (absent = in-memory) | Directory holding uploaded media |
/// | `HANBOARD_ADMIN_INVITE_CODE` | (empty = disabled) | Invite code for admin signups |
/// | `HANBOARD_ADMIN_PREFIX` | `admin_` | Id prefix that marks an admin signup |
/// | `HANBOARD_UPLOAD_SECRET` | random per process | HMAC key for signed upload URLs |
/// | `HANBOARD_NEWS_FEEDS` | (empty) | Comma-separated RSS/Atom feed URLs |
/// | `HANBOARD_BOARDS` | `news,free,jobs,used,estate,ads,inquiry` | Allowed boards |
/// | `HANBOARD_JOB_INTERVAL_SECS` | `900` | Seconds between ingestion/maintenance runs |
/// | `HANBOARD_SESSION_TTL_SECS` | `1209600` (14 days) | Session lifetime |
/// | `HANBOARD_UPLOAD_TTL_SECS` | `600` | Signed upload URL lifetime |
/// | `HANBOARD_AUDIT_RETENTION_SECS` | `259200` (3 days) | Audit log retention |
/// | `HANBOARD_PBKDF2_ITERATIONS` | `120000` | Password hashing work factor |
/// | `HANBOARD_MAX_UPLOAD_BYTES` | `104857600` (100 MiB) | Largest accepted media upload |
///
/// The `*_SECS` variables accept 1 through [`MAX_SECS`]; the iteration count
/// must be positive.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Externally reachable base URL, without a trailing slash.
    pub public_url: String,

    /// Path to the SQLite database file. `None` means in-memory storage.
    pub db_path: Option<String>,

    /// Directory for uploaded media. `None` means in-memory media storage.
    pub media_dir: Option<String>,

    /// Invite code required for admin signups. Empty disables them.
    pub admin_invite_code: String,

    /// Signup ids starting with this prefix request the admin role.
    pub admin_prefix: String,

    /// Key used to sign and verify upload URLs.
    pub upload_secret: String,

    /// Feeds pulled by the ingestion job.
    pub news_feeds: Vec<String>,

    /// Boards a post may be created in. Always lowercase.
    pub boards: Vec<String>,

    pub job_interval_secs: u64,
    pub session_ttl_secs: i64,
    pub upload_ttl_secs: i64,
    pub audit_retention_secs: i64,
    pub pbkdf2_iterations: u32,
    pub max_upload_bytes: usize,

    /// Default and maximum page sizes for `GET /api/posts`.
    pub post_list_default: u32,
    pub post_list_max: u32,

    /// Row caps for the admin listings.
    pub admin_user_list_max: u32,
    pub admin_user_posts_max: u32,

    pub media_policy: MediaPolicy,

    /// Id and nickname of the synthetic author of ingested news posts.
    pub system_user_id: String,
    pub system_nickname: String,

    /// Entries taken from the top of each feed per ingestion run.
    pub feed_max_entries: usize,
}

impl BoardConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr: SocketAddr = parse_var("HANBOARD_BIND", "a socket address")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8787)));

        let public_url = std::env::var("HANBOARD_PUBLIC_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{bind_addr}"));

        let mut config = Self::with_bind(bind_addr, public_url);

        config.db_path = std::env::var("HANBOARD_DB").ok();
        config.media_dir = std::env::var("HANBOARD_MEDIA_DIR").ok();
        if let Ok(code) = std::env::var("HANBOARD_ADMIN_INVITE_CODE") {
            config.admin_invite_code = code;
        }
        if let Ok(prefix) = std::env::var("HANBOARD_ADMIN_PREFIX") {
            config.admin_prefix = prefix;
        }
        if let Ok(secret) = std::env::var("HANBOARD_UPLOAD_SECRET") {
            config.upload_secret = secret;
        }
        if let Ok(feeds) = std::env::var("HANBOARD_NEWS_FEEDS") {
            config.news_feeds = split_list(&feeds);
        }
        if let Ok(boards) = std::env::var("HANBOARD_BOARDS") {
            config.boards = split_list(&boards.to_lowercase());
        }
        if let Some(v) = parse_secs("HANBOARD_JOB_INTERVAL_SECS")? {
            config.job_interval_secs = v.unsigned_abs();
        }
        if let Some(v) = parse_secs("HANBOARD_SESSION_TTL_SECS")? {
            config.session_ttl_secs = v;
        }
        if let Some(v) = parse_secs("HANBOARD_UPLOAD_TTL_SECS")? {
            config.upload_ttl_secs = v;
        }
        if let Some(v) = parse_secs("HANBOARD_AUDIT_RETENTION_SECS")? {
            config.audit_retention_secs = v;
        }
        if let Some(v) = parse_var::<u32>("HANBOARD_PBKDF2_ITERATIONS", "a positive integer")? {
            if v == 0 {
                return Err(ConfigError::Invalid {
                    var: "HANBOARD_PBKDF2_ITERATIONS",
                    expected: "a positive integer",
                    value: v.to_string(),
                });
            }
            config.pbkdf2_iterations = v;
        }
        if let Some(v) = parse_var("HANBOARD_MAX_UPLOAD_BYTES", "a number of bytes")? {
            config.max_upload_bytes = v;
        }

        Ok(config)
    }

    /// Defaults for everything except the listen address and public URL.
    pub fn with_bind(bind_addr: SocketAddr, public_url: impl Into<String>) -> Self {
        Self {
            bind_addr,
            public_url: public_url.into(),
            db_path: None,
            media_dir: None,
            admin_invite_code: String::new(),
            admin_prefix: "admin_".into(),
            upload_secret: random_secret(),
            news_feeds: vec![],
            boards: DEFAULT_BOARDS.iter().map(|b| b.to_string()).collect(),
            job_interval_secs: 900,
            session_ttl_secs: 14 * 24 * 60 * 60,
            upload_ttl_secs: 10 * 60,
            audit_retention_secs: 3 * 24 * 60 * 60,
            pbkdf2_iterations: 120_000,
            max_upload_bytes: 100 * 1024 * 1024,
            post_list_default: 20,
            post_list_max: 50,
            admin_user_list_max: 50,
            admin_user_posts_max: 100,
            media_policy: MediaPolicy::default(),
            system_user_id: "system".into(),
            system_nickname: "News Bot".into(),
            feed_max_entries: 15,
        }
    }

    /// A loopback config with a known invite code and a cheap hash work factor.
    pub fn for_tests() -> Self {
        let mut config = Self::with_bind(SocketAddr::from(([127, 0, 0, 1], 0)), "http://127.0.0.1");
        config.admin_invite_code = "letmein".into();
        config.upload_secret = "test-upload-secret".into();
        config.pbkdf2_iterations = 1_000;
        config
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_secs)
    }

    pub fn upload_ttl(&self) -> Duration {
        Duration::seconds(self.upload_ttl_secs)
    }

    pub fn audit_retention(&self) -> Duration {
        Duration::seconds(self.audit_retention_secs)
    }

    pub fn is_board(&self, board: &str) -> bool {
        self.boards.iter().any(|b| b == board)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var,
                expected,
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Upper bound for every `*_SECS` variable: ten years.
pub const MAX_SECS: i64 = 10 * 365 * 24 * 60 * 60;

const SECS_EXPECTED: &str = "a number of seconds between 1 and 315360000";

fn parse_secs(var: &'static str) -> Result<Option<i64>, ConfigError> {
    parse_var::<i64>(var, SECS_EXPECTED)?
        .map(|v| check_secs(var, v))
        .transpose()
}

fn check_secs(var: &'static str, value: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_SECS).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            expected: SECS_EXPECTED,
            value: value.to_string(),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
