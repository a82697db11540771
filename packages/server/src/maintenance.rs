//! Retention sweeps over the audit log and the session table.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::storage::{Storage, StorageError};

/// Delete audit entries created before `now - retention`.
pub async fn purge_audit_logs(
    storage: &dyn Storage,
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<u64, StorageError> {
    let removed = storage.purge_audit_before(now - retention).await?;
    if removed > 0 {
        info!("maintenance: purged {removed} audit entries");
    }
    Ok(removed)
}

/// Delete every session whose `expires_at <= now`.
pub async fn purge_expired_sessions(
    storage: &dyn Storage,
    now: DateTime<Utc>,
) -> Result<u64, StorageError> {
    let removed = storage.purge_expired_sessions(now).await?;
    if removed > 0 {
        info!("maintenance: purged {removed} expired sessions");
    }
    Ok(removed)
}
