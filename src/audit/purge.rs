//! Retention maintenance for the audit log.

use chrono::{DateTime, Duration, Utc};

use super::error::AuditError;
use super::logger::AuditLog;

/// Bulk deletion of audit entries.
///
/// Each purge is a single set-based `DELETE`; entries are never removed one
/// row at a time.
#[derive(Debug, Clone)]
pub struct LogPurge {
    log: AuditLog,
}

impl LogPurge {
    #[must_use]
    pub fn new(log: AuditLog) -> Self {
        Self { log }
    }

    /// Remove every entry created before `cutoff`. Entries at or after the
    /// cutoff are kept.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AuditError> {
        let removed = self.log.delete_older_than(cutoff).await?;
        tracing::info!(%cutoff, removed, "Purged audit entries");
        Ok(removed)
    }

    /// Remove entries older than `days` days from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn purge_older_than_days(&self, days: u32) -> Result<u64, AuditError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        self.purge_older_than(cutoff).await
    }

    /// Remove every entry. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn purge_all(&self) -> Result<u64, AuditError> {
        let removed = self.log.delete_all().await?;
        tracing::info!(removed, "Purged all audit entries");
        Ok(removed)
    }
}
