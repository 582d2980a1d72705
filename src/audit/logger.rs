//! Audit log implementation with async `SQLite` operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use tokio::sync::Mutex;

use super::error::AuditError;
use super::schema::SCHEMA;
use super::types::{ceil_to_micros, format_timestamp, AuditEntry, EventType, NewAuditEntry};

const ENTRY_COLUMNS: &str = "id, message, event_type, entity_type, entity_id, created_at";

/// Returns the default path for the audit database.
///
/// This is `~/.local/share/salary-ledger/audit.db` on Unix systems.
#[must_use]
pub fn default_audit_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("salary-ledger")
        .join("audit.db")
}

/// Append-only audit log.
///
/// Every write runs in its own transaction on a dedicated database and is
/// committed before the call returns, so an entry survives whatever happens
/// to the caller's business transaction afterwards.
#[derive(Debug, Clone)]
pub struct AuditLog {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Open an audit log at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    AuditError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, AuditError> {
            let conn =
                Connection::open(&path_clone).map_err(|source| AuditError::DatabaseOpen {
                    path: path_clone,
                    source,
                })?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory audit log for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, AuditError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, AuditError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one audit entry, committed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written and committed.
    pub async fn record(
        &self,
        message: impl Into<String>,
        event_type: EventType,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Result<AuditEntry, AuditError> {
        let entry = AuditEntry::builder(event_type, entity_type, entity_id)
            .message(message)
            .build();
        self.insert(entry).await
    }

    /// Insert a pre-built entry, committed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written and committed.
    pub async fn insert(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        let log = self.clone();
        tokio::task::spawn_blocking(move || log.insert_blocking(&entry))
            .await
            .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Blocking form of [`AuditLog::insert`] for callers already on a
    /// blocking thread. Must not be called from async context.
    pub(crate) fn insert_blocking(&self, entry: &NewAuditEntry) -> Result<AuditEntry, AuditError> {
        let mut conn = self.conn.blocking_lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO audit_entries (message, event_type, entity_type, entity_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.message,
                entry.event_type.as_str(),
                entry.entity_type,
                entry.entity_id,
                format_timestamp(&entry.created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::trace!(
            id,
            event_type = %entry.event_type,
            entity_id = %entry.entity_id,
            "Audit entry committed"
        );

        Ok(AuditEntry {
            id,
            message: entry.message.clone(),
            event_type: entry.event_type,
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            created_at: entry.created_at.trunc_subsecs(6),
        })
    }

    /// Delete every entry created strictly before `cutoff` in one statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AuditError> {
        // Stored values have microsecond precision.
        let cutoff = format_timestamp(&ceil_to_micros(cutoff));

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AuditError> {
            let conn = conn.blocking_lock();
            let deleted = conn.execute(
                "DELETE FROM audit_entries WHERE created_at < ?1",
                params![cutoff],
            )?;
            Ok(deleted as u64)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Delete every entry in one statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_all(&self) -> Result<u64, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AuditError> {
            let conn = conn.blocking_lock();
            let deleted = conn.execute("DELETE FROM audit_entries", [])?;
            Ok(deleted as u64)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Get the entries for one entity, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn entries_for(
        &self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Result<Vec<AuditEntry>, AuditError> {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<AuditEntry>, AuditError> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM audit_entries
                 WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id ASC"
            ))?;
            let entries = stmt
                .query_map(params![entity_type, entity_id], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Get the most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<AuditEntry>, AuditError> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM audit_entries ORDER BY id DESC LIMIT ?1"
            ))?;
            let entries = stmt
                .query_map(
                    params![i64::try_from(limit).unwrap_or(i64::MAX)],
                    row_to_entry,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Count total entries in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_entries(&self) -> Result<u64, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AuditError> {
            let conn = conn.blocking_lock();
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))?;
            Ok(count.unsigned_abs())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Count entries by event type.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_by_event_type(&self, event_type: EventType) -> Result<u64, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AuditError> {
            let conn = conn.blocking_lock();
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM audit_entries WHERE event_type = ?1",
                params![event_type.as_str()],
                |row| row.get(0),
            )?;
            Ok(count.unsigned_abs())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let event_type: String = row.get(2)?;
    let event_type = event_type
        .parse::<EventType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(AuditEntry {
        id: row.get(0)?,
        message: row.get(1)?,
        event_type,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        created_at,
    })
}
