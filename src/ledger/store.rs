//! `SQLite` record store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tokio::sync::Mutex;

use super::error::StoreError;
use super::money::Money;
use super::record::{Record, RecordId};

/// SQL schema for the record database.
pub const RECORD_SCHEMA: &str = r"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    company TEXT NOT NULL,
    salary_cents INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_records_company ON records(company);
";

/// How long a connection waits on a database-level write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the default path for the record database.
#[must_use]
pub fn default_records_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("salary-ledger")
        .join("records.db")
}

/// Persistence for salaried records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Open a record store at the specified path, creating parent
    /// directories and the schema as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    StoreError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn =
                Connection::open(&path_clone).map_err(|source| StoreError::DatabaseOpen {
                    path: path_clone,
                    source,
                })?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(RECORD_SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory record store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, StoreError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(RECORD_SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

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

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails, including on a duplicate id.
    pub async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        let record = record.clone();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO records (id, name, company, salary_cents) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.to_string(),
                    record.name,
                    record.company,
                    record.salary.cents()
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    /// Read a record without locking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<Record>, StoreError> {
            let conn = conn.blocking_lock();
            let record = conn
                .query_row(
                    "SELECT id, name, company, salary_cents FROM records WHERE id = ?1",
                    params![id.to_string()],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    /// All records of one company, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_company(&self, company: &str) -> Result<Vec<Record>, StoreError> {
        let company = company.to_string();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Record>, StoreError> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT id, name, company, salary_cents FROM records
                 WHERE company = ?1 ORDER BY rowid ASC",
            )?;
            let records = stmt
                .query_map(params![company], row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    /// Run `body` inside one write transaction.
    ///
    /// Commits when `body` returns `Ok` and issues an explicit rollback when
    /// it returns any `Err`, so nothing `body` wrote survives a failed
    /// outcome. Blocking: call from a blocking thread only.
    pub(crate) fn with_transaction<T, E>(
        &self,
        body: impl FnOnce(&RecordTx<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn.blocking_lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let scope = RecordTx { tx };

        match body(&scope) {
            Ok(value) => {
                scope.tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = scope.tx.rollback() {
                    tracing::error!(error = %rollback_err, "Record transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// A write transaction on the record store.
pub struct RecordTx<'conn> {
    tx: Transaction<'conn>,
}

impl RecordTx<'_> {
    /// Read a record for update.
    ///
    /// The transaction holds the database write lock from its start, so the
    /// row cannot change until it ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_with_lock(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        let record = self
            .tx
            .query_row(
                "SELECT id, name, company, salary_cents FROM records WHERE id = ?1",
                params![id.to_string()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Write the record's salary.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails or the record no longer exists.
    pub fn save(&self, record: &Record) -> Result<(), StoreError> {
        let updated = self.tx.execute(
            "UPDATE records SET salary_cents = ?1 WHERE id = ?2",
            params![record.salary.cents(), record.id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::Query(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let id: String = row.get(0)?;
    let id = id
        .parse::<RecordId>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    Ok(Record {
        id,
        name: row.get(1)?,
        company: row.get(2)?,
        salary: Money::from_cents(row.get(3)?),
    })
}
