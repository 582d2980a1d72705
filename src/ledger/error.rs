//! Ledger error types.

use std::path::PathBuf;
use std::time::Duration;

use crate::audit::AuditError;

use super::record::RecordId;
use super::validator::{InvalidBounds, Rejection};

/// Errors from the record database.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Failed to open or create database.
    #[error("Failed to open record database at {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to execute SQL.
    #[error("Record query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Blocking task was cancelled.
    #[error("Blocking task cancelled")]
    TaskCancelled,

    /// Failed to create parent directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from salary updates.
///
/// `InvalidValue` and `NotFound` are expected outcomes the caller can act
/// on. Everything else is infrastructure failure, see
/// [`LedgerError::is_infrastructure`].
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    /// The proposed salary broke a business rule. The record is unchanged.
    #[error("Invalid salary for record {id}: {rejection}")]
    InvalidValue { id: RecordId, rejection: Rejection },

    /// No record with this id.
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// Another update held the record lock for too long.
    #[error("Timed out after {waited:?} waiting for lock on record {id}")]
    LockTimeout { id: RecordId, waited: Duration },

    /// The audit entry could not be written, so the update did not proceed.
    #[error("Audit write failed: {0}")]
    Audit(#[from] AuditError),

    /// Record database failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The coordinator was given unusable bounds.
    #[error(transparent)]
    InvalidBounds(#[from] InvalidBounds),

    /// Blocking task was cancelled.
    #[error("Blocking task cancelled")]
    TaskCancelled,
}

impl LedgerError {
    /// True for failures of the surrounding infrastructure rather than of
    /// the request itself.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, Self::InvalidValue { .. } | Self::NotFound(_))
    }

    /// The violated rule, if this is a business-rule rejection.
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::InvalidValue { rejection, .. } => Some(*rejection),
            _ => None,
        }
    }
}
