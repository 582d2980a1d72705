//! Audit entry types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Entity type name recorded for salary updates.
pub const EMPLOYEE_ENTITY: &str = "Employee";

/// Stage of an update cycle recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An update was requested. Written before any lock is taken.
    Attempt,
    /// The new value was written to the record.
    Success,
}

impl EventType {
    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attempt => "attempt",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Unknown event type tag read back from storage.
#[derive(Debug, thiserror::Error)]
#[error("Unknown audit event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attempt" => Ok(Self::Attempt),
            "success" => Ok(Self::Success),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// Formats a timestamp for storage.
///
/// Fixed-width UTC with microseconds, so lexical order in SQL matches
/// chronological order.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Rounds a timestamp up to the next whole microsecond, the precision of
/// stored timestamps.
///
/// A stored value is strictly before `ts` exactly when it is strictly before
/// the rounded value.
#[must_use]
pub fn ceil_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = ts.trunc_subsecs(6);
    if truncated < ts {
        truncated + Duration::microseconds(1)
    } else {
        truncated
    }
}

/// A persisted audit entry. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic row id; ascending ids follow creation order.
    pub id: i64,
    /// Free-text description.
    pub message: String,
    /// Stage of the update cycle.
    pub event_type: EventType,
    /// Name of the audited entity type.
    pub entity_type: String,
    /// Id of the audited record. Not a foreign key.
    pub entity_id: String,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create a new builder for an audit entry.
    #[must_use]
    pub fn builder(
        event_type: EventType,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> AuditEntryBuilder {
        AuditEntryBuilder::new(event_type, entity_type, entity_id)
    }
}

/// An audit entry that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub message: String,
    pub event_type: EventType,
    pub entity_type: String,
    pub entity_id: String,
    pub created_at: DateTime<Utc>,
}

/// Builder for audit entries.
#[derive(Debug, Clone)]
pub struct AuditEntryBuilder {
    message: String,
    event_type: EventType,
    entity_type: String,
    entity_id: String,
    created_at: DateTime<Utc>,
}

impl AuditEntryBuilder {
    /// Create a new builder with required fields.
    pub fn new(
        event_type: EventType,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            message: String::new(),
            event_type,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Set the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set a custom creation time.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the pending entry. The timestamp is truncated to the stored
    /// microsecond precision.
    pub fn build(self) -> NewAuditEntry {
        NewAuditEntry {
            message: self.message,
            event_type: self.event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            created_at: self.created_at.trunc_subsecs(6),
        }
    }
}
