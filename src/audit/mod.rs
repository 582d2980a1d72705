//! Append-only audit trail for salary updates, and its retention.

mod error;
mod logger;
mod purge;
mod schema;
mod types;

pub use error::AuditError;
pub use logger::{default_audit_path, AuditLog};
pub use purge::LogPurge;
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use types::{
    ceil_to_micros, format_timestamp, AuditEntry, AuditEntryBuilder, EventType, NewAuditEntry,
    UnknownEventType, EMPLOYEE_ENTITY,
};
