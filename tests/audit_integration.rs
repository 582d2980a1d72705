//! Integration tests for the audit log and its retention.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use salary_ledger::audit::{AuditEntry, AuditLog, EventType, LogPurge, EMPLOYEE_ENTITY};
use tempfile::TempDir;

/// Helper to create a unique database path in a temp directory.
fn temp_db_path(temp_dir: &TempDir, name: &str) -> PathBuf {
    temp_dir
        .path()
        .join(format!("{}-{}.db", name, std::process::id()))
}

/// Test that nested directories are created when opening audit log.
#[tokio::test]
async fn test_audit_log_nested_directory_creation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let nested_path = temp_dir
        .path()
        .join("deeply")
        .join("nested")
        .join("audit.db");

    assert!(!nested_path.parent().unwrap().exists());

    let log = AuditLog::open(&nested_path)
        .await
        .expect("Failed to open audit log with nested path");

    assert!(nested_path.exists());
    assert_eq!(log.path(), Some(nested_path.as_path()));
    log.record("opened", EventType::Attempt, EMPLOYEE_ENTITY, "emp-1")
        .await
        .expect("Failed to record entry");
}

/// 1000 entries, half older than five days: the purge removes exactly that half.
#[tokio::test]
async fn test_purge_older_than_exact_count() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = AuditLog::open(temp_db_path(&temp_dir, "audit-purge"))
        .await
        .expect("Failed to open audit log");

    let now = Utc::now();
    let cutoff = now - Duration::days(5);
    for i in 0..1000_i64 {
        let created_at = if i % 2 == 0 {
            cutoff - Duration::hours(1 + i)
        } else {
            cutoff + Duration::minutes(1 + i)
        };
        let entry = AuditEntry::builder(EventType::Attempt, EMPLOYEE_ENTITY, format!("emp-{i}"))
            .message("seeded")
            .created_at(created_at)
            .build();
        log.insert(entry).await.expect("Failed to seed entry");
    }
    assert_eq!(log.count_entries().await.unwrap(), 1000);

    let purge = LogPurge::new(log.clone());
    let removed = purge
        .purge_older_than(cutoff)
        .await
        .expect("Failed to purge");

    assert_eq!(removed, 500);
    assert_eq!(log.count_entries().await.unwrap(), 500);

    let remaining = log.recent(1000).await.unwrap();
    assert!(remaining.iter().all(|e| e.created_at >= cutoff));

    // Nothing left to remove at the same cutoff.
    assert_eq!(purge.purge_older_than(cutoff).await.unwrap(), 0);
}

#[tokio::test]
async fn test_purge_all() {
    let log = AuditLog::open_in_memory().await.unwrap();
    for i in 0..25 {
        log.record(format!("entry {i}"), EventType::Success, EMPLOYEE_ENTITY, "emp-1")
            .await
            .unwrap();
    }

    let purge = LogPurge::new(log.clone());
    assert_eq!(purge.purge_all().await.unwrap(), 25);
    assert_eq!(log.count_entries().await.unwrap(), 0);
}

/// Entries survive closing and reopening the database.
#[tokio::test]
async fn test_entries_persist_across_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_db_path(&temp_dir, "audit-reopen");

    {
        let log = AuditLog::open(&db_path).await.unwrap();
        log.record("before restart", EventType::Attempt, EMPLOYEE_ENTITY, "emp-1")
            .await
            .unwrap();
    }

    let log = AuditLog::open(&db_path).await.unwrap();
    let entries = log.entries_for(EMPLOYEE_ENTITY, "emp-1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "before restart");
}

/// Test concurrent access to audit log.
#[tokio::test]
async fn test_concurrent_logging() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = AuditLog::open(temp_db_path(&temp_dir, "audit-concurrent"))
        .await
        .expect("Failed to open audit log");

    let mut handles = Vec::new();
    for i in 0..10 {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            log.record(
                format!("concurrent {i}"),
                EventType::Attempt,
                EMPLOYEE_ENTITY,
                "emp-1",
            )
            .await
        }));
    }

    for handle in handles {
        handle
            .await
            .unwrap()
            .expect("Failed to record entry concurrently");
    }

    let entries = log.entries_for(EMPLOYEE_ENTITY, "emp-1").await.unwrap();
    assert_eq!(entries.len(), 10);
    assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
}
