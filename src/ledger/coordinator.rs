//! Audited, serialized salary updates.

use std::time::Duration;

use crate::audit::{AuditEntry, AuditLog, EventType, EMPLOYEE_ENTITY};

use super::error::LedgerError;
use super::locks::RowLocks;
use super::money::Money;
use super::record::{Record, RecordId};
use super::store::RecordStore;
use super::validator::{validate, SalaryBounds, ValidationResult};

/// Default time to wait for another update of the same record.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Applies salary changes to records.
///
/// One update runs as:
///
/// 1. an `attempt` audit entry, committed on its own;
/// 2. the record's row lock and a write transaction on the record store;
/// 3. validation against the locked, current salary;
/// 4. on rejection, an explicit rollback and [`LedgerError::InvalidValue`];
/// 5. otherwise the write, a `success` audit entry committed on its own,
///    and the commit.
///
/// The audit log is a separate database, so neither entry is undone by a
/// rollback of the record transaction.
#[derive(Debug, Clone)]
pub struct SalaryCoordinator {
    records: RecordStore,
    audit: AuditLog,
    bounds: SalaryBounds,
    locks: RowLocks,
    lock_timeout: Duration,
}

impl SalaryCoordinator {
    /// Create a coordinator over the two stores.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidBounds`] if `bounds` fail
    /// [`SalaryBounds::check`].
    pub fn new(
        records: RecordStore,
        audit: AuditLog,
        bounds: SalaryBounds,
    ) -> Result<Self, LedgerError> {
        bounds.check()?;
        Ok(Self {
            records,
            audit,
            bounds,
            locks: RowLocks::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Set how long an update waits for the record lock.
    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    #[must_use]
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    #[must_use]
    pub fn bounds(&self) -> &SalaryBounds {
        &self.bounds
    }

    #[must_use]
    pub fn row_locks(&self) -> &RowLocks {
        &self.locks
    }

    /// Set the salary of `id` to `proposed`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidValue`] if a bound is broken,
    /// [`LedgerError::NotFound`] for an unknown id, and an infrastructure
    /// error if the lock, the record store or the audit log fails.
    pub async fn update_salary(
        &self,
        id: RecordId,
        proposed: Money,
    ) -> Result<Record, LedgerError> {
        self.run_update(id, format!("Salary update to {proposed} requested"), move |_| {
            proposed
        })
        .await
    }

    /// Multiply the salary of `id` by `factor`.
    ///
    /// The new value is computed from the salary read under the row lock,
    /// so concurrent scalings of one record compound instead of
    /// overwriting each other.
    ///
    /// # Errors
    ///
    /// Same as [`SalaryCoordinator::update_salary`].
    pub async fn scale_salary(&self, id: RecordId, factor: f64) -> Result<Record, LedgerError> {
        self.run_update(id, format!("Salary scaling by {factor} requested"), move |current| {
            current.scale(factor)
        })
        .await
    }

    async fn run_update<F>(
        &self,
        id: RecordId,
        attempt_message: String,
        propose: F,
    ) -> Result<Record, LedgerError>
    where
        F: FnOnce(Money) -> Money + Send + 'static,
    {
        self.audit
            .record(attempt_message, EventType::Attempt, EMPLOYEE_ENTITY, id.to_string())
            .await?;

        let row = tokio::time::timeout(self.lock_timeout, self.locks.acquire(id))
            .await
            .map_err(|_| LedgerError::LockTimeout {
                id,
                waited: self.lock_timeout,
            })?;
        tracing::debug!(%id, "Row lock acquired");

        let records = self.records.clone();
        let audit = self.audit.clone();
        let bounds = self.bounds.clone();
        let result = tokio::task::spawn_blocking(move || {
            // Held until the transaction has committed or rolled back.
            let _row = row;
            records.with_transaction(|tx| -> Result<Record, LedgerError> {
                let mut record = tx.find_with_lock(id)?.ok_or(LedgerError::NotFound(id))?;
                let previous = record.salary;
                let proposed = propose(previous);

                if let ValidationResult::Rejected(rejection) =
                    validate(previous, proposed, &bounds)
                {
                    return Err(LedgerError::InvalidValue { id, rejection });
                }

                record.salary = proposed;
                tx.save(&record)?;

                let success =
                    AuditEntry::builder(EventType::Success, EMPLOYEE_ENTITY, id.to_string())
                        .message(format!("Salary changed from {previous} to {proposed}"))
                        .build();
                audit.insert_blocking(&success)?;

                Ok(record)
            })
        })
        .await
        .map_err(|_| LedgerError::TaskCancelled)?;

        match &result {
            Ok(record) => tracing::info!(%id, salary = %record.salary, "Salary updated"),
            Err(LedgerError::InvalidValue { rejection, .. }) => {
                tracing::warn!(%id, reason = %rejection, "Salary update rejected");
            }
            Err(LedgerError::NotFound(_)) => {
                tracing::warn!(%id, "Salary update for unknown record");
            }
            Err(err) => tracing::error!(%id, error = %err, "Salary update failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup(salary: Money) -> (SalaryCoordinator, Record) {
        let records = RecordStore::open_in_memory().await.unwrap();
        let audit = AuditLog::open_in_memory().await.unwrap();
        let record = Record::new("Ada", "Acme", salary);
        records.insert(&record).await.unwrap();
        let coordinator =
            SalaryCoordinator::new(records, audit, SalaryBounds::default()).unwrap();
        (coordinator, record)
    }

    #[tokio::test]
    async fn test_new_rejects_unusable_bounds() {
        let records = RecordStore::open_in_memory().await.unwrap();
        let audit = AuditLog::open_in_memory().await.unwrap();
        let bounds = SalaryBounds {
            min_decrease_factor: f64::NAN,
            ..SalaryBounds::default()
        };

        let err = SalaryCoordinator::new(records, audit, bounds).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidBounds(_)), "{err}");
        assert!(err.is_infrastructure());
    }

    async fn event_types(coordinator: &SalaryCoordinator, id: RecordId) -> Vec<EventType> {
        coordinator
            .audit()
            .entries_for(EMPLOYEE_ENTITY, id.to_string())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[tokio::test]
    async fn test_accepted_update_writes_attempt_then_success() {
        let (coordinator, record) = setup(Money::from_units(5000)).await;

        let updated = coordinator
            .update_salary(record.id, Money::from_units(6000))
            .await
            .unwrap();

        assert_eq!(updated.salary, Money::from_units(6000));
        assert_eq!(
            event_types(&coordinator, record.id).await,
            [EventType::Attempt, EventType::Success]
        );
    }

    #[tokio::test]
    async fn test_rejection_keeps_attempt_only() {
        let (coordinator, record) = setup(Money::from_units(5000)).await;

        let err = coordinator
            .update_salary(record.id, Money::from_units(10_500))
            .await
            .unwrap_err();

        let reason = err.rejection().map(|r| r.to_string());
        assert_eq!(reason.as_deref(), Some("increase too large"));
        assert_eq!(event_types(&coordinator, record.id).await, [EventType::Attempt]);
        let stored = coordinator.records().get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.salary, Money::from_units(5000));
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let (coordinator, _) = setup(Money::from_units(5000)).await;
        let missing = RecordId::new();

        let err = coordinator
            .update_salary(missing, Money::from_units(6000))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::NotFound(id) if id == missing));
        assert!(!err.is_infrastructure());
    }

    #[tokio::test]
    async fn test_lock_timeout_is_infrastructure_error() {
        let (coordinator, record) = setup(Money::from_units(5000)).await;
        let coordinator = coordinator.with_lock_timeout(Duration::from_millis(20));

        let _held = coordinator.row_locks().acquire(record.id).await;
        let err = coordinator
            .update_salary(record.id, Money::from_units(6000))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::LockTimeout { .. }));
        assert!(err.is_infrastructure());
        // The attempt was audited before waiting on the lock.
        assert_eq!(event_types(&coordinator, record.id).await, [EventType::Attempt]);
    }

    #[tokio::test]
    async fn test_scale_salary() {
        let (coordinator, record) = setup(Money::from_units(5000)).await;

        let updated = coordinator.scale_salary(record.id, 1.1).await.unwrap();
        assert_eq!(updated.salary, Money::from_units(5500));
    }

    #[tokio::test]
    async fn test_row_lock_released_after_update() {
        let (coordinator, record) = setup(Money::from_units(5000)).await;

        coordinator
            .update_salary(record.id, Money::from_units(1))
            .await
            .unwrap_err();
        coordinator
            .update_salary(record.id, Money::from_units(6000))
            .await
            .unwrap();

        assert_eq!(coordinator.row_locks().tracked(), 0);
    }
}
