//! Group-wide salary raises.

use serde::Serialize;

use super::coordinator::SalaryCoordinator;
use super::error::LedgerError;
use super::record::{Record, RecordId};

/// A record the raise could not be applied to.
#[derive(Debug, Clone, Serialize)]
pub struct RaiseFailure {
    pub record_id: RecordId,
    pub reason: String,
    /// The failure came from storage or locking, not from a salary rule.
    pub infrastructure: bool,
}

/// Outcome of [`BatchRaise::apply_group_raise`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RaiseReport {
    pub company: String,
    pub percentage: f64,
    pub updated: Vec<Record>,
    pub failures: Vec<RaiseFailure>,
}

impl RaiseReport {
    /// Number of records the raise was attempted on.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.updated.len() + self.failures.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies one percentage raise to every record of a company.
///
/// Each record goes through its own [`SalaryCoordinator`] update. A failure
/// on one record is logged and reported, and the remaining records are still
/// processed. There is no atomicity across records.
#[derive(Debug, Clone)]
pub struct BatchRaise {
    coordinator: SalaryCoordinator,
}

impl BatchRaise {
    #[must_use]
    pub fn new(coordinator: SalaryCoordinator) -> Self {
        Self { coordinator }
    }

    /// Scale the salary of every record in `company` by
    /// `1 + percentage / 100`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the company's records cannot be listed.
    /// Per-record failures are collected in the report.
    pub async fn apply_group_raise(
        &self,
        company: &str,
        percentage: f64,
    ) -> Result<RaiseReport, LedgerError> {
        let records = self.coordinator.records().find_by_company(company).await?;
        let factor = 1.0 + percentage / 100.0;

        tracing::info!(company, percentage, records = records.len(), "Applying group raise");

        let mut report = RaiseReport {
            company: company.to_string(),
            percentage,
            ..RaiseReport::default()
        };

        for record in records {
            match self.coordinator.scale_salary(record.id, factor).await {
                Ok(updated) => report.updated.push(updated),
                Err(err) => {
                    tracing::warn!(
                        company,
                        record_id = %record.id,
                        error = %err,
                        "Raise skipped for record"
                    );
                    report.failures.push(RaiseFailure {
                        record_id: record.id,
                        reason: err.to_string(),
                        infrastructure: err.is_infrastructure(),
                    });
                }
            }
        }

        tracing::info!(
            company,
            updated = report.updated.len(),
            failed = report.failures.len(),
            "Group raise finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::ledger::money::Money;
    use crate::ledger::store::RecordStore;
    use crate::ledger::validator::SalaryBounds;

    async fn batch_with(records: &[Record], bounds: SalaryBounds) -> BatchRaise {
        let store = RecordStore::open_in_memory().await.unwrap();
        for record in records {
            store.insert(record).await.unwrap();
        }
        let audit = AuditLog::open_in_memory().await.unwrap();
        BatchRaise::new(SalaryCoordinator::new(store, audit, bounds).unwrap())
    }

    #[tokio::test]
    async fn test_raise_applies_to_company_only() {
        let acme = Record::new("Ada", "Acme", Money::from_units(1000));
        let globex = Record::new("Bob", "Globex", Money::from_units(1000));
        let batch = batch_with(&[acme.clone(), globex.clone()], SalaryBounds::default()).await;

        let report = batch.apply_group_raise("Acme", 10.0).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.attempted(), 1);
        assert_eq!(report.updated[0].salary, Money::from_units(1100));

        let store = batch.coordinator.records();
        let untouched = store.get(globex.id).await.unwrap().unwrap();
        assert_eq!(untouched.salary, Money::from_units(1000));
    }

    #[tokio::test]
    async fn test_empty_group() {
        let batch = batch_with(&[], SalaryBounds::default()).await;

        let report = batch.apply_group_raise("Nobody", 5.0).await.unwrap();
        assert_eq!(report.attempted(), 0);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_negative_percentage_is_a_cut() {
        let record = Record::new("Ada", "Acme", Money::from_units(1000));
        let batch = batch_with(&[record], SalaryBounds::default()).await;

        let report = batch.apply_group_raise("Acme", -20.0).await.unwrap();
        assert_eq!(report.updated[0].salary, Money::from_units(800));
    }

    #[tokio::test]
    async fn test_failure_reported_not_raised() {
        let record = Record::new("Ada", "Acme", Money::from_units(1000));
        let batch = batch_with(&[record.clone()], SalaryBounds::default()).await;

        // Tripling breaks the increase bound.
        let report = batch.apply_group_raise("Acme", 200.0).await.unwrap();

        assert!(report.updated.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].record_id, record.id);
        assert!(report.failures[0].reason.contains("increase too large"));
        assert!(!report.failures[0].infrastructure);
    }
}
