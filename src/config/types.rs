//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::default_audit_path;
use crate::ledger::{default_records_path, SalaryBounds};

/// Database locations. Unset paths fall back to the user data directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub records_path: Option<PathBuf>,
    pub audit_path: Option<PathBuf>,
}

/// Configuration for the salary ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// How long an update waits for another update of the same record.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub bounds: SalaryBounds,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            bounds: SalaryBounds::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl LedgerConfig {
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        self.storage
            .records_path
            .clone()
            .unwrap_or_else(default_records_path)
    }

    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        self.storage
            .audit_path
            .clone()
            .unwrap_or_else(default_audit_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Money;

    #[test]
    fn test_ledger_config_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.bounds, SalaryBounds::default());
        assert!(config.records_path().ends_with("salary-ledger/records.db"));
        assert!(config.audit_path().ends_with("salary-ledger/audit.db"));
    }

    #[test]
    fn test_ledger_config_deserialize() {
        let toml = r#"
            lock_timeout_ms = 250

            [bounds]
            max_increase_factor = 3.0
            absolute_ceiling = "50000.00"

            [storage]
            audit_path = "/var/lib/ledger/audit.db"
        "#;
        let config: LedgerConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert!((config.bounds.max_increase_factor - 3.0).abs() < f64::EPSILON);
        assert!((config.bounds.min_decrease_factor - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.bounds.absolute_ceiling, Money::from_units(50_000));
        assert_eq!(config.audit_path(), PathBuf::from("/var/lib/ledger/audit.db"));
        assert!(config.storage.records_path.is_none());
    }

    #[test]
    fn test_ledger_config_empty_toml() {
        let config: LedgerConfig = toml::from_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
    }
}
