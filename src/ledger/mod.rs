//! Salary records and the transactional update path.

mod batch;
mod coordinator;
mod error;
mod locks;
mod money;
mod record;
mod store;
mod validator;

pub use batch::{BatchRaise, RaiseFailure, RaiseReport};
pub use coordinator::{SalaryCoordinator, DEFAULT_LOCK_TIMEOUT};
pub use error::{LedgerError, StoreError};
pub use locks::{RowGuard, RowLocks};
pub use money::{Money, MoneyParseError};
pub use record::{Record, RecordId};
pub use store::{default_records_path, RecordStore, RecordTx, RECORD_SCHEMA};
pub use validator::{validate, InvalidBounds, Rejection, SalaryBounds, ValidationResult};
