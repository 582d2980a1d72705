//! Per-record exclusive locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::record::RecordId;

type LockTable = HashMap<RecordId, Arc<AsyncMutex<()>>>;

/// Table of exclusive locks keyed by record id.
///
/// A [`RowGuard`] blocks every other acquirer of the same id until it is
/// dropped. Different ids never contend. Entries are removed once no guard
/// or waiter references them: on guard drop, or on the next `acquire` when the
/// last waiter was cancelled.
#[derive(Debug, Clone, Default)]
pub struct RowLocks {
    table: Arc<Mutex<LockTable>>,
}

impl RowLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: RecordId) -> RowGuard {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            prune_idle(&mut table);
            table.entry(id).or_default().clone()
        };
        let guard = slot.lock_owned().await;

        RowGuard {
            id,
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    /// Number of ids currently locked or waited on.
    #[must_use]
    pub fn tracked(&self) -> usize {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        prune_idle(&mut table);
        table.len()
    }
}

/// Drop slots referenced only by the table.
fn prune_idle(table: &mut LockTable) {
    table.retain(|_, slot| Arc::strong_count(slot) > 1);
}

/// Exclusive hold on one record id, released on drop.
#[derive(Debug)]
pub struct RowGuard {
    id: RecordId,
    table: Arc<Mutex<LockTable>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RowGuard {
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        self.guard.take();
        // Only the table itself still references the slot: nobody is waiting.
        if table
            .get(&self.id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            table.remove(&self.id);
        }
    }
}
