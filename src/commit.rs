//! Batch commit coordinator.
//!
//! Drains the pending batch as one user-triggered "end of shift" action:
//! one sheet write per staged record, issued strictly in staging order and
//! sequentially (the k+1-th write starts only after the k-th returned), so
//! the sheet's append order matches the order the nurse staged things and
//! the script endpoint never sees concurrent load from one terminal.
//!
//! Failure semantics are all-or-nothing-abort: the first write that errors
//! abandons the rest of the batch in place — nothing is cleared, so the
//! whole batch can be retried. There is no per-item retry; the write
//! transport cannot confirm delivery, so partial bookkeeping would be a
//! guess.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::gateway::{disburse_payload, Ledger};
use crate::inventory::InventoryItem;
use crate::normalize;
use crate::pending::PendingBatch;

// ---------------------------------------------------------------------------
// Single-flight guard
// ---------------------------------------------------------------------------

/// Session-scoped commit guard. Cooperative, not a lock: there is one
/// coordinator per session and the UI disables its trigger while a commit
/// is in flight; this flag is what the trigger state reads.
#[derive(Debug, Default)]
pub struct CommitGuard {
    in_flight: AtomicBool,
}

impl CommitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard. Returns `false` when a commit is already running.
    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Result of a successful batch commit.
#[derive(Debug)]
pub struct CommitOutcome {
    /// Number of disbursement writes issued.
    pub written: usize,
    /// Fresh snapshot fetched after the writes, if the refresh succeeded.
    /// The server is authoritative for stock levels; local arithmetic is
    /// never trusted, so `None` means "keep showing the stale snapshot
    /// until the next explicit refresh", not "apply a local guess".
    pub refreshed: Option<Vec<InventoryItem>>,
}

/// Commit every staged record, in staging order, one write at a time.
///
/// On the first write error the remaining records are not sent and the
/// batch is left fully intact for retry. On success the batch is cleared
/// and a wholesale inventory refresh is attempted.
pub async fn commit_batch<L: Ledger>(
    ledger: &L,
    batch: &mut PendingBatch,
) -> Result<CommitOutcome, String> {
    let total = batch.len();
    if total == 0 {
        return Ok(CommitOutcome {
            written: 0,
            refreshed: None,
        });
    }

    info!(records = total, "starting batch commit");

    for (idx, record) in batch.records().iter().enumerate() {
        if let Err(e) = ledger.write(&disburse_payload(record)).await {
            warn!(
                position = idx + 1,
                total,
                error = %e,
                "batch commit aborted; accumulator left intact"
            );
            return Err(format!(
                "เกิดข้อผิดพลาดในการบันทึกข้อมูล (รายการที่ {} จาก {}): {e}",
                idx + 1,
                total
            ));
        }
    }

    batch.clear_all();

    // Refresh failure after a fully committed batch is not a commit
    // failure — the writes are out and must not be retried.
    let refreshed = match ledger.fetch_inventory().await {
        Ok(data) => Some(normalize::parse_inventory_rows(&data)),
        Err(e) => {
            warn!(error = %e, "post-commit inventory refresh failed");
            None
        }
    };

    info!(written = total, "batch commit completed");
    Ok(CommitOutcome {
        written: total,
        refreshed,
    })
}

/// `commit_batch` behind the single-flight guard. The guard is released on
/// every exit path.
pub async fn commit_batch_guarded<L: Ledger>(
    guard: &CommitGuard,
    ledger: &L,
    batch: &mut PendingBatch,
) -> Result<CommitOutcome, String> {
    if !guard.try_begin() {
        return Err("A batch commit is already in flight".to_string());
    }
    let result = commit_batch(ledger, batch).await;
    guard.finish();
    result
}

// ===========================================================================
// Tests
// ===========================================================================
