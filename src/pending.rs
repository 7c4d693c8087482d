//! Pending batch accumulator.
//!
//! Staging area for one shift's disbursements: records queue up locally
//! and nothing is written to the sheet until the end-of-shift commit. A
//! staged record carries denormalized copies of the item fields as they
//! were at staging time; they are not re-validated against live stock.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::InventorySnapshot;

/// Disbursement staging deliberately does not compare the requested
/// quantity against cached stock — the sheet's own bookkeeping is
/// authoritative and shortfall surfaces there. Transfers do pre-check
/// (see `state::AppState::handle_transfer`).
pub const DISBURSE_CHECKS_STOCK: bool = false;

/// One staged-but-uncommitted disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    /// Locally generated opaque id, used only for removal.
    pub id: String,
    pub item_id: String,
    pub item_name: String,
    pub unit: String,
    pub quantity: i64,
    pub bed_number: String,
    pub staff_name: String,
    /// Capture-time display string, not re-derived later.
    pub timestamp: String,
}

/// Accumulator owning the staged records for the current shift.
#[derive(Debug, Default, Clone)]
pub struct PendingBatch {
    records: Vec<PendingRecord>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PendingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of staged quantities across all records.
    pub fn total_quantity(&self) -> i64 {
        self.records.iter().map(|r| r.quantity).sum()
    }

    /// Whether an item is already staged (deep-link duplicate guard).
    pub fn contains_item(&self, item_id: &str) -> bool {
        self.records.iter().any(|r| r.item_id == item_id)
    }

    /// Queue one disbursement. Preconditions: the id resolves against the
    /// snapshot (case- and whitespace-insensitive), quantity is positive,
    /// and bed and staff are non-empty. An unmet precondition is a silent
    /// no-op returning `None` — the calling surface drives its own
    /// validation state (e.g. a disabled submit control).
    pub fn stage(
        &mut self,
        snapshot: &InventorySnapshot,
        raw_id: &str,
        quantity: i64,
        bed_number: &str,
        staff_name: &str,
    ) -> Option<&PendingRecord> {
        let item = snapshot.lookup(raw_id)?;
        let bed = bed_number.trim();
        let staff = staff_name.trim();
        if quantity <= 0 || bed.is_empty() || staff.is_empty() {
            return None;
        }

        self.records.push(PendingRecord {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            unit: item.unit.clone(),
            quantity,
            bed_number: bed.to_string(),
            staff_name: staff.to_string(),
            timestamp: chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
        });
        self.records.last()
    }

    /// Remove one staged record. Idempotent: an unknown id is a no-op.
    /// Destructive-action contract: the UI confirms before calling this.
    pub fn discard(&mut self, pending_id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != pending_id);
        self.records.len() != before
    }

    /// Empty the accumulator. Called only after a fully successful commit.
    pub fn clear_all(&mut self) {
        self.records.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryItem;

    fn snapshot() -> InventorySnapshot {
        let mut snap = InventorySnapshot::new();
        snap.replace_all(vec![InventoryItem {
            id: "A1".to_string(),
            name: "ผ้าก๊อซ".to_string(),
            unit: "ม้วน".to_string(),
            current_stock: 5,
            min: 2,
            max: 40,
            category: "General".to_string(),
        }]);
        snap
    }

    #[test]
    fn test_stage_resolves_id_loosely() {
        let snap = snapshot();
        let mut batch = PendingBatch::new();
        let staged = batch.stage(&snap, "a1 ", 3, "12", "ยุพดี").cloned();
        let staged = staged.expect("should stage");
        assert_eq!(staged.item_id, "A1");
        assert_eq!(staged.item_name, "ผ้าก๊อซ");
        assert_eq!(staged.unit, "ม้วน");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.total_quantity(), 3);
    }

    #[test]
    fn test_stage_rejects_invalid_input() {
        let snap = snapshot();
        let mut batch = PendingBatch::new();
        assert!(batch.stage(&snap, "A1", 0, "12", "ยุพดี").is_none());
        assert!(batch.stage(&snap, "A1", -1, "12", "ยุพดี").is_none());
        assert!(batch.stage(&snap, "A1", 1, "  ", "ยุพดี").is_none());
        assert!(batch.stage(&snap, "A1", 1, "12", "").is_none());
        assert!(batch.stage(&snap, "ZZ", 1, "12", "ยุพดี").is_none());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_stage_ignores_current_stock() {
        // A batch may exceed available stock; shortfall is the sheet's
        // problem at commit time.
        assert!(!DISBURSE_CHECKS_STOCK);
        let snap = snapshot();
        let mut batch = PendingBatch::new();
        assert!(batch.stage(&snap, "A1", 999, "12", "ยุพดี").is_some());
    }

    #[test]
    fn test_discard_is_idempotent() {
        let snap = snapshot();
        let mut batch = PendingBatch::new();
        let id = batch
            .stage(&snap, "A1", 1, "12", "ยุพดี")
            .map(|r| r.id.clone())
            .unwrap();
        assert!(batch.discard(&id));
        assert!(!batch.discard(&id));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_totals_and_clear() {
        let snap = snapshot();
        let mut batch = PendingBatch::new();
        batch.stage(&snap, "A1", 2, "12", "ยุพดี");
        batch.stage(&snap, "A1", 3, "14", "ยุพดี");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.total_quantity(), 5);
        assert!(batch.contains_item("A1"));
        batch.clear_all();
        assert!(batch.is_empty());
        assert_eq!(batch.total_quantity(), 0);
    }

    #[test]
    fn test_staged_ids_are_unique() {
        let snap = snapshot();
        let mut batch = PendingBatch::new();
        batch.stage(&snap, "A1", 1, "12", "ยุพดี");
        batch.stage(&snap, "A1", 1, "12", "ยุพดี");
        assert_ne!(batch.records()[0].id, batch.records()[1].id);
    }
}
