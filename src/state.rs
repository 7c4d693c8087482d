//! Application state and the flows that mutate it.
//!
//! One `AppState` per session. Pure view/data transitions go through
//! [`AppState::apply`]; anything that talks to the sheet goes through the
//! async `handle_*` methods, which are generic over [`Ledger`] so tests can
//! drive them with a recording mock.

use tracing::{info, warn};

use crate::commit::{self, CommitGuard, CommitOutcome};
use crate::gateway::{
    delete_payload, income_payload, intake_payload, outcome_payload, transfer_payload,
    update_payload, Ledger,
};
use crate::history::{HistoryRecord, TransactionLog};
use crate::inventory::{InventoryItem, InventorySnapshot};
use crate::normalize;
use crate::pending::PendingBatch;

/// Which surface the user is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Scanner,
    PendingList,
    Dashboard,
    Inventory,
    History,
}

/// Pure state transitions. Network flows live on `AppState` directly.
#[derive(Debug)]
pub enum AppEvent {
    SwitchView(ViewState),
    SnapshotReplaced(Vec<InventoryItem>),
    SnapshotFetchFailed(String),
    HistoryReplaced(Vec<HistoryRecord>),
    RecordStaged {
        raw_id: String,
        quantity: i64,
        bed_number: String,
        staff_name: String,
    },
    RecordDiscarded(String),
    CommitFinished,
    UserSelected(String),
    UserCleared,
}

#[derive(Default)]
pub struct AppState {
    pub view: ViewState,
    pub snapshot: InventorySnapshot,
    pub log: TransactionLog,
    pub batch: PendingBatch,
    /// Banner text for the last failed fetch. Cleared by the next
    /// successful snapshot; the stale snapshot stays visible underneath.
    pub fetch_error: Option<String>,
    pub current_user: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::SwitchView(view) => self.view = view,
            AppEvent::SnapshotReplaced(items) => {
                self.snapshot.replace_all(items);
                self.fetch_error = None;
            }
            AppEvent::SnapshotFetchFailed(e) => {
                self.fetch_error = Some(format!("ไม่สามารถโหลดข้อมูลได้: {e}"));
            }
            AppEvent::HistoryReplaced(records) => self.log.replace_all(records),
            AppEvent::RecordStaged {
                raw_id,
                quantity,
                bed_number,
                staff_name,
            } => {
                let snapshot = &self.snapshot;
                self.batch
                    .stage(snapshot, &raw_id, quantity, &bed_number, &staff_name);
            }
            AppEvent::RecordDiscarded(pending_id) => {
                self.batch.discard(&pending_id);
            }
            AppEvent::CommitFinished => self.view = ViewState::Scanner,
            AppEvent::UserSelected(name) => self.current_user = Some(name),
            AppEvent::UserCleared => self.current_user = None,
        }
    }

    /// Entry via a shared link carrying an item name. Pre-stages one unit
    /// of the named item and lands on the pending list. A second open of
    /// the same link must not double-stage the item.
    pub fn apply_deep_link(&mut self, item_name: &str, ward: &str, staff: &str) -> bool {
        let Some(item) = self.snapshot.find_by_name(item_name) else {
            warn!(item = item_name, "deep link named an unknown item");
            return false;
        };
        if self.batch.contains_item(&item.id) {
            self.view = ViewState::PendingList;
            return false;
        }
        let id = item.id.clone();
        let staged = self.batch.stage(&self.snapshot, &id, 1, ward, staff).is_some();
        if staged {
            self.view = ViewState::PendingList;
        }
        staged
    }

    // -----------------------------------------------------------------------
    // Fetch flows
    // -----------------------------------------------------------------------

    pub async fn refresh_inventory<L: Ledger>(&mut self, ledger: &L) -> Result<(), String> {
        match ledger.fetch_inventory().await {
            Ok(data) => {
                let items = normalize::parse_inventory_rows(&data);
                info!(items = items.len(), "inventory refreshed");
                self.apply(AppEvent::SnapshotReplaced(items));
                Ok(())
            }
            Err(e) => {
                self.apply(AppEvent::SnapshotFetchFailed(e.clone()));
                Err(e)
            }
        }
    }

    pub async fn refresh_history<L: Ledger>(&mut self, ledger: &L) -> Result<(), String> {
        match ledger.fetch_history().await {
            Ok(data) => {
                let records = normalize::parse_history_rows(&data);
                info!(records = records.len(), "history refreshed");
                self.apply(AppEvent::HistoryReplaced(records));
                Ok(())
            }
            Err(e) => {
                self.apply(AppEvent::SnapshotFetchFailed(e.clone()));
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Immediate (non-batched) write flows
    // -----------------------------------------------------------------------
    //
    // Each one validates, writes, then re-fetches. Stock arithmetic is the
    // script's job; the snapshot only changes through a refresh.

    /// Record received stock for a known item.
    pub async fn handle_intake<L: Ledger>(
        &mut self,
        ledger: &L,
        item_id: &str,
        amount: i64,
        user: &str,
    ) -> Result<(), String> {
        if amount <= 0 {
            return Err("จำนวนต้องมากกว่า 0".to_string());
        }
        if user.trim().is_empty() {
            return Err("กรุณาเลือกชื่อผู้บันทึก".to_string());
        }
        let item = self
            .snapshot
            .lookup(item_id)
            .ok_or_else(|| format!("ไม่พบรายการ {item_id}"))?;

        let payload = intake_payload(item, amount, user.trim());
        ledger.write(&payload).await?;
        self.refresh_inventory(ledger).await
    }

    /// Transfer stock to another ward. The only flow with a client-side
    /// stock check: a transfer exceeding the cached level is refused before
    /// any write.
    pub async fn handle_transfer<L: Ledger>(
        &mut self,
        ledger: &L,
        item_id: &str,
        amount: i64,
        user: &str,
        recipient: &str,
        notes: &str,
    ) -> Result<(), String> {
        if amount <= 0 {
            return Err("จำนวนต้องมากกว่า 0".to_string());
        }
        if user.trim().is_empty() || recipient.trim().is_empty() {
            return Err("กรุณาระบุผู้โอนและหน่วยงานปลายทาง".to_string());
        }
        let item = self
            .snapshot
            .lookup(item_id)
            .ok_or_else(|| format!("ไม่พบรายการ {item_id}"))?;
        if amount > item.current_stock {
            return Err(format!(
                "สต็อกไม่เพียงพอ: {} คงเหลือ {} {}",
                item.name, item.current_stock, item.unit
            ));
        }

        let payload = transfer_payload(item, amount, user.trim(), recipient.trim(), notes.trim());
        ledger.write(&payload).await?;
        self.refresh_inventory(ledger).await
    }

    /// Edit an item's master data (name, unit, thresholds).
    pub async fn handle_update_item<L: Ledger>(
        &mut self,
        ledger: &L,
        item: &InventoryItem,
    ) -> Result<(), String> {
        if item.name.trim().is_empty() {
            return Err("ชื่อรายการห้ามว่าง".to_string());
        }
        ledger.write(&update_payload(item)).await?;
        self.refresh_inventory(ledger).await
    }

    /// Delete an item. The row only disappears from the snapshot once the
    /// post-write refresh lands.
    pub async fn handle_delete_item<L: Ledger>(
        &mut self,
        ledger: &L,
        item_id: &str,
    ) -> Result<(), String> {
        if self.snapshot.lookup(item_id).is_none() {
            return Err(format!("ไม่พบรายการ {item_id}"));
        }
        ledger.write(&delete_payload(item_id)).await?;
        self.refresh_inventory(ledger).await
    }

    // -----------------------------------------------------------------------
    // By-name flows for the command interpreter
    // -----------------------------------------------------------------------

    /// Record an intake keyed by item name (income row). Unknown names are
    /// allowed — the script appends the row either way.
    pub async fn record_income_by_name<L: Ledger>(
        &mut self,
        ledger: &L,
        item_name: &str,
        amount: i64,
        unit: &str,
        source: &str,
        remark: &str,
    ) -> Result<String, String> {
        if amount <= 0 {
            return Err("จำนวนต้องมากกว่า 0".to_string());
        }
        let receiver = self.current_user.as_deref().unwrap_or("ไม่ระบุ");
        let payload = income_payload(item_name, amount, unit, receiver, source, remark);
        ledger.write(&payload).await?;
        let _ = self.refresh_inventory(ledger).await;
        Ok(format!(
            "บันทึกรับเข้า {item_name} จำนวน {amount} เรียบร้อย (Google Sheets: บันทึกรับเข้าเรียบร้อย)"
        ))
    }

    /// Record a usage keyed by item name (outcome row).
    pub async fn record_outcome_by_name<L: Ledger>(
        &mut self,
        ledger: &L,
        item_name: &str,
        amount: i64,
        unit: &str,
        location: &str,
        remark: &str,
    ) -> Result<String, String> {
        if amount <= 0 {
            return Err("จำนวนต้องมากกว่า 0".to_string());
        }
        let requester = self.current_user.as_deref().unwrap_or("ไม่ระบุ");
        let note = if location.trim().is_empty() {
            remark.to_string()
        } else {
            format!("{location} {remark}").trim().to_string()
        };
        let payload = outcome_payload(item_name, amount, unit, requester, &note);
        ledger.write(&payload).await?;
        let _ = self.refresh_inventory(ledger).await;
        Ok(format!(
            "บันทึกเบิกใช้ {item_name} จำนวน {amount} เรียบร้อย (Google Sheets: บันทึกเบิกใช้เรียบร้อย)"
        ))
    }

    // -----------------------------------------------------------------------
    // Batch commit
    // -----------------------------------------------------------------------

    /// Commit the pending batch behind the single-flight guard and fold the
    /// outcome back into the snapshot. On success the user lands back on
    /// the scanner.
    pub async fn commit_pending<L: Ledger>(
        &mut self,
        guard: &CommitGuard,
        ledger: &L,
    ) -> Result<CommitOutcome, String> {
        let outcome = commit::commit_batch_guarded(guard, ledger, &mut self.batch).await?;
        if let Some(items) = &outcome.refreshed {
            self.apply(AppEvent::SnapshotReplaced(items.clone()));
        }
        if outcome.written > 0 {
            self.apply(AppEvent::CommitFinished);
        }
        Ok(outcome)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct MockLedger {
        writes: Mutex<Vec<Value>>,
        inventory: Value,
        fail_writes: bool,
    }

    impl MockLedger {
        fn new(inventory: Value) -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                inventory,
                fail_writes: false,
            }
        }
    }

    impl Ledger for MockLedger {
        async fn fetch_inventory(&self) -> Result<Value, String> {
            Ok(self.inventory.clone())
        }

        async fn fetch_history(&self) -> Result<Value, String> {
            Ok(json!([]))
        }

        async fn write(&self, payload: &Value) -> Result<(), String> {
            if self.fail_writes {
                return Err("HTTP 500".to_string());
            }
            self.writes.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn seeded_state() -> AppState {
        let mut state = AppState::new();
        state.apply(AppEvent::SnapshotReplaced(vec![
            InventoryItem {
                id: "A1".to_string(),
                name: "ผ้าก๊อซ".to_string(),
                unit: "ม้วน".to_string(),
                current_stock: 10,
                min: 3,
                max: 40,
                category: "General".to_string(),
            },
            InventoryItem {
                id: "B7".to_string(),
                name: "เข็มฉีดยา".to_string(),
                unit: "อัน".to_string(),
                current_stock: 0,
                min: 5,
                max: 100,
                category: "General".to_string(),
            },
        ]));
        state
    }

    fn sheet_json(stock_a1: i64) -> Value {
        json!([
            {"id": "A1", "name": "ผ้าก๊อซ", "unit": "ม้วน", "currentStock": stock_a1, "min": 3, "max": 40},
        ])
    }

    #[test]
    fn test_fetch_failure_keeps_snapshot_and_sets_banner() {
        let mut state = seeded_state();
        state.apply(AppEvent::SnapshotFetchFailed("timeout".to_string()));
        assert_eq!(state.snapshot.len(), 2);
        assert!(state.fetch_error.as_deref().unwrap().contains("timeout"));

        state.apply(AppEvent::SnapshotReplaced(vec![]));
        assert!(state.fetch_error.is_none());
    }

    #[test]
    fn test_stage_and_discard_events() {
        let mut state = seeded_state();
        state.apply(AppEvent::RecordStaged {
            raw_id: "a1".to_string(),
            quantity: 2,
            bed_number: "12".to_string(),
            staff_name: "ยุพดี".to_string(),
        });
        assert_eq!(state.batch.len(), 1);
        let pending_id = state.batch.records()[0].id.clone();

        // invalid staging is a silent no-op
        state.apply(AppEvent::RecordStaged {
            raw_id: "ZZ".to_string(),
            quantity: 2,
            bed_number: "12".to_string(),
            staff_name: "ยุพดี".to_string(),
        });
        assert_eq!(state.batch.len(), 1);

        state.apply(AppEvent::RecordDiscarded(pending_id));
        assert!(state.batch.is_empty());

        state.view = ViewState::PendingList;
        state.apply(AppEvent::CommitFinished);
        assert_eq!(state.view, ViewState::Scanner);
    }

    #[test]
    fn test_deep_link_stages_once() {
        let mut state = seeded_state();
        assert!(state.apply_deep_link("ผ้าก๊อซ", "ห้องรวม", "ยุพดี"));
        assert_eq!(state.view, ViewState::PendingList);
        assert_eq!(state.batch.len(), 1);
        assert_eq!(state.batch.records()[0].quantity, 1);

        // reopening the same link is a no-op
        assert!(!state.apply_deep_link("ผ้าก๊อซ", "ห้องรวม", "ยุพดี"));
        assert_eq!(state.batch.len(), 1);
    }

    #[test]
    fn test_deep_link_unknown_item_is_rejected() {
        let mut state = seeded_state();
        assert!(!state.apply_deep_link("ไม่มีของจริง", "ห้องรวม", "ยุพดี"));
        assert!(state.batch.is_empty());
        assert_eq!(state.view, ViewState::Scanner);
    }

    #[tokio::test]
    async fn test_transfer_refuses_shortfall_before_writing() {
        let mut state = seeded_state();
        let ledger = MockLedger::new(sheet_json(10));

        let err = state
            .handle_transfer(&ledger, "A1", 25, "ยุพดี", "ICU", "")
            .await
            .unwrap_err();
        assert!(err.contains("สต็อกไม่เพียงพอ"));
        assert!(ledger.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_intake_writes_then_refreshes() {
        let mut state = seeded_state();
        let ledger = MockLedger::new(sheet_json(22));

        state.handle_intake(&ledger, "a1", 12, "ยุพดี").await.unwrap();

        let writes = ledger.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0]["action"], "intake");
        assert_eq!(writes[0]["amount"], 12);
        drop(writes);

        // snapshot reflects the refetched sheet, not local arithmetic
        assert_eq!(state.snapshot.lookup("A1").unwrap().current_stock, 22);
        assert_eq!(state.snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_only_disappears_after_refresh() {
        let mut state = seeded_state();
        let ledger = MockLedger::new(sheet_json(10));

        state.handle_delete_item(&ledger, "B7").await.unwrap();
        assert_eq!(ledger.writes.lock().unwrap()[0]["action"], "delete");
        // refresh returned only A1
        assert!(state.snapshot.lookup("B7").is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_snapshot_untouched() {
        let mut state = seeded_state();
        let mut ledger = MockLedger::new(sheet_json(99));
        ledger.fail_writes = true;

        assert!(state.handle_intake(&ledger, "A1", 5, "ยุพดี").await.is_err());
        assert_eq!(state.snapshot.lookup("A1").unwrap().current_stock, 10);
    }

    #[tokio::test]
    async fn test_commit_pending_lands_on_scanner() {
        let mut state = seeded_state();
        let snap = state.snapshot.clone();
        state.batch.stage(&snap, "A1", 2, "เตียง 4", "ยุพดี");
        state.view = ViewState::PendingList;

        let ledger = MockLedger::new(sheet_json(8));
        let guard = CommitGuard::new();
        let outcome = state.commit_pending(&guard, &ledger).await.unwrap();

        assert_eq!(outcome.written, 1);
        assert!(state.batch.is_empty());
        assert_eq!(state.view, ViewState::Scanner);
        assert_eq!(state.snapshot.lookup("A1").unwrap().current_stock, 8);
        assert!(!guard.is_in_flight());
    }
}
