//! Transaction log store.
//!
//! Cached copy of the movement history. The sheet is authoritative: every
//! history view re-fetches the full set and this module re-derives
//! filtering and date grouping from it. Append-only from the app's point
//! of view — nothing here mutates a record after it arrives.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Kind of committed stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    Disburse,
    Intake,
    Transfer,
}

/// One committed movement as cached from the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub item_id: String,
    pub item_name: String,
    pub movement: MovementType,
    pub quantity: i64,
    #[serde(default)]
    pub bed_number: Option<String>,
    #[serde(default)]
    pub from_ward: Option<String>,
    #[serde(default)]
    pub to_ward: Option<String>,
    pub performed_by: String,
    pub timestamp: String,
}

/// History screen tab filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryTab {
    All,
    Disburse,
    Intake,
    Transfer,
}

impl HistoryTab {
    fn accepts(&self, movement: MovementType) -> bool {
        match self {
            HistoryTab::All => true,
            HistoryTab::Disburse => movement == MovementType::Disburse,
            HistoryTab::Intake => movement == MovementType::Intake,
            HistoryTab::Transfer => movement == MovementType::Transfer,
        }
    }
}

/// Wholesale-replaced cache of the movement history.
#[derive(Debug, Default, Clone)]
pub struct TransactionLog {
    records: Vec<HistoryRecord>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn replace_all(&mut self, records: Vec<HistoryRecord>) {
        self.records = records;
    }

    /// Tab + free-text filter. The search term matches case-insensitively
    /// against the whole serialized record, like the original history view.
    pub fn filter(&self, tab: HistoryTab, search: &str) -> Vec<&HistoryRecord> {
        let term = search.trim().to_lowercase();
        self.records
            .iter()
            .filter(|r| tab.accepts(r.movement))
            .filter(|r| {
                if term.is_empty() {
                    return true;
                }
                serde_json::to_string(r)
                    .map(|s| s.to_lowercase().contains(&term))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Filter then group by display date, preserving record order within a
    /// group and first-seen order of the groups themselves.
    pub fn grouped(
        &self,
        tab: HistoryTab,
        search: &str,
        today: NaiveDate,
    ) -> Vec<(String, Vec<&HistoryRecord>)> {
        let mut groups: Vec<(String, Vec<&HistoryRecord>)> = Vec::new();
        for record in self.filter(tab, search) {
            let key = date_group_title(&record.timestamp, today);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, bucket)) => bucket.push(record),
                None => groups.push((key, vec![record])),
            }
        }
        groups
    }
}

/// Display title for a history date group: today, yesterday, or the date.
pub fn date_group_title(timestamp: &str, today: NaiveDate) -> String {
    let date = match parse_record_date(timestamp) {
        Some(d) => d,
        None => return "ไม่ระบุวันที่".to_string(),
    };
    match (today - date).num_days() {
        0 => "วันนี้".to_string(),
        1 => "เมื่อวานนี้".to_string(),
        _ => date.format("%d/%m/%Y").to_string(),
    }
}

/// The sheet emits timestamps in several shapes; accept RFC 3339 first,
/// then a plain leading `YYYY-MM-DD`, then `DD/MM/YYYY`.
fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    // Thai-rendered dates put multi-byte script inside the first 10 bytes,
    // so the prefix must be taken on a char boundary, never byte-sliced.
    if let Some(prefix) = raw.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%d/%m/%Y") {
            return Some(d);
        }
    }
    None
}

// ===========================================================================
// Tests
// ===========================================================================
