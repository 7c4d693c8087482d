//! Record-shape adapter for the sheet endpoints.
//!
//! The backing spreadsheet is edited by hand and has carried both English
//! and Thai column headers over its lifetime, so every field arrives under
//! one of several spellings and numbers may arrive as strings. This module
//! owns the canonical internal schema plus one alias table per canonical
//! field; consuming code never touches raw rows.

use serde_json::Value;
use tracing::debug;

use crate::history::{HistoryRecord, MovementType};
use crate::inventory::InventoryItem;
use crate::{value_f64, value_i64, value_str};

// ---------------------------------------------------------------------------
// Field alias tables
// ---------------------------------------------------------------------------

const ITEM_ID: &[&str] = &["id", "ID", "itemId", "รหัส"];
const ITEM_NAME: &[&str] = &["name", "Name", "itemName", "ชื่อพัสดุ", "รายการ"];
const ITEM_UNIT: &[&str] = &["unit", "Unit", "หน่วย"];
const ITEM_STOCK: &[&str] = &["currentStock", "stock", "คงเหลือ"];
const ITEM_MIN: &[&str] = &["min", "Min"];
const ITEM_MAX: &[&str] = &["max", "Max"];
const ITEM_CATEGORY: &[&str] = &["type", "category", "ประเภท"];

const HIST_TIMESTAMP: &[&str] = &["displayDate", "Timestamp", "timestamp", "date", "Date"];
const HIST_QUANTITY: &[&str] = &["amount", "quantity", "qty", "จำนวน"];
const HIST_USER: &[&str] = &["user", "performedBy", "requester", "receiver", "ผู้เบิก"];
const HIST_TYPE: &[&str] = &["type", "status", "Status", "action", "Action"];
const HIST_BED: &[&str] = &["bed", "bedNumber", "wardBed", "เตียง"];
const HIST_FROM: &[&str] = &["fromWard", "source", "deliveryNote"];
const HIST_TO: &[&str] = &["toWard", "recipient"];

const DEFAULT_UNIT: &str = "หน่วย";
const DEFAULT_MAX: i64 = 100;

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

/// Integer field that may arrive as a JSON number, a float, or a numeric
/// string (the sheet formats some columns as text).
fn field_i64(v: &Value, keys: &[&str]) -> Option<i64> {
    if let Some(n) = value_i64(v, keys) {
        return Some(n);
    }
    if let Some(n) = value_f64(v, keys) {
        return Some(n.round() as i64);
    }
    value_str(v, keys).and_then(|s| s.trim().parse::<i64>().ok())
}

/// Header rows sometimes come back as data when the sheet is re-read while
/// someone is editing it. An id cell literally reading "id" is one of those.
fn looks_like_header(id: &str) -> bool {
    id.eq_ignore_ascii_case("id") || id == "รหัส"
}

// ---------------------------------------------------------------------------
// Inventory rows
// ---------------------------------------------------------------------------

/// Parse the read endpoint's payload: either a top-level array of rows or
/// `{inventory: [...]}`. Rows without a usable id are dropped.
pub fn parse_inventory_rows(data: &Value) -> Vec<InventoryItem> {
    let rows = data
        .get("inventory")
        .and_then(Value::as_array)
        .or_else(|| data.as_array());
    let rows = match rows {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let id = match value_str(row, ITEM_ID) {
            Some(id) if !looks_like_header(&id) => id,
            _ => {
                debug!("dropping inventory row without usable id");
                continue;
            }
        };
        items.push(InventoryItem {
            id,
            name: value_str(row, ITEM_NAME).unwrap_or_default(),
            unit: value_str(row, ITEM_UNIT).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            current_stock: field_i64(row, ITEM_STOCK).unwrap_or(0).max(0),
            min: field_i64(row, ITEM_MIN).unwrap_or(0),
            max: field_i64(row, ITEM_MAX).unwrap_or(DEFAULT_MAX),
            category: value_str(row, ITEM_CATEGORY).unwrap_or_else(|| "General".to_string()),
        });
    }
    items
}

// ---------------------------------------------------------------------------
// History rows
// ---------------------------------------------------------------------------

/// Movement classification by keyword, matching both the English action
/// names and the Thai labels the sheet has used. Unclassifiable rows are
/// treated as disbursements.
pub fn classify_movement(raw: &str) -> MovementType {
    let upper = raw.trim().to_uppercase();
    if upper.contains("TRANSFER") || upper.contains("โอน") {
        MovementType::Transfer
    } else if upper.contains("INTAKE") || upper.contains("INCOME") || upper.contains("รับ") {
        MovementType::Intake
    } else {
        MovementType::Disburse
    }
}

/// Parse the history endpoint's payload: an array or `{history: [...]}`.
pub fn parse_history_rows(data: &Value) -> Vec<HistoryRecord> {
    let rows = data
        .get("history")
        .and_then(Value::as_array)
        .or_else(|| data.as_array());
    let rows = match rows {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    rows.iter()
        .map(|row| {
            let raw_type = value_str(row, HIST_TYPE).unwrap_or_default();
            HistoryRecord {
                item_id: value_str(row, ITEM_ID).unwrap_or_default(),
                item_name: value_str(row, ITEM_NAME).unwrap_or_default(),
                movement: classify_movement(&raw_type),
                quantity: field_i64(row, HIST_QUANTITY).unwrap_or(0),
                bed_number: value_str(row, HIST_BED),
                from_ward: value_str(row, HIST_FROM),
                to_ward: value_str(row, HIST_TO),
                performed_by: value_str(row, HIST_USER).unwrap_or_default(),
                timestamp: value_str(row, HIST_TIMESTAMP).unwrap_or_default(),
            }
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inventory_thai_headers_and_string_numbers() {
        let data = json!([
            { "รหัส": " A1 ", "ชื่อพัสดุ": "ผ้าก๊อซ", "หน่วย": "ม้วน", "คงเหลือ": "12", "Min": 5, "Max": "40" },
        ]);
        let items = parse_inventory_rows(&data);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "A1");
        assert_eq!(items[0].name, "ผ้าก๊อซ");
        assert_eq!(items[0].unit, "ม้วน");
        assert_eq!(items[0].current_stock, 12);
        assert_eq!(items[0].min, 5);
        assert_eq!(items[0].max, 40);
    }

    #[test]
    fn test_inventory_drops_header_and_idless_rows() {
        let data = json!({ "inventory": [
            { "id": "ID", "name": "header echo" },
            { "id": "", "name": "no id" },
            { "name": "missing id entirely" },
            { "id": "B2", "name": "real", "currentStock": 3 },
        ]});
        let items = parse_inventory_rows(&data);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "B2");
    }

    #[test]
    fn test_inventory_defaults_and_clamp() {
        let data = json!([{ "id": "C3", "name": "x", "currentStock": -4 }]);
        let items = parse_inventory_rows(&data);
        assert_eq!(items[0].current_stock, 0);
        assert_eq!(items[0].unit, "หน่วย");
        assert_eq!(items[0].max, 100);
        assert_eq!(items[0].category, "General");
    }

    #[test]
    fn test_non_array_payload_is_empty() {
        assert!(parse_inventory_rows(&json!({"error": "boom"})).is_empty());
        assert!(parse_history_rows(&json!("nope")).is_empty());
    }

    #[test]
    fn test_classify_movement_keywords() {
        assert_eq!(classify_movement("DISBURSE"), MovementType::Disburse);
        assert_eq!(classify_movement("เบิกจ่าย"), MovementType::Disburse);
        assert_eq!(classify_movement("intake"), MovementType::Intake);
        assert_eq!(classify_movement("รับเข้า"), MovementType::Intake);
        assert_eq!(classify_movement("income"), MovementType::Intake);
        assert_eq!(classify_movement("TRANSFER"), MovementType::Transfer);
        assert_eq!(classify_movement("โอนย้าย"), MovementType::Transfer);
        assert_eq!(classify_movement(""), MovementType::Disburse);
    }

    #[test]
    fn test_history_alias_fields() {
        let data = json!({ "history": [
            {
                "Timestamp": "2025-06-10T08:00:00Z",
                "ID": "A1",
                "รายการ": "ผ้าก๊อซ",
                "จำนวน": "3",
                "ผู้เบิก": "ยุพดี",
                "Action": "เบิกจ่าย",
                "เตียง": "12"
            }
        ]});
        let records = parse_history_rows(&data);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.item_id, "A1");
        assert_eq!(r.item_name, "ผ้าก๊อซ");
        assert_eq!(r.quantity, 3);
        assert_eq!(r.performed_by, "ยุพดี");
        assert_eq!(r.movement, MovementType::Disburse);
        assert_eq!(r.bed_number.as_deref(), Some("12"));
        assert_eq!(r.timestamp, "2025-06-10T08:00:00Z");
    }
}
