//! Apps Script sheet gateway.
//!
//! Sole boundary to the authoritative spreadsheet store. Reads are plain
//! GETs with mandatory cache-busting (the sheet is edited concurrently by
//! other staff through its own UI); the write endpoint is best-effort: it
//! accepts a `text/plain` JSON body and its response cannot distinguish
//! accepted from rejected, so only a transport-level failure is an error.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::inventory::InventoryItem;
use crate::pending::PendingRecord;

/// Default timeout for sheet requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Ledger seam
// ---------------------------------------------------------------------------

/// Remote ledger boundary used by the commit coordinator and state layer.
///
/// `write` is best-effort against the Apps Script backend; an acknowledged
/// backend can implement it with real success/failure reporting without
/// touching the callers.
#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Fetch the full item list (raw payload, see `normalize`).
    async fn fetch_inventory(&self) -> Result<Value, String>;

    /// Fetch the full movement history (raw payload).
    async fn fetch_history(&self) -> Result<Value, String>;

    /// Post one action payload. `Err` only on transport failure.
    async fn write(&self, payload: &Value) -> Result<(), String>;
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-presentable message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the stock sheet at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid sheet endpoint URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-presentable message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 | 403 => "Sheet access denied — check the script deployment permissions".to_string(),
        404 => "Sheet endpoint not found — check the script URL".to_string(),
        s if s >= 500 => format!("Sheet service error (HTTP {s})"),
        s => format!("Unexpected response from the sheet service (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// HTTP client for one Apps Script deployment.
pub struct SheetsGateway {
    client: Client,
    script_url: String,
}

impl SheetsGateway {
    pub fn new(script_url: &str) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;
        Ok(Self {
            client,
            script_url: script_url.trim().to_string(),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self, String> {
        Self::new(&config.script_url)
    }

    /// Read URL with the mandatory cache-busting parameter. Every read must
    /// bypass intermediate caches — the sheet changes under us. A configured
    /// base URL may already carry a query string.
    fn read_url(&self, action: Option<&str>) -> String {
        let sep = if self.script_url.contains('?') { '&' } else { '?' };
        let t = chrono::Utc::now().timestamp_millis();
        match action {
            Some(a) => format!("{}{sep}action={a}&t={t}", self.script_url),
            None => format!("{}{sep}t={t}", self.script_url),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| friendly_error(&self.script_url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        let data: Value = resp
            .json()
            .await
            .map_err(|e| format!("Invalid JSON from the sheet service: {e}"))?;
        // The script reports its own failures in-band, regardless of status.
        if let Some(err) = data.get("error").filter(|v| !v.is_null()) {
            let msg = err.as_str().map(|s| s.to_string()).unwrap_or_else(|| err.to_string());
            return Err(format!("Script error: {msg}"));
        }
        Ok(data)
    }
}

impl Ledger for SheetsGateway {
    async fn fetch_inventory(&self) -> Result<Value, String> {
        let url = self.read_url(None);
        debug!(url = %url, "fetching inventory snapshot");
        self.get_json(&url).await
    }

    async fn fetch_history(&self) -> Result<Value, String> {
        let url = self.read_url(Some("getHistory"));
        debug!(url = %url, "fetching movement history");
        self.get_json(&url).await
    }

    async fn write(&self, payload: &Value) -> Result<(), String> {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let resp = self
            .client
            .post(&self.script_url)
            .header("Content-Type", "text/plain")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| friendly_error(&self.script_url, &e))?;
        // Best-effort sink: the script's response carries no usable
        // accept/reject signal, so the status and body are not inspected.
        info!(action = %action, status = %resp.status(), "sheet write issued");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Write payload constructors
// ---------------------------------------------------------------------------
// Field names are part of the script's contract; building every payload
// here keeps them in one place.

pub fn disburse_payload(record: &PendingRecord) -> Value {
    json!({
        "action": "disburse",
        "id": record.item_id,
        "name": record.item_name,
        "amount": record.quantity,
        "unit": record.unit,
        "user": record.staff_name,
        "bed": record.bed_number,
    })
}

pub fn intake_payload(item: &InventoryItem, amount: i64, user: &str) -> Value {
    json!({
        "action": "intake",
        "id": item.id,
        "name": item.name,
        "amount": amount,
        "unit": item.unit,
        "user": user,
    })
}

pub fn transfer_payload(
    item: &InventoryItem,
    amount: i64,
    user: &str,
    recipient: &str,
    notes: &str,
) -> Value {
    json!({
        "action": "transfer",
        "id": item.id,
        "name": item.name,
        "amount": amount,
        "unit": item.unit,
        "user": user,
        "recipient": recipient,
        "notes": notes,
    })
}

pub fn update_payload(item: &InventoryItem) -> Value {
    json!({
        "action": "update",
        "id": item.id,
        "name": item.name,
        "unit": item.unit,
        "min": item.min,
        "max": item.max,
    })
}

pub fn delete_payload(item_id: &str) -> Value {
    json!({ "action": "delete", "id": item_id })
}

/// Variant-B intake ("income") record, keyed by item name rather than id.
pub fn income_payload(
    item_name: &str,
    amount: i64,
    unit: &str,
    receiver: &str,
    delivery_note: &str,
    remark: &str,
) -> Value {
    json!({
        "action": "income",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "itemName": item_name,
        "amount": amount,
        "unit": if unit.trim().is_empty() { "ชิ้น" } else { unit },
        "receiver": receiver,
        "deliveryNote": delivery_note,
        "remark": remark,
    })
}

/// Variant-B usage ("outcome") record.
pub fn outcome_payload(
    item_name: &str,
    amount: i64,
    unit: &str,
    requester: &str,
    remark: &str,
) -> Value {
    json!({
        "action": "outcome",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "itemName": item_name,
        "amount": amount,
        "unit": if unit.trim().is_empty() { "ชิ้น" } else { unit },
        "requester": requester,
        "remark": remark,
        "status": "completed",
    })
}

// ===========================================================================
// Tests
// ===========================================================================
