//! Local SQLite offline cache.
//!
//! Durable fallback for the inventory and transaction snapshots: read at
//! startup, overwritten wholesale after every successful sync. This is an
//! offline cache only — the sheet stays authoritative and nothing here is
//! merged back.
//!
//! Uses rusqlite with WAL mode. On corruption or open failure the file is
//! deleted and the open retried once.

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::history::HistoryRecord;
use crate::inventory::InventoryItem;

/// Shared state holding the cache connection.
pub struct CacheState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

const KEY_INVENTORY: &str = "inventory";
const KEY_TRANSACTIONS: &str = "transactions";
const CACHE_CATEGORY: &str = "cache";

/// Initialize the cache at `{data_dir}/ward.db`.
pub fn init(data_dir: &Path) -> Result<CacheState, String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;

    let db_path = data_dir.join("ward.db");
    info!("Opening offline cache at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!("Cache open failed ({first_err}), deleting and retrying once");
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                let _ = fs::remove_file(db_path.with_extension("db-wal"));
                let _ = fs::remove_file(db_path.with_extension("db-shm"));
            }
            open_and_configure(&db_path)
                .map_err(|e| format!("Cache open failed after retry: {e}"))?
        }
    };

    run_migrations(&conn)?;

    info!("Offline cache initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(CacheState {
        conn: Mutex::new(conn),
        db_path,
    })
}

fn open_and_configure(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;
    Ok(conn)
}

pub(crate) fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: key/value store for the wholesale JSON snapshots.
fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| format!("migration v1: {e}"))
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .ok()
}

pub fn set_setting(conn: &Connection, category: &str, key: &str, value: &str) -> Result<(), String> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )
    .map_err(|e| format!("set_setting: {e}"))?;
    Ok(())
}

fn read_local_json(cache: &CacheState, key: &str) -> Result<serde_json::Value, String> {
    let conn = cache.conn.lock().map_err(|e| e.to_string())?;
    if let Some(raw) = get_setting(&conn, CACHE_CATEGORY, key) {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&raw) {
            return Ok(parsed);
        }
    }
    Ok(serde_json::Value::Null)
}

fn write_local_json(cache: &CacheState, key: &str, value: &serde_json::Value) -> Result<(), String> {
    let conn = cache.conn.lock().map_err(|e| e.to_string())?;
    set_setting(&conn, CACHE_CATEGORY, key, &value.to_string())
}

// ---------------------------------------------------------------------------
// Typed snapshot persistence
// ---------------------------------------------------------------------------

/// Persist the full inventory array, replacing whatever was stored.
pub fn store_inventory(cache: &CacheState, items: &[InventoryItem]) -> Result<(), String> {
    let value = serde_json::to_value(items).map_err(|e| format!("serialize inventory: {e}"))?;
    write_local_json(cache, KEY_INVENTORY, &value)
}

/// Load the persisted inventory array. Missing or unreadable data is an
/// empty list, never an error — the cache is advisory.
pub fn load_inventory(cache: &CacheState) -> Result<Vec<InventoryItem>, String> {
    let value = read_local_json(cache, KEY_INVENTORY)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Persist the full transaction array, replacing whatever was stored.
pub fn store_transactions(cache: &CacheState, records: &[HistoryRecord]) -> Result<(), String> {
    let value = serde_json::to_value(records).map_err(|e| format!("serialize transactions: {e}"))?;
    write_local_json(cache, KEY_TRANSACTIONS, &value)
}

pub fn load_transactions(cache: &CacheState) -> Result<Vec<HistoryRecord>, String> {
    let value = read_local_json(cache, KEY_TRANSACTIONS)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value).unwrap_or_default())
}

// ===========================================================================
// Tests
// ===========================================================================
