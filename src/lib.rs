//! Ward Stock - hospital ward medical-supply tracker
//!
//! Headless core for a ward inventory app backed by a Google Apps Script
//! spreadsheet. Disbursements are staged locally in a pending batch and
//! committed all-or-nothing; intakes, transfers, and item edits write
//! immediately. The sheet is the single source of truth for stock levels;
//! this crate never does stock arithmetic of its own.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod assistant;
pub mod cache;
pub mod commit;
pub mod config;
pub mod gateway;
pub mod history;
pub mod inventory;
pub mod normalize;
pub mod pending;
pub mod scanner;
pub mod state;

/// First non-empty string under any of `keys`, trimmed. Sheet exports are
/// inconsistent about header names, so every lookup carries its aliases.
pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub(crate) fn value_f64(v: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_f64()) {
            return Some(n);
        }
    }
    None
}

pub(crate) fn value_i64(v: &serde_json::Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_i64()) {
            return Some(n);
        }
    }
    None
}

/// Initialize structured console logging. `RUST_LOG` wins when set.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ward_stock=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_str_tries_aliases_and_skips_blank() {
        let row = json!({ "id": "  ", "รหัส": " A1 " });
        assert_eq!(value_str(&row, &["id", "รหัส"]), Some("A1".to_string()));
        assert_eq!(value_str(&row, &["missing"]), None);
    }

    #[test]
    fn test_value_numbers() {
        let row = json!({ "stock": 7, "ratio": 2.5 });
        assert_eq!(value_i64(&row, &["stock"]), Some(7));
        assert_eq!(value_f64(&row, &["ratio"]), Some(2.5));
        assert_eq!(value_i64(&row, &["ratio"]), None);
    }
}
