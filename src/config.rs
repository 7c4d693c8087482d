//! Endpoint and roster configuration.
//!
//! The original deployment embeds the Apps Script URL and the fixed staff /
//! department lookup lists directly in the client. Here they live in one
//! `Config` value with environment-variable overrides for the two values
//! that differ between wards (script URL, model API key).

use std::env;

/// Default Apps Script endpoint. Override with `WARD_STOCK_SCRIPT_URL`.
const DEFAULT_SCRIPT_URL: &str =
    "https://script.google.com/macros/s/AKfycbWardStockSheetBridgeDeploymentId/exec";

/// Hosted model used by the command interpreter.
const DEFAULT_MODEL_NAME: &str = "gemini-3-flash-preview";

/// Ward staff roster shown in the disbursement form.
const STAFF_LIST: &[&str] = &[
    "ยุพดี",
    "วชิราพร",
    "ภุมริน",
    "พัชราภรณ์",
    "สุภาพร",
    "ศศิวิมล",
    "อภัสรา",
    "ณัฐวัฒน์",
    "อิสริยา",
    "นภัสสร",
    "พรพนา(บุญ)",
    "พรพนา(ทับ)",
    "กชพรรณ",
    "หนึ่งฤทัย",
    "ฐิติมา",
    "นฤพร",
    "CHL",
];

/// Departments accepted as transfer recipients.
const DEPARTMENTS: &[&str] = &[
    "ER (ห้องฉุกเฉิน)",
    "OR (ห้องผ่าตัด)",
    "ICU",
    "OPD",
    "LAB",
    "X-RAY",
    "Pharmacy (ห้องยา)",
    "Central Supply (จ่ายกลาง)",
    "Ward อื่นๆ",
];

/// Runtime configuration for one ward session.
#[derive(Debug, Clone)]
pub struct Config {
    pub script_url: String,
    pub model_api_key: Option<String>,
    pub model_name: String,
    pub staff_list: Vec<String>,
    pub departments: Vec<String>,
}

impl Config {
    /// Build the config from embedded defaults plus environment overrides.
    pub fn from_env() -> Self {
        let script_url = env::var("WARD_STOCK_SCRIPT_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SCRIPT_URL.to_string());
        let model_api_key = env::var("WARD_STOCK_MODEL_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            script_url,
            model_api_key,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            staff_list: STAFF_LIST.iter().map(|s| s.to_string()).collect(),
            departments: DEPARTMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether `name` is on the staff roster.
    pub fn is_known_staff(&self, name: &str) -> bool {
        self.staff_list.iter().any(|s| s == name.trim())
    }
}

/// Shift label for the disbursement screen header. Day shift runs until 16:00.
pub fn shift_label(hour: u32) -> &'static str {
    if hour < 16 {
        "เช้า/บ่าย"
    } else {
        "ดึก"
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_label_boundaries() {
        assert_eq!(shift_label(0), "เช้า/บ่าย");
        assert_eq!(shift_label(15), "เช้า/บ่าย");
        assert_eq!(shift_label(16), "ดึก");
        assert_eq!(shift_label(23), "ดึก");
    }

    #[test]
    fn test_rosters_populated() {
        let cfg = Config {
            script_url: DEFAULT_SCRIPT_URL.to_string(),
            model_api_key: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            staff_list: STAFF_LIST.iter().map(|s| s.to_string()).collect(),
            departments: DEPARTMENTS.iter().map(|s| s.to_string()).collect(),
        };
        assert!(cfg.is_known_staff("ยุพดี"));
        assert!(cfg.is_known_staff(" CHL "));
        assert!(!cfg.is_known_staff("somebody else"));
        assert!(cfg.departments.iter().any(|d| d == "ICU"));
    }
}
