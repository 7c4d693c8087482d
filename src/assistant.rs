//! Natural-language command interpreter and stock insights.
//!
//! Talks to the Gemini REST API with two declared functions, `recordIntake`
//! and `recordUsage`. The model either picks one (yielding a structured
//! intent dispatched to the income/outcome flows) or answers in plain text,
//! which is surfaced to the user as a clarification. Every failure path
//! degrades to a Thai clarification message, never an error.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::gateway::Ledger;
use crate::history::TransactionLog;
use crate::inventory::InventorySnapshot;
use crate::state::AppState;

const GENERATE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const FALLBACK_CLARIFY: &str = "ฉันไม่เข้าใจคำสั่งของคุณ โปรดลองอีกครั้งในรูปแบบที่ชัดเจนขึ้น";
const FALLBACK_ERROR: &str = "เกิดข้อผิดพลาดทางเทคนิคในการเชื่อมต่อกับ AI โปรดลองอีกครั้ง";
const FALLBACK_INSIGHTS: &str = "ไม่สามารถดึงข้อมูลวิเคราะห์ได้ในขณะนี้";

/// What the model asked us to do. `Clarify` carries text to show verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandIntent {
    Clarify(String),
    Intake {
        item_name: String,
        quantity: i64,
        unit: String,
        source: String,
        remark: String,
    },
    Usage {
        item_name: String,
        quantity: i64,
        unit: String,
        location: String,
        remark: String,
    },
}

/// Declarations for the two write functions the model may call. Shapes
/// follow the Gemini tool schema (`OBJECT`/`STRING`/`NUMBER`).
pub fn function_declarations() -> Value {
    json!([
        {
            "name": "recordIntake",
            "description": "Records the intake of medical supplies into the ward inventory. Use this when the user mentions receiving or adding supplies.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "itemName": { "type": "STRING", "description": "The name of the medical supply. Should match an existing item if possible." },
                    "quantity": { "type": "NUMBER", "description": "The quantity received. Must be a positive number." },
                    "unit": { "type": "STRING", "description": "The unit of the item. Infer from context or default to \"ชิ้น\"." },
                    "source": { "type": "STRING", "description": "The source or supplier of the item." },
                    "remark": { "type": "STRING", "description": "Additional notes, e.g. batch number or expiration date." }
                },
                "required": ["itemName", "quantity", "unit", "source"]
            }
        },
        {
            "name": "recordUsage",
            "description": "Records the usage of medical supplies from the ward inventory. Use this when the user mentions using, dispensing, or cutting stock.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "itemName": { "type": "STRING", "description": "The name of the medical supply. Must be an existing item in the inventory." },
                    "quantity": { "type": "NUMBER", "description": "The quantity used. Must be a positive number." },
                    "unit": { "type": "STRING", "description": "The unit of the item. Infer from context or default to \"ชิ้น\"." },
                    "wardBed": { "type": "STRING", "description": "The ward or bed number where the item was used." },
                    "remark": { "type": "STRING", "description": "Additional notes about the usage." }
                },
                "required": ["itemName", "quantity", "unit", "wardBed"]
            }
        }
    ])
}

fn system_instruction(user_name: &str, item_names: &[String]) -> String {
    let catalog = if item_names.is_empty() {
        "ไม่มีรายการพัสดุ".to_string()
    } else {
        item_names.join(", ")
    };
    format!(
        "คุณคือผู้ช่วย AI สำหรับจัดการคลังพัสดุทางการแพทย์ในหอผู้ป่วย ชื่อ {user_name}\n\
         ภารกิจหลักของคุณคือการวิเคราะห์คำสั่งของผู้ใช้และเรียกใช้ฟังก์ชันที่เหมาะสมเพื่อบันทึกข้อมูล\n\
         หรือตอบคำถามที่เกี่ยวข้องกับสต็อกพัสดุ\n\n\
         รายการพัสดุที่มีในระบบปัจจุบัน (ใช้เป็นข้อมูลอ้างอิงในการระบุ itemName):\n{catalog}\n\n\
         หากคำสั่งของผู้ใช้คือการ \"รับเข้า\" หรือ \"เพิ่ม\" พัสดุ ให้ใช้ฟังก์ชัน recordIntake\n\
         หากคำสั่งของผู้ใช้คือการ \"เบิกใช้\", \"ตัดสต็อก\", \"ใช้\", \"จ่าย\" พัสดุ ให้ใช้ฟังก์ชัน recordUsage\n\n\
         พยายามระบุ itemName, quantity, unit, source/wardBed ให้ถูกต้องจากคำสั่งของผู้ใช้\n\
         ถ้าข้อมูลไม่ครบถ้วนหรือไม่ชัดเจน ให้ขอข้อมูลเพิ่มเติมก่อนที่จะเรียกใช้ฟังก์ชัน\n\
         ถ้าผู้ใช้ต้องการข้อมูลวิเคราะห์หรือถามคำถามทั่วไป ให้ตอบกลับเป็นข้อความ"
    )
}

pub struct Assistant {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Assistant {
    pub fn new(api_key: &str, model: &str) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// `None` when no model key is configured — the interpreter is an
    /// optional subsystem and the rest of the app runs without it.
    pub fn from_config(config: &crate::config::Config) -> Result<Option<Self>, String> {
        match &config.model_api_key {
            Some(key) => Ok(Some(Self::new(key, &config.model_name)?)),
            None => Ok(None),
        }
    }

    async fn generate(&self, body: &Value) -> Result<Value, String> {
        let url = format!(
            "{GENERATE_URL}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("Model request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("Model returned HTTP {}", resp.status().as_u16()));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| format!("Invalid model response: {e}"))
    }

    /// Interpret one user command. Network or parse failures come back as
    /// `Clarify` with a generic error message.
    pub async fn interpret(
        &self,
        prompt: &str,
        user_name: &str,
        item_names: &[String],
    ) -> CommandIntent {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": system_instruction(user_name, item_names) }] },
            "tools": [{ "functionDeclarations": function_declarations() }],
        });

        match self.generate(&body).await {
            Ok(response) => parse_response(&response),
            Err(e) => {
                warn!(error = %e, "command interpretation failed");
                CommandIntent::Clarify(FALLBACK_ERROR.to_string())
            }
        }
    }

    /// Free-text stock analysis over the current snapshot and the last few
    /// movements. Always returns displayable Thai text.
    pub async fn stock_insights(
        &self,
        snapshot: &InventorySnapshot,
        log: &TransactionLog,
    ) -> String {
        let stock: Vec<Value> = snapshot
            .items()
            .iter()
            .map(|i| json!({ "name": i.name, "stock": i.current_stock, "min": i.min, "unit": i.unit }))
            .collect();
        let recent: Vec<Value> = log
            .records()
            .iter()
            .rev()
            .take(10)
            .map(|r| json!({ "name": r.item_name, "qty": r.quantity, "type": r.movement, "bed": r.bed_number }))
            .collect();

        let prompt = format!(
            "ในฐานะผู้ช่วยวิเคราะห์คลังสินค้าโรงพยาบาล โปรดวิเคราะห์ข้อมูลสต็อกปัจจุบันและรายการการใช้งานล่าสุดต่อไปนี้:\n\n\
             สต็อกปัจจุบัน: {}\n\
             รายการใช้งานล่าสุด: {}\n\n\
             โปรดสรุปเป็นข้อๆ สั้นๆ:\n\
             1. รายการที่ต้องสั่งด่วน (โดยเฉพาะที่ต่ำกว่า min)\n\
             2. แนวโน้มการใช้งานที่ผิดปกติ (ถ้ามี)\n\
             3. คำแนะนำในการจัดการคลัง\n\
             ตอบเป็นภาษาไทย",
            Value::Array(stock),
            Value::Array(recent)
        );

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        match self.generate(&body).await {
            Ok(response) => first_text(&response)
                .unwrap_or_else(|| "ไม่มีข้อมูลวิเคราะห์ในขณะนี้".to_string()),
            Err(e) => {
                warn!(error = %e, "stock insights failed");
                FALLBACK_INSIGHTS.to_string()
            }
        }
    }
}

fn first_text(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn arg_str(args: &Value, key: &str) -> String {
    args[key].as_str().unwrap_or("").trim().to_string()
}

fn arg_quantity(args: &Value) -> i64 {
    match &args["quantity"] {
        Value::Number(n) => n.as_f64().map(|f| f.round() as i64).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.round() as i64).unwrap_or(0),
        _ => 0,
    }
}

/// Map a raw generateContent response to an intent. The first function call
/// wins; without one the text answer becomes a clarification.
pub fn parse_response(response: &Value) -> CommandIntent {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    for part in &parts {
        let call = &part["functionCall"];
        let Some(name) = call["name"].as_str() else {
            continue;
        };
        let args = &call["args"];
        match name {
            "recordIntake" => {
                return CommandIntent::Intake {
                    item_name: arg_str(args, "itemName"),
                    quantity: arg_quantity(args),
                    unit: arg_str(args, "unit"),
                    source: arg_str(args, "source"),
                    remark: arg_str(args, "remark"),
                };
            }
            "recordUsage" => {
                return CommandIntent::Usage {
                    item_name: arg_str(args, "itemName"),
                    quantity: arg_quantity(args),
                    unit: arg_str(args, "unit"),
                    location: arg_str(args, "wardBed"),
                    remark: arg_str(args, "remark"),
                };
            }
            other => warn!(function = other, "model called an undeclared function"),
        }
    }

    CommandIntent::Clarify(first_text(response).unwrap_or_else(|| FALLBACK_CLARIFY.to_string()))
}

/// Dispatch an interpreted intent against the live state. Returns the
/// message to show in the conversation.
pub async fn perform_intent<L: Ledger>(
    state: &mut AppState,
    ledger: &L,
    intent: CommandIntent,
) -> String {
    match intent {
        CommandIntent::Clarify(text) => text,
        CommandIntent::Intake {
            item_name,
            quantity,
            unit,
            source,
            remark,
        } => {
            info!(item = %item_name, quantity, "assistant intake");
            match state
                .record_income_by_name(ledger, &item_name, quantity, &unit, &source, &remark)
                .await
            {
                Ok(msg) => msg,
                Err(e) => format!("ไม่สามารถบันทึกรับเข้าได้: {e}"),
            }
        }
        CommandIntent::Usage {
            item_name,
            quantity,
            unit,
            location,
            remark,
        } => {
            info!(item = %item_name, quantity, "assistant usage");
            match state
                .record_outcome_by_name(ledger, &item_name, quantity, &unit, &location, &remark)
                .await
            {
                Ok(msg) => msg,
                Err(e) => format!("ไม่สามารถบันทึกเบิกใช้ได้: {e}"),
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
