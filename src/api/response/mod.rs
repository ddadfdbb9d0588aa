pub mod access_token;
pub mod load_monitoring;

use serde::Deserialize;
use serde_json::Value;

const SUCCESS_CODE: u64 = 200;

/* Every endpoint answers with `{code, msg, data}` */
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: Option<Value>,
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// `code` may arrive as a number or as a string.
    pub fn is_success(&self) -> bool {
        match &self.code {
            Some(Value::Number(n)) => n.as_u64() == Some(SUCCESS_CODE),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok() == Some(SUCCESS_CODE),
            _ => false,
        }
    }

    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("(no error message received)")
    }
}
