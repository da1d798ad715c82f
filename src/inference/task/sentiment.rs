use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HandlerError, HandlerResult};
use crate::json::to_python_string;

/// Incoming cloud function event. Only `body` is consumed.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct InvocationEvent {
    #[serde(default)]
    pub body: Option<Value>,
}

impl InvocationEvent {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(Value::String(body.into())),
        }
    }

    /// Parses a raw event payload regardless of its declared content type.
    pub fn from_slice(payload: &[u8]) -> HandlerResult<Self> {
        serde_json::from_slice(payload).map_err(|e| HandlerError::Event(e.to_string()))
    }

    /// The text to classify.
    pub fn text(&self) -> HandlerResult<&str> {
        match &self.body {
            None => Err(HandlerError::Event("event has no body".into())),
            Some(Value::String(text)) => Ok(text),
            Some(other) => Err(HandlerError::Encoding(format!(
                "body must be a string, got {}",
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Proxy-integration style response handed back to the platform.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub is_base64_encoded: bool,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl InvocationResponse {
    pub fn ok(body: String) -> Self {
        Self {
            is_base64_encoded: false,
            status_code: 200,
            headers: HashMap::new(),
            body,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SentimentBody {
    #[serde(rename = "input text")]
    pub input_text: String,
    pub sentiment: String,
}

impl SentimentBody {
    pub fn to_body(&self) -> HandlerResult<String> {
        to_python_string(self)
            .map_err(|e| HandlerError::Inference(format!("cannot serialize response: {e}")))
    }
}

pub trait SentimentHandler {
    fn run_sentiment(&self, event: &InvocationEvent) -> HandlerResult<InvocationResponse>;
}
