//! Inbound form submissions as Tilda posts them.
//!
//! Tilda does not publish a schema for the webhook body: every form field shows
//! up as a top-level key, next to a few bookkeeping keys such as `formid` and
//! `formname`. The only requirement here is that the body is a JSON object.

use serde_json::{Map, Value};

use crate::error::WebhookError;
use crate::utils::json_value_to_text;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundForm {
    pub formid: Option<String>,
    pub formname: Option<String>,
    fields: Map<String, Value>,
}

impl InboundForm {
    pub fn from_slice(body: &[u8]) -> Result<Self, WebhookError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedRequest(e.to_string()))?;

        match value {
            Value::Object(fields) => Ok(Self::from_map(fields)),
            other => Err(WebhookError::MalformedRequest(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        let metadata = |key: &str| {
            fields
                .get(key)
                .map(json_value_to_text)
                .filter(|v| !v.is_empty())
        };

        Self {
            formid: metadata("formid"),
            formname: metadata("formname"),
            fields,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Every top-level entry rendered as `key: value`, one per line, in the
    /// order the body listed them.
    pub fn description(&self) -> String {
        self.entries()
            .map(|(key, value)| format!("{}: {}", key, json_value_to_text(value)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
