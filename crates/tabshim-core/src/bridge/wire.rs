//! Wire format shared by the controller and agent halves.
//!
//! Every message is `{ "name": string, "message": any }`. The name selects
//! what the payload is:
//!
//! | name                   | payload                              |
//! |------------------------|--------------------------------------|
//! | `readystatechange`     | the literal `"complete"`             |
//! | `return-<n>`           | `{ returnValue }` or `{ error }`     |
//! | anything else          | `{ args: [...], returnId: string }`  |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle message name sent when an agent's document finishes loading.
pub const READY_STATE_CHANGE: &str = "readystatechange";

/// Payload of the lifecycle message.
pub const READY_STATE_COMPLETE: &str = "complete";

/// The one request operation agents understand.
pub const EXECUTE_SCRIPT: &str = "executeScript";

/// Prefix of every correlation id.
pub const RETURN_ID_PREFIX: &str = "return-";

/// A single message on the bridge channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub name: String,
    #[serde(default)]
    pub message: Value,
}

impl BridgeMessage {
    pub fn new(name: impl Into<String>, message: Value) -> Self {
        Self {
            name: name.into(),
            message,
        }
    }

    /// A request for `operation`, answered under `return_id`.
    pub fn request(operation: &str, args: Vec<Value>, return_id: &str) -> Self {
        let payload = RequestPayload {
            args,
            return_id: return_id.to_string(),
        };
        // A struct of a Vec<Value> and a String always serializes.
        let message = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self::new(operation, message)
    }

    /// A response to the request carrying `return_id`.
    pub fn response(return_id: &str, payload: &ResponsePayload) -> Self {
        let message = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self::new(return_id, message)
    }

    /// The `readystatechange` / `complete` lifecycle message.
    pub fn ready_complete() -> Self {
        Self::new(READY_STATE_CHANGE, Value::from(READY_STATE_COMPLETE))
    }

    /// Whether this is the document-complete lifecycle message.
    pub fn is_ready_complete(&self) -> bool {
        self.name == READY_STATE_CHANGE && self.message.as_str() == Some(READY_STATE_COMPLETE)
    }

    /// Whether the name has the shape of a correlation id.
    pub fn is_response(&self) -> bool {
        self.name.starts_with(RETURN_ID_PREFIX)
    }
}

/// Payload of a request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    #[serde(default)]
    pub args: Vec<Value>,
    pub return_id: String,
}

/// Payload of a response message: exactly one of the two keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponsePayload {
    ReturnValue(Value),
    Error(SerializedError),
}

impl ResponsePayload {
    pub fn into_result(self) -> Result<Value, SerializedError> {
        match self {
            ResponsePayload::ReturnValue(value) => Ok(value),
            ResponsePayload::Error(err) => Err(err),
        }
    }
}

impl From<Result<Value, SerializedError>> for ResponsePayload {
    fn from(result: Result<Value, SerializedError>) -> Self {
        match result {
            Ok(value) => ResponsePayload::ReturnValue(value),
            Err(err) => ResponsePayload::Error(err),
        }
    }
}

/// An error raised inside the agent, flattened for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl SerializedError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for SerializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if !name.is_empty() => write!(f, "{name}: {}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SerializedError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let msg = BridgeMessage::request(EXECUTE_SCRIPT, vec![json!({ "code": "1+1" })], "return-1");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "name": "executeScript",
                "message": { "args": [{ "code": "1+1" }], "returnId": "return-1" }
            })
        );
    }

    #[test]
    fn test_response_payloads_are_exclusive() {
        let ok = BridgeMessage::response("return-2", &ResponsePayload::ReturnValue(json!(2)));
        assert_eq!(ok.message, json!({ "returnValue": 2 }));

        let err = BridgeMessage::response(
            "return-3",
            &ResponsePayload::Error(SerializedError::new("Error", "x")),
        );
        assert_eq!(
            err.message,
            json!({ "error": { "name": "Error", "message": "x" } })
        );
    }

    #[test]
    fn test_response_payload_decodes() {
        let payload: ResponsePayload =
            serde_json::from_value(json!({ "returnValue": [1, 2] })).unwrap();
        assert_eq!(payload.into_result(), Ok(json!([1, 2])));

        let payload: ResponsePayload = serde_json::from_value(
            json!({ "error": { "message": "boom", "stack": "at <eval>" } }),
        )
        .unwrap();
        let err = payload.into_result().unwrap_err();
        assert_eq!(err.message, "boom");
        assert_eq!(err.stack.as_deref(), Some("at <eval>"));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_lifecycle_message() {
        let msg = BridgeMessage::ready_complete();
        assert!(msg.is_ready_complete());
        assert!(!msg.is_response());
        assert!(!BridgeMessage::new(READY_STATE_CHANGE, json!("interactive")).is_ready_complete());
    }

    #[test]
    fn test_missing_message_field_defaults_to_null() {
        let msg: BridgeMessage = serde_json::from_value(json!({ "name": "ping" })).unwrap();
        assert_eq!(msg.message, Value::Null);
    }
}
