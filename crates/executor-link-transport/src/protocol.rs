//! Wire protocol for executor / control-plane messages.
//!
//! Application payloads stay opaque `serde_json::Value`; the session layer
//! never looks inside them. Storage, provider, and policy traffic all ride
//! in these envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message from the control plane to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Invoke an application-level operation.
    Request {
        id: String,
        operation: String,
        #[serde(default)]
        payload: Value,
    },
    /// One-way notification.
    Event {
        topic: String,
        #[serde(default)]
        payload: Value,
    },
    /// The control plane asks the executor to drain and disconnect.
    Shutdown {
        #[serde(default)]
        reason: String,
    },
}

/// Message from the executor to the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorMessage {
    /// First message on every new session.
    Hello { executor_id: String, version: String },
    /// Successful reply to a request.
    Response {
        id: String,
        #[serde(default)]
        result: Value,
    },
    /// Failed reply to a request.
    Failure { id: String, message: String },
    /// One-way notification.
    Event {
        topic: String,
        #[serde(default)]
        payload: Value,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_deserialization() {
        let raw = r#"{"type":"request","id":"r-1","operation":"get_state","payload":{"urn":"a"}}"#;
        let message: ControlMessage = serde_json::from_str(raw).unwrap();
        match message {
            ControlMessage::Request { id, operation, payload } => {
                assert_eq!(id, "r-1");
                assert_eq!(operation, "get_state");
                assert_eq!(payload, json!({ "urn": "a" }));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let raw = r#"{"type":"event","topic":"heartbeat"}"#;
        let message: ControlMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            message,
            ControlMessage::Event { ref topic, ref payload }
                if topic == "heartbeat" && payload.is_null()
        ));
    }

    #[test]
    fn test_hello_serialization_is_tagged() {
        let message = ExecutorMessage::Hello {
            executor_id: "exec-1".to_string(),
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""type":"hello""#));
        assert!(json.contains(r#""executor_id":"exec-1""#));
    }

    #[test]
    fn test_failure_roundtrip() {
        let message = ExecutorMessage::Failure {
            id: "r-9".to_string(),
            message: "unsupported operation: destroy".to_string(),
        };
        let json = serde_json::to_string(&message).unwrap();
        let parsed: ExecutorMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            ExecutorMessage::Failure { ref id, .. } if id == "r-9"
        ));
    }
}
