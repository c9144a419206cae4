// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for Atrium (REST envelopes + realtime channel messages).
//!
//! REST responses and channel frames use camelCase field names; everything
//! handed to the engine uses snake_case. Conversion happens once, in
//! [`naming`], when bytes cross this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod naming;
pub mod wire;

/// Kind of change a realtime event describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// A record was created.
    Insert,
    /// A record changed.
    Update,
    /// A record was deleted.
    Delete,
}

/// Canonical envelope carried on every channel line.
///
/// * `op` – operation name (`subscribe`, `unsubscribe`, `event`, `error`).
/// * `ts` – sender-side sequence number, informational only.
/// * `payload` – operation specific body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpEnvelope<P> {
    /// Operation name.
    pub op: String,
    /// Sender sequence number.
    pub ts: u64,
    /// Operation-specific body.
    pub payload: P,
}

/// Subscription topic: one tenant, one entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Tenant whose changes are delivered.
    pub workspace_id: String,
    /// Entity-type name (collection key).
    pub entity: String,
}

impl Topic {
    /// Build a topic.
    pub fn new(workspace_id: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            entity: entity.into(),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.workspace_id, self.entity)
    }
}

/// Event payload (host → client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Entity-type name the record belongs to.
    pub entity: String,
    /// Insert, update or delete.
    pub event_type: EventType,
    /// Record payload.
    pub record: Value,
}

/// Error payload (host → client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelErrorPayload {
    /// Human readable message.
    pub message: String,
}

/// Channel message kinds carried inside `OpEnvelope` payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Start receiving events for a topic (op = "subscribe").
    Subscribe(Topic),
    /// Stop receiving events for a topic (op = "unsubscribe").
    Unsubscribe(Topic),
    /// One record change (op = "event").
    Event(EventPayload),
    /// Channel-level failure reported by the host (op = "error").
    Error(ChannelErrorPayload),
}

impl Message {
    /// Canonical op string for this message variant.
    pub fn op_name(&self) -> &'static str {
        match self {
            Message::Subscribe(_) => "subscribe",
            Message::Unsubscribe(_) => "unsubscribe",
            Message::Event(_) => "event",
            Message::Error(_) => "error",
        }
    }
}

/// Error body inside a REST response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    /// Human readable message.
    pub message: String,
    /// Optional stable error code.
    #[serde(default)]
    pub code: Option<String>,
}

/// REST response envelope: `{ "data": ..., "error": { "message", "code" } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApiEnvelope {
    /// Canonical record(s) on success.
    #[serde(default)]
    pub data: Option<Value>,
    /// Failure description.
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Decoding failures for envelopes and channel frames.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Bytes were not valid JSON for the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The envelope carried an error body.
    #[error("server rejected request: {}", .0.message)]
    Rejected(ApiErrorBody),
    /// Channel frame with an op this client does not understand.
    #[error("unknown op {0}")]
    UnknownOp(String),
    /// Channel frame exceeded the size limit.
    #[error("frame too large: {len} > {max} bytes")]
    FrameTooLarge {
        /// Observed length.
        len: usize,
        /// Allowed length.
        max: usize,
    },
}

/// Decode a REST response body into its `data` value (internal key convention).
///
/// A missing or `null` `data` with no error decodes to `Value::Null`.
pub fn decode_envelope(bytes: &[u8]) -> Result<Value, ProtoError> {
    let env: ApiEnvelope = serde_json::from_slice(bytes)?;
    if let Some(err) = env.error {
        return Err(ProtoError::Rejected(err));
    }
    Ok(env.data.map(naming::to_internal).unwrap_or(Value::Null))
}

/// Prepare an internal-convention request body for the wire.
pub fn encode_body(body: &Value) -> Value {
    naming::to_wire(body.clone())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_data_is_converted_to_internal_keys() {
        let body = br#"{"data":{"id":"srv-42","workspaceId":"ws","dueDate":null}}"#;
        let data = decode_envelope(body).unwrap();
        assert_eq!(
            data,
            json!({"id": "srv-42", "workspace_id": "ws", "due_date": null})
        );
    }

    #[test]
    fn envelope_error_is_surfaced() {
        let body = br#"{"data":null,"error":{"message":"Task is locked","code":"LOCKED"}}"#;
        match decode_envelope(body) {
            Err(ProtoError::Rejected(e)) => {
                assert_eq!(e.message, "Task is locked");
                assert_eq!(e.code.as_deref(), Some("LOCKED"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn empty_envelope_is_null() {
        assert_eq!(decode_envelope(b"{}").unwrap(), Value::Null);
    }

    #[test]
    fn request_body_uses_wire_keys() {
        let body = json!({"id": "a", "sort_order": 2});
        assert_eq!(encode_body(&body), json!({"id": "a", "sortOrder": 2}));
    }
}
