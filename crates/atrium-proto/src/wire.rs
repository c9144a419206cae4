// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Realtime channel framing: one JSON `OpEnvelope` per line.
//!
//! ``{"op":"event","ts":7,"payload":{"entity":"tasks","eventType":"UPDATE","record":{...}}}\n``
//!
//! Record payloads travel in wire naming and are converted to internal naming
//! on decode.

use serde_json::Value;

use crate::{naming, ChannelErrorPayload, EventPayload, Message, OpEnvelope, ProtoError, Topic};

/// Upper bound for a single line, newline excluded.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Encode a `Message` into a newline-terminated line with the given sequence number.
pub fn encode_message(msg: &Message, ts: u64) -> Result<Vec<u8>, ProtoError> {
    let payload = match msg {
        Message::Subscribe(topic) | Message::Unsubscribe(topic) => serde_json::to_value(topic)?,
        Message::Event(event) => {
            let mut wire = event.clone();
            wire.record = naming::to_wire(wire.record);
            serde_json::to_value(&wire)?
        }
        Message::Error(err) => serde_json::to_value(err)?,
    };
    let env = OpEnvelope {
        op: msg.op_name().to_string(),
        ts,
        payload,
    };
    let mut line = serde_json::to_vec(&env)?;
    line.push(b'\n');
    Ok(line)
}

/// Decode one line (trailing `\n` / `\r\n` optional) into `(Message, ts)`.
pub fn decode_message(line: &[u8]) -> Result<(Message, u64), ProtoError> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.len() > MAX_FRAME_BYTES {
        return Err(ProtoError::FrameTooLarge {
            len: line.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    let env: OpEnvelope<Value> = serde_json::from_slice(line)?;
    let msg = match env.op.as_str() {
        "subscribe" => Message::Subscribe(serde_json::from_value::<Topic>(env.payload)?),
        "unsubscribe" => Message::Unsubscribe(serde_json::from_value::<Topic>(env.payload)?),
        "event" => {
            let mut event: EventPayload = serde_json::from_value(env.payload)?;
            event.record = naming::to_internal(event.record);
            Message::Event(event)
        }
        "error" => Message::Error(serde_json::from_value::<ChannelErrorPayload>(env.payload)?),
        other => return Err(ProtoError::UnknownOp(other.to_string())),
    };
    Ok((msg, env.ts))
}
