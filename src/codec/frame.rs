//! Stream frame envelope
//!
//! Outbound frames are the serialized message with `"type": "message"` merged
//! in. Inbound frames carry a `type`; `response` frames are matched against
//! pending requests by `correlation_id`, falling back to `message_id`.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::protocol::error::A2AError;

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A response to a pending request
    Response {
        /// Pending table key the response answers
        key: String,
        /// The response object without the envelope `type`
        payload: Bytes,
    },
    /// Any other frame kind (heartbeats, notifications)
    Other { kind: String },
}

/// Envelope codec for the stream channel
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Wrap an encoded message body into an outbound text frame
    pub fn encode_outbound(body: &[u8]) -> Result<String, A2AError> {
        let mut frame = match serde_json::from_slice::<Value>(body)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(A2AError::Protocol(
                    "outbound message body must be a JSON object".to_string(),
                ))
            }
        };
        frame.insert("type".to_string(), Value::String("message".to_string()));
        Ok(serde_json::to_string(&frame)?)
    }

    /// Decode an inbound text frame
    pub fn decode_inbound(text: &str) -> Result<InboundFrame, A2AError> {
        let mut frame: Map<String, Value> = match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(A2AError::Protocol(
                    "inbound frame is not a JSON object".to_string(),
                ))
            }
        };

        let kind = match frame.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(A2AError::Protocol("inbound frame has no type".to_string())),
        };

        if kind != "response" {
            return Ok(InboundFrame::Other { kind });
        }

        let key = ["correlation_id", "message_id"]
            .iter()
            .find_map(|field| frame.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| {
                A2AError::Protocol("response frame has no correlation id".to_string())
            })?;

        let payload = serde_json::to_vec(&frame)?;
        Ok(InboundFrame::Response {
            key,
            payload: Bytes::from(payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_outbound_frame_is_tagged() {
        let body = serde_json::to_vec(&json!({"id": "m1", "tool_name": "t"})).unwrap();
        let frame = FrameCodec::encode_outbound(&body).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], "message");
        assert_eq!(value["id"], "m1");
    }

    #[test]
    fn test_response_frame_keyed_by_correlation_id() {
        let frame = json!({
            "type": "response",
            "message_id": "m1",
            "correlation_id": "c1",
            "success": true
        })
        .to_string();

        match FrameCodec::decode_inbound(&frame).unwrap() {
            InboundFrame::Response { key, payload } => {
                assert_eq!(key, "c1");
                let value: Value = serde_json::from_slice(&payload).unwrap();
                assert!(value.get("type").is_none());
                assert_eq!(value["success"], true);
            }
            other => panic!("Expected response frame, got {other:?}"),
        }
    }

    #[test]
    fn test_response_frame_falls_back_to_message_id() {
        let frame = json!({"type": "response", "message_id": "m1", "success": true}).to_string();
        assert!(matches!(
            FrameCodec::decode_inbound(&frame).unwrap(),
            InboundFrame::Response { key, .. } if key == "m1"
        ));
    }

    #[test]
    fn test_other_frames_and_garbage() {
        let heartbeat = json!({"type": "heartbeat"}).to_string();
        assert_eq!(
            FrameCodec::decode_inbound(&heartbeat).unwrap(),
            InboundFrame::Other {
                kind: "heartbeat".into()
            }
        );

        assert!(FrameCodec::decode_inbound("[1, 2]").is_err());
        assert!(FrameCodec::decode_inbound(r#"{"type": "response"}"#).is_err());
    }
}
