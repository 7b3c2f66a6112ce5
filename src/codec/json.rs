//! JSON codec for message bodies

use bytes::Bytes;

use crate::{
    codec::Codec,
    protocol::{
        agent::AgentIdentifier, error::A2AError, message::A2AMessage, response::A2AResponse,
        target::AgentTarget,
    },
};

/// JSON codec shared by both channels
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn encode_message(&self, message: &A2AMessage) -> Result<Bytes, A2AError> {
        let bytes = serde_json::to_vec(message)?;
        Ok(Bytes::from(bytes))
    }

    fn decode_response(
        &self,
        body: &[u8],
        message: &A2AMessage,
    ) -> Result<A2AResponse, A2AError> {
        // Accepted without a reply body
        if body.is_empty() {
            let source = match &message.target {
                AgentTarget::Single { agent_id } => AgentIdentifier::new(agent_id.clone()),
                _ => AgentIdentifier::default(),
            };
            return Ok(A2AResponse::accepted(message.id.clone(), source));
        }

        let mut response: A2AResponse = serde_json::from_slice(body)?;
        if response.correlation_id.is_none() {
            response.correlation_id = Some(message.correlation_id.clone());
        }
        response.normalize()
    }

    fn content_type(&self) -> &str {
        "application/json"
    }
}
