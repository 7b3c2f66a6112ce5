//! Serialization codecs for the unary and stream channels

pub mod frame;
pub mod json;

pub use frame::{FrameCodec, InboundFrame};
pub use json::JsonCodec;

use bytes::Bytes;

use crate::protocol::{error::A2AError, message::A2AMessage, response::A2AResponse};

/// Codec trait for encoding messages and decoding responses
///
/// The channel (HTTP body or stream frame) is the transport's concern; the
/// codec only turns typed values into bytes and back.
pub trait Codec: Send + Sync {
    /// Serialize a message to bytes for transport
    fn encode_message(&self, message: &A2AMessage) -> Result<Bytes, A2AError>;

    /// Deserialize response bytes
    ///
    /// # Arguments
    ///
    /// * `body` - The response body bytes
    /// * `message` - The message the response answers (for context)
    fn decode_response(&self, body: &[u8], message: &A2AMessage)
        -> Result<A2AResponse, A2AError>;

    /// The MIME type (e.g., "application/json")
    fn content_type(&self) -> &str;
}
