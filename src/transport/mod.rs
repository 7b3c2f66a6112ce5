//! Transport abstraction: unary and stream channels
//!
//! A [`Transport`] carries one encoded message and hands back the encoded
//! reply. The [`TransportManager`] owns both channels and decides which one a
//! message travels on.

pub mod http;
pub mod manager;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod pending;
pub mod websocket;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

pub use http::HttpTransport;
pub use manager::{ChannelKind, TransportManager};
pub use websocket::WebSocketTransport;

use crate::protocol::error::A2AError;

/// Path of the unary message endpoint
pub const MESSAGE_ENDPOINT: &str = "/api/v2/a2a/message";

/// Path of the stream endpoint
pub const STREAM_ENDPOINT: &str = "/ws";

/// Protocol-agnostic transport request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The endpoint path (e.g., "/api/v2/a2a/message")
    pub endpoint: String,

    /// HTTP method or equivalent operation
    pub method: String,

    /// Headers or metadata for the request
    pub headers: HashMap<String, String>,

    /// Encoded message
    pub body: Bytes,

    /// Id the reply is correlated by
    pub message_id: String,

    /// Deadline for the reply
    pub timeout: Duration,

    /// Whether to wait for a correlated reply at all
    pub expect_reply: bool,
}

impl TransportRequest {
    /// Create a new transport request expecting a reply within 30 seconds
    pub fn new(endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
            message_id: String::new(),
            timeout: Duration::from_secs(30),
            expect_reply: true,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the request body
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn expect_reply(mut self, expect_reply: bool) -> Self {
        self.expect_reply = expect_reply;
        self
    }
}

/// Protocol-agnostic transport response
#[derive(Debug)]
pub struct TransportResponse {
    /// Status code (e.g., HTTP status code)
    pub status: u16,

    /// Response headers or metadata
    pub headers: HashMap<String, String>,

    /// Response body as bytes
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a new transport response
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header to the response
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the response body
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Check if the response indicates success (2xx status code)
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Core transport trait for executing one request/reply exchange
///
/// Implementations are shared behind `Arc<dyn Transport>` by the manager.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Execute a transport request
    ///
    /// # Errors
    ///
    /// `Connection` when the channel is unavailable, `Timeout` when no reply
    /// arrives within `request.timeout`.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError>;

    /// Base URL of the remote endpoint
    fn base_url(&self) -> &Url;

    /// Whether the channel can currently carry requests
    fn is_open(&self) -> bool {
        true
    }

    /// Close the channel, failing anything still in flight
    async fn close(&self) {}

    /// Whether the channel is a persistent multiplexed stream
    fn supports_streaming(&self) -> bool {
        false
    }
}
