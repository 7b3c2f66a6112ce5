//! A2A service request types

use std::{collections::HashMap, time::Duration};

use crate::protocol::message::A2AMessage;

/// A request to the A2A service
///
/// This wraps a message with the per-call context needed for execution
#[derive(Debug, Clone)]
pub struct A2ARequest {
    /// The message to coordinate
    pub message: A2AMessage,

    /// Request context (timeouts, metadata)
    pub context: RequestContext,
}

impl A2ARequest {
    /// Create a new A2A request
    pub fn new(message: A2AMessage, context: RequestContext) -> Self {
        Self { message, context }
    }
}

impl From<A2AMessage> for A2ARequest {
    fn from(message: A2AMessage) -> Self {
        Self::new(message, RequestContext::default())
    }
}

/// Per-call context
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Deadline for each exchange when neither the mode nor the message sets one
    pub timeout: Option<Duration>,

    /// Free-form tags carried into log spans
    pub metadata: HashMap<String, String>,
}

impl RequestContext {
    /// Create a new request context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a metadata tag
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
