//! Error types for A2A coordination

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for A2A coordination operations
#[derive(Debug, Error)]
pub enum A2AError {
    /// Structural problems found before any network activity.
    ///
    /// Carries every violation, not just the first one.
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A channel is unavailable (not connected, refused, closed)
    #[error("Connection error: {0}")]
    Connection(String),

    /// No correlated response arrived within the deadline
    #[error("Request {message_id} timed out after {after:?}")]
    Timeout { message_id: String, after: Duration },

    /// A single target names an agent missing from the directory
    #[error("Target agent not found: {agent_id}")]
    TargetNotFound { agent_id: String },

    /// A group target matched no agent in the directory
    #[error("No agents matched group target with role '{role}'")]
    NoAgentsMatched { role: String },

    /// Fewer agents resolved than the consensus requires
    #[error("Insufficient participants: {available} available, {required} required")]
    InsufficientParticipants { required: usize, available: usize },

    /// Voting window closed before a quorum was reached
    #[error("Consensus timed out with {received} of {required} required votes")]
    ConsensusTimeout { received: usize, required: usize },

    /// Votes arrived but cannot satisfy the consensus rule
    #[error("Consensus not reached: {agreeing} agreeing of {required} required ({received} votes received)")]
    ConsensusNotReached {
        agreeing: usize,
        required: usize,
        received: usize,
    },

    /// A pipeline stage failed and the pipeline was aborted
    #[error("Pipeline stage '{stage}' (#{index}) failed: {source}")]
    PipelineStage {
        stage: String,
        index: usize,
        #[source]
        source: Box<A2AError>,
    },

    /// A remote agent answered with `success = false`
    #[error("Agent {agent_id} reported an error: {error}")]
    Remote { agent_id: String, error: ClientError },

    /// Structured client error with code and recoverability
    #[error("{0}")]
    Client(#[from] ClientError),

    /// Transport-level error (network, unexpected status, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol-level error (malformed frame, invariant violated by a peer)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// In-flight request cancelled, e.g. by disconnect
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// The message outlived its ttl
    #[error("Message {message_id} expired before it could be sent")]
    Expired { message_id: String },

    /// Reserved feature that has no defined semantics yet
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl A2AError {
    /// Stable error code used for retry classification and on the wire
    pub fn code(&self) -> &str {
        match self {
            A2AError::Validation(_) => "VALIDATION_ERROR",
            A2AError::Connection(_) => "CONNECTION_FAILED",
            A2AError::Timeout { .. } => "NETWORK_TIMEOUT",
            A2AError::TargetNotFound { .. } => "TARGET_NOT_FOUND",
            A2AError::NoAgentsMatched { .. } => "NO_AGENTS_MATCHED",
            A2AError::InsufficientParticipants { .. } => "INSUFFICIENT_PARTICIPANTS",
            A2AError::ConsensusTimeout { .. } => "CONSENSUS_TIMEOUT",
            A2AError::ConsensusNotReached { .. } => "CONSENSUS_NOT_REACHED",
            A2AError::PipelineStage { .. } => "PIPELINE_STAGE_FAILED",
            A2AError::Remote { error, .. } => error.code.as_str(),
            A2AError::Client(error) => error.code.as_str(),
            A2AError::Transport(_) => "TRANSPORT_ERROR",
            A2AError::Protocol(_) => "PROTOCOL_ERROR",
            A2AError::Serialization(_) => "SERIALIZATION_ERROR",
            A2AError::Cancelled(_) => "REQUEST_CANCELLED",
            A2AError::Expired { .. } => "MESSAGE_EXPIRED",
            A2AError::Unsupported(_) => "UNSUPPORTED",
        }
    }

    /// Whether repeating the same operation could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            A2AError::Connection(_)
            | A2AError::Timeout { .. }
            | A2AError::Cancelled(_)
            | A2AError::ConsensusTimeout { .. } => true,
            A2AError::Remote { error, .. } | A2AError::Client(error) => error.recoverable,
            A2AError::PipelineStage { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Channel-level failures a direct exchange may repeat on its own
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, A2AError::Connection(_) | A2AError::Timeout { .. })
    }

    fn suggested_action(&self) -> Option<&'static str> {
        match self {
            A2AError::Validation(_) => Some("fix the listed message violations"),
            A2AError::Connection(_) => Some("check connectivity and call connect()"),
            A2AError::Timeout { .. } => Some("retry or raise the execution timeout"),
            A2AError::TargetNotFound { .. } | A2AError::NoAgentsMatched { .. } => {
                Some("refresh the agent directory or broaden the target")
            }
            A2AError::InsufficientParticipants { .. } => {
                Some("lower minimum_participants or widen the target")
            }
            A2AError::ConsensusTimeout { .. } => Some("raise voting_timeout"),
            A2AError::Expired { .. } => Some("resend with a longer ttl"),
            _ => None,
        }
    }

    /// Structured view of this error, as carried in responses and summaries
    pub fn to_client_error(&self) -> ClientError {
        match self {
            A2AError::Remote { error, .. } | A2AError::Client(error) => error.clone(),
            other => ClientError {
                code: other.code().to_string(),
                message: other.to_string(),
                details: None,
                recoverable: other.is_recoverable(),
                suggested_action: other.suggested_action().map(str::to_string),
            },
        }
    }
}

/// Structured error with code, recoverability and a suggested action
///
/// This is the error shape carried by `A2AResponse.error` and by aggregated
/// coordination summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ClientError {
    /// Error code (e.g., "NETWORK_TIMEOUT", "TOOL_FAILED")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error details as structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the operation may succeed if repeated
    #[serde(default)]
    pub recoverable: bool,

    /// Hint for the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ClientError {
    /// Create a new client error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            recoverable: false,
            suggested_action: None,
        }
    }

    /// Add details to the error
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark the error as recoverable
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Attach a suggested action
    pub fn with_suggested_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }
}

/// Result type alias for A2A operations
pub type A2AResult<T> = Result<T, A2AError>;
