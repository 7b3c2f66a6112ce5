//! A2A response types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    agent::AgentIdentifier,
    error::{A2AError, A2AResult, ClientError},
    time,
};

/// Processing details reported by the responding agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,

    #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_used: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_modifications: Option<Value>,
}

/// Response to an [`A2AMessage`](super::message::A2AMessage)
///
/// `success == true` implies `error` is absent, `success == false` implies it
/// is present. [`A2AResponse::normalize`] enforces that on anything decoded
/// off the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2AResponse {
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default)]
    pub source: AgentIdentifier,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClientError>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: ResponseMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Value>,
}

impl A2AResponse {
    /// Successful response carrying `result`
    pub fn success(message_id: impl Into<String>, source: AgentIdentifier, result: Value) -> Self {
        let message_id = message_id.into();
        Self {
            correlation_id: Some(message_id.clone()),
            message_id,
            source,
            success: true,
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
            metadata: ResponseMetadata::default(),
            performance: None,
        }
    }

    /// Failed response carrying `error`
    pub fn failure(message_id: impl Into<String>, source: AgentIdentifier, error: ClientError) -> Self {
        let message_id = message_id.into();
        Self {
            correlation_id: Some(message_id.clone()),
            message_id,
            source,
            success: false,
            result: None,
            error: Some(error),
            timestamp: Utc::now(),
            metadata: ResponseMetadata::default(),
            performance: None,
        }
    }

    /// Delivery acknowledgment for a message sent without waiting for a reply
    pub fn accepted(message_id: impl Into<String>, source: AgentIdentifier) -> Self {
        let mut response = Self::success(message_id, source, Value::Null);
        response.result = None;
        response
    }

    /// Enforce the success/error exclusivity on a decoded response
    ///
    /// A failure without an error gets a generic one; a success that also
    /// carries an error is rejected.
    pub fn normalize(mut self) -> A2AResult<Self> {
        match (self.success, self.error.is_some()) {
            (true, true) => Err(A2AError::Protocol(format!(
                "response {} is marked successful but carries an error",
                self.message_id
            ))),
            (false, false) => {
                self.error = Some(ClientError::new(
                    "UNKNOWN_ERROR",
                    "agent reported failure without an error",
                ));
                Ok(self)
            }
            _ => Ok(self),
        }
    }

    /// Convert into the result value, or the agent's error
    pub fn into_result(self) -> A2AResult<Option<Value>> {
        if self.success {
            Ok(self.result)
        } else {
            Err(A2AError::Remote {
                agent_id: self.source.agent_id,
                error: self
                    .error
                    .unwrap_or_else(|| ClientError::new("UNKNOWN_ERROR", "agent reported failure")),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_failure_without_error_is_filled_in() {
        let response: A2AResponse = serde_json::from_value(json!({
            "message_id": "m1",
            "success": false
        }))
        .unwrap();

        let response = response.normalize().unwrap();
        assert_eq!(response.error.unwrap().code, "UNKNOWN_ERROR");
    }

    #[test]
    fn test_success_with_error_is_rejected() {
        let response: A2AResponse = serde_json::from_value(json!({
            "message_id": "m1",
            "success": true,
            "error": {"code": "X", "message": "y"}
        }))
        .unwrap();

        assert!(matches!(response.normalize(), Err(A2AError::Protocol(_))));
    }

    #[test]
    fn test_into_result_surfaces_remote_error() {
        let response = A2AResponse::failure(
            "m1",
            AgentIdentifier::new("agent-1"),
            ClientError::new("TOOL_FAILED", "nope"),
        );

        match response.into_result() {
            Err(A2AError::Remote { agent_id, error }) => {
                assert_eq!(agent_id, "agent-1");
                assert_eq!(error.code, "TOOL_FAILED");
            }
            other => panic!("Expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_metadata_processing_time_in_seconds() {
        let response: A2AResponse = serde_json::from_value(json!({
            "message_id": "m1",
            "success": true,
            "result": {"ok": true},
            "metadata": {"processing_time": 0.25, "agent_version": "2.1.0"}
        }))
        .unwrap();

        assert_eq!(
            response.metadata.processing_time,
            Some(Duration::from_millis(250))
        );
        assert_eq!(response.metadata.agent_version.as_deref(), Some("2.1.0"));
    }
}
