//! Aggregated results returned as the `result` of a coordinated response

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::{
    coordination::{Aggregation, ConsensusType},
    error::{A2AError, ClientError},
    response::A2AResponse,
};

/// One agent's successful answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    #[serde(default)]
    pub result: Value,
}

impl AgentResult {
    pub(crate) fn from_response(agent_id: &str, response: A2AResponse) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            result: response.result.unwrap_or(Value::Null),
        }
    }
}

/// One agent's failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent_id: String,
    pub error: ClientError,
}

impl AgentFailure {
    pub(crate) fn new(agent_id: &str, error: &A2AError) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            error: error.to_client_error(),
        }
    }
}

/// Result of a broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub aggregation: Aggregation,
    /// Number of agents the target resolved to
    pub resolved: usize,
    pub successes: Vec<AgentResult>,
    #[serde(default)]
    pub failures: Vec<AgentFailure>,
    /// Agents whose answer was not awaited
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unanswered: Vec<String>,
}

/// Result of a consensus round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    pub consensus_type: ConsensusType,
    /// Most common result among the successful votes
    pub decision: Value,
    pub agreeing: usize,
    pub required: usize,
    pub participants: usize,
    pub votes: Vec<AgentResult>,
    #[serde(default)]
    pub failures: Vec<AgentFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Skipped,
}

/// Record of one executed pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub name: String,
    pub index: usize,
    pub status: StageStatus,
    pub agents: Vec<String>,
    /// Stage output, `null` when skipped
    pub output: Value,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClientError>,
}

/// Result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub stages: Vec<StageOutcome>,
    /// Output of the last stage that produced one
    pub output: Value,
}

impl PipelineSummary {
    pub fn stage(&self, name: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|stage| stage.name == name)
    }
}
