//! Coordination modes: how responses from resolved agents are combined

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{message::ToolName, target::AgentTarget, time};

/// Dispatch and aggregation contract for a message
///
/// Serialized with an explicit `mode` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CoordinationMode {
    /// One request/response exchange with exactly one agent
    Direct {
        #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
        timeout: Option<Duration>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retries: Option<u32>,
        #[serde(default = "default_true")]
        acknowledgment: bool,
    },

    /// Same body to every resolved agent, combined by `aggregation`
    Broadcast {
        #[serde(default)]
        aggregation: Aggregation,
        #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
        timeout: Option<Duration>,
        #[serde(default)]
        partial_success: bool,
    },

    /// Every resolved agent votes; the outcome needs agreement
    Consensus {
        #[serde(default)]
        consensus_type: ConsensusType,
        #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
        voting_timeout: Option<Duration>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum_participants: Option<usize>,
    },

    /// Ordered stages, each with its own target
    Pipeline {
        stages: Vec<PipelineStage>,
        #[serde(default)]
        failure_strategy: FailureStrategy,
        #[serde(default = "default_true")]
        state_passthrough: bool,
    },
}

fn default_true() -> bool {
    true
}

impl CoordinationMode {
    /// Direct coordination with acknowledgment and client defaults
    pub fn direct() -> Self {
        CoordinationMode::Direct {
            timeout: None,
            retries: None,
            acknowledgment: true,
        }
    }

    pub fn direct_with(timeout: Option<Duration>, retries: Option<u32>, acknowledgment: bool) -> Self {
        CoordinationMode::Direct {
            timeout,
            retries,
            acknowledgment,
        }
    }

    pub fn broadcast(aggregation: Aggregation) -> Self {
        CoordinationMode::Broadcast {
            aggregation,
            timeout: None,
            partial_success: false,
        }
    }

    pub fn broadcast_with(
        aggregation: Aggregation,
        timeout: Option<Duration>,
        partial_success: bool,
    ) -> Self {
        CoordinationMode::Broadcast {
            aggregation,
            timeout,
            partial_success,
        }
    }

    pub fn consensus(consensus_type: ConsensusType) -> Self {
        CoordinationMode::Consensus {
            consensus_type,
            voting_timeout: None,
            minimum_participants: None,
        }
    }

    pub fn consensus_with(
        consensus_type: ConsensusType,
        voting_timeout: Option<Duration>,
        minimum_participants: Option<usize>,
    ) -> Self {
        CoordinationMode::Consensus {
            consensus_type,
            voting_timeout,
            minimum_participants,
        }
    }

    pub fn pipeline(
        stages: Vec<PipelineStage>,
        failure_strategy: FailureStrategy,
        state_passthrough: bool,
    ) -> Self {
        CoordinationMode::Pipeline {
            stages,
            failure_strategy,
            state_passthrough,
        }
    }

    /// Discriminant name, as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinationMode::Direct { .. } => "direct",
            CoordinationMode::Broadcast { .. } => "broadcast",
            CoordinationMode::Consensus { .. } => "consensus",
            CoordinationMode::Pipeline { .. } => "pipeline",
        }
    }
}

/// Broadcast completion rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Wait for every agent
    #[default]
    All,
    /// More than half succeeded
    Majority,
    /// First success wins, the rest are cancelled
    First,
    /// First response of any kind wins
    Any,
}

/// Consensus agreement rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusType {
    Unanimous,
    #[default]
    Majority,
    /// Reserved: no weighting source is defined yet
    Weighted,
}

/// What a pipeline does when a stage fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStrategy {
    #[default]
    Abort,
    Skip,
    Retry,
}

/// One stage of a pipeline
///
/// Unset `agent_target`, `tool_name` and `parameters` fall back to the
/// enclosing message's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_target: Option<AgentTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<ToolName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    /// Remote transform applied by the receiving agent to passed-through state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_transform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_transform: Option<String>,

    #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn target(mut self, target: AgentTarget) -> Self {
        self.agent_target = Some(target);
        self
    }

    pub fn tool(mut self, tool_name: impl Into<ToolName>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn input_transform(mut self, transform: impl Into<String>) -> Self {
        self.input_transform = Some(transform.into());
        self
    }

    pub fn output_transform(mut self, transform: impl Into<String>) -> Self {
        self.output_transform = Some(transform.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Display name, `stage-<n>` (1-based) when unnamed
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("stage-{}", index + 1))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_mode_discriminant_and_seconds() {
        let mode = CoordinationMode::broadcast_with(
            Aggregation::Majority,
            Some(Duration::from_millis(1500)),
            true,
        );
        let json = serde_json::to_value(&mode).unwrap();

        assert_eq!(json["mode"], "broadcast");
        assert_eq!(json["aggregation"], "majority");
        assert_eq!(json["timeout"], 1.5);
        assert_eq!(json["partial_success"], true);
    }

    #[test]
    fn test_direct_defaults_to_acknowledgment() {
        let mode: CoordinationMode = serde_json::from_value(json!({"mode": "direct"})).unwrap();
        assert_eq!(mode, CoordinationMode::direct());
    }

    #[test]
    fn test_pipeline_stage_names() {
        let mode: CoordinationMode = serde_json::from_value(json!({
            "mode": "pipeline",
            "stages": [
                {"name": "fetch", "tool_name": "mcp__gemini-flow__memory_usage"},
                {"timeout": 2.0}
            ],
            "failure_strategy": "skip"
        }))
        .unwrap();

        match mode {
            CoordinationMode::Pipeline {
                stages,
                failure_strategy,
                state_passthrough,
            } => {
                assert_eq!(stages[0].display_name(0), "fetch");
                assert_eq!(stages[1].display_name(1), "stage-2");
                assert_eq!(stages[1].timeout, Some(Duration::from_secs(2)));
                assert_eq!(failure_strategy, FailureStrategy::Skip);
                assert!(state_passthrough);
            }
            _ => panic!("Expected pipeline"),
        }
    }
}
