//! A2A message types

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{
    agent::AgentIdentifier, coordination::CoordinationMode, error::A2AError,
    error::A2AResult, target::AgentTarget, time,
};
use crate::layer::{retry::RetryPolicy, validation};

/// Opaque name of a remote tool
///
/// The client never interprets the tool; it only routes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolName(String);

impl ToolName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ToolName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ToolName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known tool names used by the client helpers
pub mod tools {
    pub const SWARM_INIT: &str = "mcp__gemini-flow__swarm_init";
    pub const SWARM_STATUS: &str = "mcp__gemini-flow__swarm_status";
    pub const RUV_SWARM_INIT: &str = "mcp__ruv-swarm__swarm_init";
    pub const AGENT_SPAWN: &str = "mcp__gemini-flow__agent_spawn";
    pub const AGENT_LIST: &str = "mcp__gemini-flow__agent_list";
    pub const TASK_ORCHESTRATE: &str = "mcp__gemini-flow__task_orchestrate";
    pub const MEMORY_USAGE: &str = "mcp__gemini-flow__memory_usage";
    pub const NEURAL_TRAIN: &str = "mcp__gemini-flow__neural_train";
    pub const DAA_CONSENSUS: &str = "mcp__ruv-swarm__daa_consensus";
    pub const GITHUB_REPO_ANALYZE: &str = "mcp__gemini-flow__github_repo_analyze";
    pub const PERFORMANCE_REPORT: &str = "mcp__gemini-flow__performance_report";
}

/// Message priority levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Execution hints for the receiving agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Per-message deadline, overrides the client default
    #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<MessagePriority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAccess {
    Read,
    Write,
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    #[default]
    Eventual,
    Strong,
    Causal,
}

/// State the receiving agent needs access to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRequirement {
    #[serde(rename = "type")]
    pub access: StateAccess,
    pub namespace: String,
    pub keys: Vec<String>,
    #[serde(default)]
    pub consistency: Consistency,
    #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl StateRequirement {
    pub fn new(access: StateAccess, namespace: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            access,
            namespace: namespace.into(),
            keys,
            consistency: Consistency::default(),
            timeout: None,
        }
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Gpu,
    Network,
    Storage,
    Custom,
}

/// Resources the receiving agent should reserve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub amount: f64,
    pub unit: String,
    #[serde(default)]
    pub priority: MessagePriority,
    #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub exclusive: bool,
}

impl ResourceRequirement {
    pub fn new(kind: ResourceKind, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            kind,
            amount,
            unit: unit.into(),
            priority: MessagePriority::default(),
            duration: None,
            exclusive: false,
        }
    }

    pub fn priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Output of the previous pipeline stage, handed to the next one
///
/// The transforms are references resolved by the receiving agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePassthrough {
    pub previous_stage: String,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_transform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_transform: Option<String>,
}

/// A message addressed to one or more remote agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2AMessage {
    /// Unique among the client's pending messages
    pub id: String,

    /// Links responses back to this message, defaults to `id`
    pub correlation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AgentIdentifier>,

    pub target: AgentTarget,

    pub tool_name: ToolName,

    pub coordination: CoordinationMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionContext>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_requirements: Vec<StateRequirement>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_requirements: Vec<ResourceRequirement>,

    pub timestamp: DateTime<Utc>,

    /// Lifetime measured from `timestamp`
    #[serde(default, with = "time::opt_secs", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<MessagePriority>,

    /// Overrides the client-wide retry policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passthrough: Option<StagePassthrough>,
}

impl A2AMessage {
    /// Create a new message builder
    pub fn builder() -> A2AMessageBuilder {
        A2AMessageBuilder::new()
    }

    /// Execution timeout carried by the message, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.execution.as_ref().and_then(|ctx| ctx.timeout)
    }

    /// Whether `timestamp + ttl` lies before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()) {
            Some(ttl) => self.timestamp + ttl < now,
            None => false,
        }
    }

    /// Copy of this message addressed to exactly one agent
    ///
    /// The copy gets its own id (and matching correlation id) so that its
    /// response can be told apart from its siblings; the conversation id
    /// links it back to this message.
    pub fn addressed_to(&self, agent_id: &str, dispatch_id: impl Into<String>) -> A2AMessage {
        let dispatch_id = dispatch_id.into();
        A2AMessage {
            correlation_id: dispatch_id.clone(),
            id: dispatch_id,
            conversation_id: Some(
                self.conversation_id
                    .clone()
                    .unwrap_or_else(|| self.correlation_id.clone()),
            ),
            target: AgentTarget::single(agent_id),
            ..self.clone()
        }
    }
}

/// Generate a message id of the form `msg_<epoch millis>_<8 hex chars>`
pub fn generate_message_id() -> String {
    let suffix = Uuid::now_v7().simple().to_string();
    format!(
        "msg_{}_{}",
        Utc::now().timestamp_millis(),
        &suffix[suffix.len() - 8..]
    )
}

/// Builder for constructing A2AMessage instances
#[derive(Debug, Default)]
pub struct A2AMessageBuilder {
    id: Option<String>,
    correlation_id: Option<String>,
    conversation_id: Option<String>,
    source: Option<AgentIdentifier>,
    target: Option<AgentTarget>,
    tool_name: Option<ToolName>,
    coordination: Option<CoordinationMode>,
    parameters: Option<Value>,
    execution: Option<ExecutionContext>,
    state_requirements: Vec<StateRequirement>,
    resource_requirements: Vec<ResourceRequirement>,
    ttl: Option<Duration>,
    priority: Option<MessagePriority>,
    retry_policy: Option<RetryPolicy>,
}

impl A2AMessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn source(mut self, source: AgentIdentifier) -> Self {
        self.source = Some(source);
        self
    }

    pub fn target(mut self, target: AgentTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn tool(mut self, tool_name: impl Into<ToolName>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn coordination(mut self, coordination: CoordinationMode) -> Self {
        self.coordination = Some(coordination);
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn execution(mut self, execution: ExecutionContext) -> Self {
        self.execution = Some(execution);
        self
    }

    /// Shorthand for an execution context carrying only a timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.execution.get_or_insert_with(Default::default).timeout = Some(timeout);
        self
    }

    pub fn state_requirement(mut self, requirement: StateRequirement) -> Self {
        self.state_requirements.push(requirement);
        self
    }

    pub fn resource_requirement(mut self, requirement: ResourceRequirement) -> Self {
        self.resource_requirements.push(requirement);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn priority(mut self, priority: MessagePriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Validate and build the message
    ///
    /// # Errors
    ///
    /// Returns `A2AError::Validation` listing every structural violation.
    pub fn build(self) -> A2AResult<A2AMessage> {
        let violations = validation::collect_violations(
            self.target.as_ref(),
            self.tool_name.as_ref(),
            self.coordination.as_ref(),
            self.parameters.as_ref(),
            self.ttl,
        );
        if !violations.is_empty() {
            return Err(A2AError::Validation(violations));
        }

        // collect_violations reports all three as missing, so these hold here
        let (Some(target), Some(tool_name), Some(coordination)) =
            (self.target, self.tool_name, self.coordination)
        else {
            return Err(A2AError::Validation(vec![
                "Message target, tool name and coordination mode are required".into(),
            ]));
        };

        let id = self.id.unwrap_or_else(generate_message_id);
        Ok(A2AMessage {
            correlation_id: self.correlation_id.unwrap_or_else(|| id.clone()),
            id,
            conversation_id: self.conversation_id,
            source: self.source,
            target,
            tool_name,
            coordination,
            parameters: self.parameters,
            execution: self.execution,
            state_requirements: self.state_requirements,
            resource_requirements: self.resource_requirements,
            timestamp: Utc::now(),
            ttl: self.ttl,
            priority: self.priority,
            retry_policy: self.retry_policy,
            passthrough: None,
        })
    }
}
