//! Agent targeting descriptions
//!
//! A target says *which* agents a message should reach, without naming the
//! concrete set. The resolver turns it into agent ids against a directory
//! snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent::{AgentDirectoryEntry, AgentRole, AgentStatus};

/// Abstract description of the agent(s) a message should reach
///
/// Serialized with an explicit `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentTarget {
    /// One specific agent
    Single { agent_id: String },

    /// An explicit list of agents
    Multiple {
        agent_ids: Vec<String>,
        #[serde(default)]
        coordination_mode: MultiTargetMode,
    },

    /// Agents selected by role and capabilities
    Group {
        role: AgentRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capabilities: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_agents: Option<usize>,
        #[serde(default)]
        selection_strategy: SelectionStrategy,
    },

    /// Every agent passing an optional filter
    Broadcast {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<AgentFilter>,
        #[serde(default)]
        exclude_source: bool,
    },

    /// Agents passing every condition, else the fallback target
    Conditional {
        conditions: Vec<AgentCondition>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<AgentTarget>>,
    },
}

impl AgentTarget {
    pub fn single(agent_id: impl Into<String>) -> Self {
        AgentTarget::Single {
            agent_id: agent_id.into(),
        }
    }

    pub fn multiple<I, S>(agent_ids: I, coordination_mode: MultiTargetMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AgentTarget::Multiple {
            agent_ids: agent_ids.into_iter().map(Into::into).collect(),
            coordination_mode,
        }
    }

    /// Group target with the load-balanced strategy and no cap
    pub fn group(role: AgentRole) -> Self {
        AgentTarget::Group {
            role,
            capabilities: None,
            max_agents: None,
            selection_strategy: SelectionStrategy::default(),
        }
    }

    pub fn group_with(
        role: AgentRole,
        capabilities: Option<Vec<String>>,
        max_agents: Option<usize>,
        selection_strategy: SelectionStrategy,
    ) -> Self {
        AgentTarget::Group {
            role,
            capabilities,
            max_agents,
            selection_strategy,
        }
    }

    pub fn broadcast(filter: Option<AgentFilter>) -> Self {
        AgentTarget::Broadcast {
            filter,
            exclude_source: false,
        }
    }

    pub fn conditional(conditions: Vec<AgentCondition>, fallback: Option<AgentTarget>) -> Self {
        AgentTarget::Conditional {
            conditions,
            fallback: fallback.map(Box::new),
        }
    }

    /// Discriminant name, as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            AgentTarget::Single { .. } => "single",
            AgentTarget::Multiple { .. } => "multiple",
            AgentTarget::Group { .. } => "group",
            AgentTarget::Broadcast { .. } => "broadcast",
            AgentTarget::Conditional { .. } => "conditional",
        }
    }
}

/// How an explicit agent list is driven inside a pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiTargetMode {
    #[default]
    Parallel,
    Sequential,
    Race,
}

/// Ranking applied to a group's candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    Random,
    #[default]
    LoadBalanced,
    CapabilityMatched,
}

/// Filter criteria for broadcast targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm_id: Option<String>,
}

impl AgentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: AgentRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    pub fn status(mut self, status: AgentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn swarm(mut self, swarm_id: impl Into<String>) -> Self {
        self.swarm_id = Some(swarm_id.into());
        self
    }

    /// Whether `entry` passes every criterion that is set
    pub fn matches(&self, entry: &AgentDirectoryEntry) -> bool {
        self.role.as_ref().map_or(true, |role| &entry.role == role)
            && self
                .capabilities
                .as_ref()
                .map_or(true, |caps| entry.has_capabilities(caps))
            && self.status.map_or(true, |status| entry.status == status)
            && self
                .swarm_id
                .as_ref()
                .map_or(true, |swarm| entry.swarm_id.as_ref() == Some(swarm))
    }
}

/// One test of a conditional target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCondition {
    /// Which agent attribute the condition reads
    #[serde(rename = "type")]
    pub kind: ConditionKind,

    pub operator: ConditionOperator,

    pub value: Value,

    /// Metadata key read by `custom` conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl AgentCondition {
    pub fn new(kind: ConditionKind, operator: ConditionOperator, value: Value) -> Self {
        Self {
            kind,
            operator,
            value,
            key: None,
        }
    }

    /// Condition on an arbitrary metadata attribute
    pub fn custom(key: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            kind: ConditionKind::Custom,
            operator,
            value,
            key: Some(key.into()),
        }
    }
}

/// Agent attribute a condition is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    /// The capability list
    Capability,
    /// The current load
    Resource,
    /// The availability status
    Status,
    /// `metadata["location"]`
    Location,
    /// `metadata[key]`
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
}
