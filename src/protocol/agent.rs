//! Agent identity, roles and directory entries

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role an agent plays inside a swarm
///
/// Known roles serialize to their kebab-case names; anything else round-trips
/// through [`AgentRole::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentRole {
    Coordinator,
    Researcher,
    Coder,
    Analyst,
    Optimizer,
    Tester,
    Reviewer,
    Spawner,
    MemoryManager,
    TaskOrchestrator,
    NeuralTrainer,
    SystemArchitect,
    PerformanceMonitor,
    SecurityManager,
    DaaCoordinator,
    ConsensusManager,
    ResourceAllocator,
    /// A role outside the known set
    Custom(String),
}

impl AgentRole {
    /// Wire name of the role
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Coordinator => "coordinator",
            AgentRole::Researcher => "researcher",
            AgentRole::Coder => "coder",
            AgentRole::Analyst => "analyst",
            AgentRole::Optimizer => "optimizer",
            AgentRole::Tester => "tester",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Spawner => "spawner",
            AgentRole::MemoryManager => "memory-manager",
            AgentRole::TaskOrchestrator => "task-orchestrator",
            AgentRole::NeuralTrainer => "neural-trainer",
            AgentRole::SystemArchitect => "system-architect",
            AgentRole::PerformanceMonitor => "performance-monitor",
            AgentRole::SecurityManager => "security-manager",
            AgentRole::DaaCoordinator => "daa-coordinator",
            AgentRole::ConsensusManager => "consensus-manager",
            AgentRole::ResourceAllocator => "resource-allocator",
            AgentRole::Custom(name) => name,
        }
    }

    /// A role with no name, as produced by an empty custom role
    pub fn is_unset(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl From<String> for AgentRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "coordinator" => AgentRole::Coordinator,
            "researcher" => AgentRole::Researcher,
            "coder" => AgentRole::Coder,
            "analyst" => AgentRole::Analyst,
            "optimizer" => AgentRole::Optimizer,
            "tester" => AgentRole::Tester,
            "reviewer" => AgentRole::Reviewer,
            "spawner" => AgentRole::Spawner,
            "memory-manager" => AgentRole::MemoryManager,
            "task-orchestrator" => AgentRole::TaskOrchestrator,
            "neural-trainer" => AgentRole::NeuralTrainer,
            "system-architect" => AgentRole::SystemArchitect,
            "performance-monitor" => AgentRole::PerformanceMonitor,
            "security-manager" => AgentRole::SecurityManager,
            "daa-coordinator" => AgentRole::DaaCoordinator,
            "consensus-manager" => AgentRole::ConsensusManager,
            "resource-allocator" => AgentRole::ResourceAllocator,
            _ => AgentRole::Custom(value),
        }
    }
}

impl From<&str> for AgentRole {
    fn from(value: &str) -> Self {
        AgentRole::from(value.to_string())
    }
}

impl From<AgentRole> for String {
    fn from(role: AgentRole) -> Self {
        match role {
            AgentRole::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of an agent as last reported by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Idle,
    Busy,
}

impl AgentStatus {
    /// Whether the agent can take new work
    pub fn is_available(&self) -> bool {
        !matches!(self, AgentStatus::Busy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
        }
    }
}

/// Identity of a message sender or responder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentifier {
    pub agent_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

impl AgentIdentifier {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.agent_type = Some(role);
        self
    }

    pub fn with_swarm(mut self, swarm_id: impl Into<String>) -> Self {
        self.swarm_id = Some(swarm_id.into());
        self
    }
}

/// One agent as known to the external registry
///
/// The client only ever reads these; the registry owns and refreshes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDirectoryEntry {
    pub agent_id: String,

    pub role: AgentRole,

    #[serde(default)]
    pub capabilities: Vec<String>,

    pub status: AgentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm_id: Option<String>,

    /// Current load, lower is less busy
    #[serde(default)]
    pub load: f64,

    /// Free-form attributes (location, custom condition keys)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl AgentDirectoryEntry {
    /// Create an active entry with no capabilities and zero load
    pub fn new(agent_id: impl Into<String>, role: AgentRole) -> Self {
        Self {
            agent_id: agent_id.into(),
            role,
            capabilities: Vec::new(),
            status: AgentStatus::Active,
            swarm_id: None,
            load: 0.0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_load(mut self, load: f64) -> Self {
        self.load = load;
        self
    }

    pub fn with_swarm(mut self, swarm_id: impl Into<String>) -> Self {
        self.swarm_id = Some(swarm_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether the entry advertises every capability in `required`
    pub fn has_capabilities(&self, required: &[String]) -> bool {
        required.iter().all(|cap| self.capabilities.contains(cap))
    }

    /// Number of `requested` capabilities this agent advertises
    pub fn capability_overlap(&self, requested: &[String]) -> usize {
        requested
            .iter()
            .filter(|cap| self.capabilities.contains(cap))
            .count()
    }

    /// Identity view of this entry, as used in responses
    pub fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier {
            agent_id: self.agent_id.clone(),
            agent_type: Some(self.role.clone()),
            swarm_id: self.swarm_id.clone(),
            capabilities: Some(self.capabilities.clone()),
        }
    }
}
