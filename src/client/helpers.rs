//! Message builders for the common swarm operations
//!
//! Each helper picks the target and coordination mode suited to the
//! operation and sends the message through [`A2AClient::send`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    client::A2AClient,
    protocol::{
        agent::AgentRole,
        coordination::{Aggregation, ConsensusType, CoordinationMode, FailureStrategy, PipelineStage},
        error::{A2AError, A2AResult},
        message::{
            tools, A2AMessage, Consistency, MessagePriority, ResourceKind, ResourceRequirement,
            StateAccess, StateRequirement,
        },
        response::A2AResponse,
        target::{AgentFilter, AgentTarget, MultiTargetMode, SelectionStrategy},
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwarmProvider {
    #[default]
    GeminiFlow,
    RuvSwarm,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmTopology {
    #[default]
    Hierarchical,
    Mesh,
    Ring,
    Star,
}

/// Parameters of [`A2AClient::initialize_swarm`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmOptions {
    pub provider: SwarmProvider,
    pub topology: SwarmTopology,
    pub max_agents: usize,
    pub strategy: String,
    /// Coordinators vote on the swarm instead of all acknowledging it
    pub consensus: bool,
}

impl Default for SwarmOptions {
    fn default() -> Self {
        Self {
            provider: SwarmProvider::default(),
            topology: SwarmTopology::default(),
            max_agents: 5,
            strategy: "adaptive".to_string(),
            consensus: false,
        }
    }
}

/// An agent taking part in distributed training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParticipant {
    pub agent_id: String,
    /// `coordinator` or `worker`
    pub role: String,
}

impl TrainingParticipant {
    pub fn coordinator(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            role: "coordinator".to_string(),
        }
    }

    pub fn worker(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            role: "worker".to_string(),
        }
    }
}

fn seconds(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

fn initialize_swarm_message(options: &SwarmOptions) -> A2AResult<A2AMessage> {
    let tool = match options.provider {
        SwarmProvider::GeminiFlow => tools::SWARM_INIT,
        SwarmProvider::RuvSwarm => tools::RUV_SWARM_INIT,
    };
    let coordination = if options.consensus {
        CoordinationMode::consensus(ConsensusType::Majority)
    } else {
        CoordinationMode::broadcast_with(Aggregation::All, Some(Duration::from_secs(30)), false)
    };

    A2AMessage::builder()
        .target(AgentTarget::group(AgentRole::Coordinator))
        .tool(tool)
        .coordination(coordination)
        .parameters(json!({
            "topology": options.topology,
            "maxAgents": options.max_agents,
            "strategy": options.strategy,
        }))
        .build()
}

fn spawn_agent_message(
    agent_type: &AgentRole,
    capabilities: &[String],
    name: Option<&str>,
) -> A2AResult<A2AMessage> {
    A2AMessage::builder()
        .target(AgentTarget::group_with(
            AgentRole::Spawner,
            None,
            Some(1),
            SelectionStrategy::LoadBalanced,
        ))
        .tool(tools::AGENT_SPAWN)
        .coordination(CoordinationMode::direct())
        .parameters(json!({
            "type": agent_type,
            "name": name,
            "capabilities": capabilities,
            "placement": {"strategy": "load-balanced"},
        }))
        .build()
}

fn orchestrate_task_message(
    task: &str,
    max_agents: usize,
    priority: MessagePriority,
    stages: Vec<PipelineStage>,
) -> A2AResult<A2AMessage> {
    let (strategy, coordination) = if stages.is_empty() {
        (
            "adaptive",
            CoordinationMode::broadcast_with(Aggregation::Majority, Some(Duration::from_secs(120)), false),
        )
    } else {
        (
            "pipeline",
            CoordinationMode::pipeline(stages, FailureStrategy::Abort, true),
        )
    };

    A2AMessage::builder()
        .target(AgentTarget::group_with(
            AgentRole::TaskOrchestrator,
            None,
            Some(max_agents),
            SelectionStrategy::default(),
        ))
        .tool(tools::TASK_ORCHESTRATE)
        .coordination(coordination)
        .priority(priority)
        .parameters(json!({
            "task": task,
            "strategy": strategy,
            "maxAgents": max_agents,
        }))
        .build()
}

fn store_memory_message(
    key: &str,
    value: Value,
    namespace: &str,
    ttl: Option<Duration>,
    replication_factor: usize,
) -> A2AResult<A2AMessage> {
    A2AMessage::builder()
        .target(AgentTarget::group_with(
            AgentRole::MemoryManager,
            None,
            Some(replication_factor),
            SelectionStrategy::default(),
        ))
        .tool(tools::MEMORY_USAGE)
        .coordination(CoordinationMode::consensus_with(
            ConsensusType::Majority,
            Some(Duration::from_secs(10)),
            None,
        ))
        .state_requirement(
            StateRequirement::new(StateAccess::Write, namespace, vec![key.to_string()])
                .consistency(Consistency::Strong),
        )
        .parameters(json!({
            "action": "store",
            "key": key,
            "value": value,
            "namespace": namespace,
            "ttl": ttl.map(seconds),
        }))
        .build()
}

fn retrieve_memory_message(
    key: &str,
    namespace: &str,
    consistency: Consistency,
) -> A2AResult<A2AMessage> {
    // Strong reads compare three replicas, anything weaker asks one
    let (replicas, coordination) = match consistency {
        Consistency::Strong => (3, CoordinationMode::consensus(ConsensusType::Majority)),
        _ => (1, CoordinationMode::direct()),
    };

    A2AMessage::builder()
        .target(AgentTarget::group_with(
            AgentRole::MemoryManager,
            None,
            Some(replicas),
            SelectionStrategy::default(),
        ))
        .tool(tools::MEMORY_USAGE)
        .coordination(coordination)
        .state_requirement(
            StateRequirement::new(StateAccess::Read, namespace, vec![key.to_string()])
                .consistency(consistency),
        )
        .parameters(json!({
            "action": "retrieve",
            "key": key,
            "namespace": namespace,
        }))
        .build()
}

fn train_neural_model_message(
    model_type: &str,
    training_data: &str,
    participants: &[TrainingParticipant],
    hyperparameters: Value,
) -> A2AResult<A2AMessage> {
    let coordinator = participants
        .iter()
        .find(|p| p.role == "coordinator")
        .ok_or_else(|| {
            A2AError::Validation(vec!["training needs a participant with role 'coordinator'".to_string()])
        })?;
    let workers: Vec<&str> = participants
        .iter()
        .filter(|p| p.role == "worker")
        .map(|p| p.agent_id.as_str())
        .collect();

    let stages = vec![
        PipelineStage::new("initialization")
            .target(AgentTarget::single(&coordinator.agent_id))
            .tool(tools::NEURAL_TRAIN),
        PipelineStage::new("distributed-training")
            .target(AgentTarget::multiple(workers.iter().copied(), MultiTargetMode::Parallel))
            .tool(tools::NEURAL_TRAIN),
    ];

    A2AMessage::builder()
        .target(AgentTarget::multiple(
            participants.iter().map(|p| p.agent_id.as_str()),
            MultiTargetMode::Parallel,
        ))
        .tool(tools::NEURAL_TRAIN)
        .coordination(CoordinationMode::pipeline(stages, FailureStrategy::Retry, true))
        .resource_requirement(
            ResourceRequirement::new(ResourceKind::Gpu, workers.len() as f64, "device")
                .priority(MessagePriority::High),
        )
        .parameters(json!({
            "modelType": model_type,
            "trainingData": training_data,
            "participants": participants,
            "hyperparameters": hyperparameters,
            "coordination": {"mode": "parameter-server"},
        }))
        .build()
}

fn initiate_consensus_message(
    proposal_type: &str,
    details: Value,
    participants: &[String],
    timeout: Duration,
) -> A2AResult<A2AMessage> {
    A2AMessage::builder()
        .target(AgentTarget::multiple(participants, MultiTargetMode::Parallel))
        .tool(tools::DAA_CONSENSUS)
        .coordination(CoordinationMode::consensus_with(
            ConsensusType::Majority,
            Some(timeout),
            Some(participants.len() / 2 + 1),
        ))
        .parameters(json!({
            "proposal": {"type": proposal_type, "details": details},
            "participants": participants,
            "algorithm": "raft",
            "timeout": seconds(timeout),
        }))
        .build()
}

fn analyze_repository_message(
    repo: &str,
    analysis_type: &str,
    max_analyzers: usize,
) -> A2AResult<A2AMessage> {
    A2AMessage::builder()
        .target(AgentTarget::group_with(
            AgentRole::Analyst,
            Some(vec!["github".to_string(), analysis_type.to_string()]),
            Some(max_analyzers),
            SelectionStrategy::default(),
        ))
        .tool(tools::GITHUB_REPO_ANALYZE)
        .coordination(CoordinationMode::broadcast_with(
            Aggregation::All,
            Some(Duration::from_secs(180)),
            false,
        ))
        .parameters(json!({"repo": repo, "analysis_type": analysis_type}))
        .build()
}

impl A2AClient {
    /// Bring up a swarm through the coordinator group
    pub async fn initialize_swarm(&self, options: &SwarmOptions) -> A2AResult<A2AResponse> {
        self.send(initialize_swarm_message(options)?).await
    }

    /// Ask the least loaded spawner for a new agent
    pub async fn spawn_agent(
        &self,
        agent_type: AgentRole,
        capabilities: &[String],
        name: Option<&str>,
    ) -> A2AResult<A2AResponse> {
        self.send(spawn_agent_message(&agent_type, capabilities, name)?)
            .await
    }

    /// Hand a task to up to `max_agents` orchestrators
    ///
    /// With `stages` the task runs as an aborting pipeline, otherwise the
    /// orchestrators answer by majority within two minutes.
    pub async fn orchestrate_task(
        &self,
        task: &str,
        max_agents: usize,
        priority: MessagePriority,
        stages: Vec<PipelineStage>,
    ) -> A2AResult<A2AResponse> {
        self.send(orchestrate_task_message(task, max_agents, priority, stages)?)
            .await
    }

    /// Write `value` to `replication_factor` memory managers, majority agreeing
    pub async fn store_memory(
        &self,
        key: &str,
        value: Value,
        namespace: &str,
        ttl: Option<Duration>,
        replication_factor: usize,
    ) -> A2AResult<A2AResponse> {
        self.send(store_memory_message(key, value, namespace, ttl, replication_factor)?)
            .await
    }

    pub async fn retrieve_memory(
        &self,
        key: &str,
        namespace: &str,
        consistency: Consistency,
    ) -> A2AResult<A2AResponse> {
        self.send(retrieve_memory_message(key, namespace, consistency)?)
            .await
    }

    /// Two-stage training: the coordinator initializes, the workers train
    ///
    /// # Errors
    ///
    /// `Validation` when no participant has the `coordinator` role.
    pub async fn train_neural_model(
        &self,
        model_type: &str,
        training_data: &str,
        participants: &[TrainingParticipant],
        hyperparameters: Value,
    ) -> A2AResult<A2AResponse> {
        let message =
            train_neural_model_message(model_type, training_data, participants, hyperparameters)?;
        self.send(message).await
    }

    /// Put a proposal to `participants`; more than half must agree within `timeout`
    pub async fn initiate_consensus(
        &self,
        proposal_type: &str,
        details: Value,
        participants: &[String],
        timeout: Duration,
    ) -> A2AResult<A2AResponse> {
        self.send(initiate_consensus_message(proposal_type, details, participants, timeout)?)
            .await
    }

    pub async fn analyze_repository(
        &self,
        repo: &str,
        analysis_type: &str,
        max_analyzers: usize,
    ) -> A2AResult<A2AResponse> {
        self.send(analyze_repository_message(repo, analysis_type, max_analyzers)?)
            .await
    }

    pub async fn generate_performance_report(
        &self,
        format: &str,
        timeframe: &str,
        components: Option<Vec<String>>,
    ) -> A2AResult<A2AResponse> {
        let message = A2AMessage::builder()
            .target(AgentTarget::group_with(
                AgentRole::PerformanceMonitor,
                None,
                Some(1),
                SelectionStrategy::default(),
            ))
            .tool(tools::PERFORMANCE_REPORT)
            .coordination(CoordinationMode::direct())
            .parameters(json!({
                "format": format,
                "timeframe": timeframe,
                "components": components,
            }))
            .build()?;
        self.send(message).await
    }

    pub async fn get_swarm_status(&self, swarm_id: Option<&str>) -> A2AResult<A2AResponse> {
        let parameters = match swarm_id {
            Some(id) => json!({"swarmId": id}),
            None => json!({}),
        };
        let message = A2AMessage::builder()
            .target(AgentTarget::group(AgentRole::Coordinator))
            .tool(tools::SWARM_STATUS)
            .coordination(CoordinationMode::broadcast(Aggregation::Majority))
            .parameters(parameters)
            .build()?;
        self.send(message).await
    }

    /// Every agent passing `filter` reports itself
    pub async fn list_agents(&self, filter: Option<AgentFilter>) -> A2AResult<A2AResponse> {
        let message = A2AMessage::builder()
            .target(AgentTarget::broadcast(filter.clone()))
            .tool(tools::AGENT_LIST)
            .coordination(CoordinationMode::broadcast(Aggregation::All))
            .parameters(json!({ "filter": filter }))
            .build()?;
        self.send(message).await
    }
}
