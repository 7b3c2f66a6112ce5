//! Core A2A coordination types: messages, targets, coordination modes, responses

pub mod agent;
pub mod coordination;
pub mod error;
pub mod message;
pub mod response;
pub mod target;
pub mod time;

pub use agent::{AgentDirectoryEntry, AgentIdentifier, AgentRole, AgentStatus};
pub use coordination::{Aggregation, ConsensusType, CoordinationMode, FailureStrategy, PipelineStage};
pub use error::{A2AError, A2AResult, ClientError};
pub use message::{
    tools, A2AMessage, A2AMessageBuilder, Consistency, ExecutionContext, MessagePriority,
    ResourceKind, ResourceRequirement, StagePassthrough, StateAccess, StateRequirement, ToolName,
};
pub use response::{A2AResponse, ResponseMetadata};
pub use target::{
    AgentCondition, AgentFilter, AgentTarget, ConditionKind, ConditionOperator, MultiTargetMode,
    SelectionStrategy,
};
