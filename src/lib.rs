//! # Tower A2A Swarm
//!
//! A Tower-based client for coordinating tool calls across a swarm of remote
//! agents over the Agent-to-Agent (A2A) message protocol.
//!
//! A message names an abstract [`AgentTarget`](protocol::AgentTarget) (one
//! agent, a list, a role group, a filtered broadcast or a conditional
//! selection) and a [`CoordinationMode`](protocol::CoordinationMode) that
//! says how the resolved agents' answers become one response: direct,
//! broadcast, consensus or pipeline.
//!
//! ## Features
//!
//! - **Two channels**: a multiplexed WebSocket stream with correlated
//!   replies, falling back to HTTP request/response
//! - **Composable middleware**: validation and retry as Tower layers over
//!   the coordination service
//! - **Target resolution** against a pluggable agent directory
//! - **Async**: built on tokio; fan-outs run concurrently and honour their
//!   windows
//!
//! ## Example
//!
//! ```rust,no_run
//! use tower_a2a_swarm::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let url = "https://swarm.example.com".parse()?;
//!     let client = A2AClientBuilder::new(url)
//!         .with_api_key("secret")
//!         .with_timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     client.connect().await?;
//!     let status = client.get_swarm_status(None).await?;
//!     println!("{:?}", status.result);
//!     client.disconnect().await;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod coordination;
pub mod directory;
pub mod layer;
pub mod protocol;
pub mod resolver;
pub mod service;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        client::{A2AClient, A2AClientBuilder, ClientConfig},
        directory::{AgentDirectory, DirectorySnapshot, InMemoryDirectory},
        layer::{BackoffStrategy, RetryPolicy},
        protocol::{
            tools, A2AError, A2AMessage, A2AResponse, A2AResult, AgentDirectoryEntry, AgentFilter,
            AgentRole, AgentStatus, AgentTarget, Aggregation, ConsensusType, CoordinationMode,
            FailureStrategy, MessagePriority, MultiTargetMode, PipelineStage,
        },
        transport::ChannelKind,
    };
}
