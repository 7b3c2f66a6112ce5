//! End-to-end client flows over a scripted swarm
//!
//! The scripted transport plays every remote agent: it decodes each
//! dispatched copy, answers for the agent it is addressed to and records what
//! it received.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tokio::time::Instant;
use tower_a2a_swarm::{
    coordination::{BroadcastSummary, ConsensusSummary, PipelineSummary, COORDINATOR_ID},
    prelude::*,
    protocol::{AgentIdentifier, Consistency, ToolName},
    transport::{Transport, TransportRequest, TransportResponse},
};
use url::Url;

#[derive(Default)]
struct Script {
    calls: AtomicUsize,
    /// Calls still to fail with a connection error
    outages: AtomicUsize,
    /// Agents that never answer
    silent: Vec<&'static str>,
    received: Mutex<Vec<A2AMessage>>,
}

#[derive(Clone)]
struct ScriptedSwarm {
    script: Arc<Script>,
    base_url: Url,
}

impl ScriptedSwarm {
    fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            base_url: "http://swarm.test".parse().unwrap(),
        }
    }

    fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    fn received(&self) -> Vec<A2AMessage> {
        self.script.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedSwarm {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        let outage = self
            .script
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if outage.is_ok() {
            return Err(A2AError::Connection("connection reset by peer".to_string()));
        }

        let message: A2AMessage = serde_json::from_slice(&request.body)?;
        let AgentTarget::Single { agent_id } = &message.target else {
            return Err(A2AError::Protocol("copy not addressed to one agent".to_string()));
        };
        let agent_id = agent_id.clone();
        self.script.received.lock().unwrap().push(message.clone());

        if self.script.silent.iter().any(|id| *id == agent_id) {
            std::future::pending::<()>().await;
        }

        let response = A2AResponse::success(
            message.id.clone(),
            AgentIdentifier::new(agent_id),
            json!({
                "tool": message.tool_name.as_str(),
                "input": message.parameters,
            }),
        );
        Ok(TransportResponse::new(200).body(Bytes::from(serde_json::to_vec(&response)?)))
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn directory() -> Arc<InMemoryDirectory> {
    Arc::new(InMemoryDirectory::new([
        AgentDirectoryEntry::new("coord-1", AgentRole::Coordinator),
        AgentDirectoryEntry::new("mem-1", AgentRole::MemoryManager).with_load(0.3),
        AgentDirectoryEntry::new("mem-2", AgentRole::MemoryManager).with_load(0.1),
        AgentDirectoryEntry::new("mem-3", AgentRole::MemoryManager).with_load(0.2),
    ]))
}

async fn connected(swarm: &ScriptedSwarm) -> A2AClient {
    let client = A2AClientBuilder::new("http://swarm.test".parse().unwrap())
        .with_websocket(false)
        .with_directory(directory())
        .with_unary_transport(Arc::new(swarm.clone()))
        .build()
        .unwrap();
    client.connect().await.unwrap();
    client
}

fn direct_to(agent_id: &str) -> A2AMessage {
    A2AMessage::builder()
        .target(AgentTarget::single(agent_id))
        .tool(tools::SWARM_STATUS)
        .coordination(CoordinationMode::direct())
        .parameters(json!({"verbose": true}))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_list_agents_reaches_every_agent() {
    let swarm = ScriptedSwarm::new(Script::default());
    let client = connected(&swarm).await;

    let response = client.list_agents(None).await.unwrap();
    assert_eq!(response.source.agent_id, COORDINATOR_ID);

    let summary: BroadcastSummary = serde_json::from_value(response.result.unwrap()).unwrap();
    let mut agents: Vec<_> = summary.successes.iter().map(|r| r.agent_id.clone()).collect();
    agents.sort();
    assert_eq!(agents, ["coord-1", "mem-1", "mem-2", "mem-3"]);
    assert!(summary.failures.is_empty());
    assert_eq!(swarm.calls(), 4);
}

#[tokio::test]
async fn test_direct_response_keyed_to_request() {
    let swarm = ScriptedSwarm::new(Script::default());
    let client = connected(&swarm).await;
    let message = direct_to("coord-1");

    let response = client.send(message.clone()).await.unwrap();

    assert_eq!(response.message_id, message.id);
    assert_eq!(response.correlation_id.as_deref(), Some(message.correlation_id.as_str()));
    assert_eq!(
        response.result.unwrap()["input"],
        json!({"verbose": true})
    );
    assert_eq!(
        swarm.received()[0].conversation_id.as_deref(),
        Some(message.correlation_id.as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_rides_out_connection_outage() {
    let swarm = ScriptedSwarm::new(Script {
        outages: AtomicUsize::new(2),
        ..Default::default()
    });
    let client = connected(&swarm).await;
    let started = Instant::now();

    let response = client.send(direct_to("coord-1")).await.unwrap();

    assert!(response.success);
    assert_eq!(swarm.calls(), 3);
    // Exponential backoff: 1s, then 2s
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
}

#[tokio::test]
async fn test_invalid_message_never_leaves_the_client() {
    let swarm = ScriptedSwarm::new(Script::default());
    let client = connected(&swarm).await;

    let mut message = direct_to("coord-1");
    message.parameters = Some(json!("not an object"));
    message.tool_name = ToolName::new("");

    let err = client.send(message).await.unwrap_err();
    let A2AError::Validation(violations) = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(violations.len(), 2);
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(swarm.calls(), 0);
}

#[tokio::test]
async fn test_expired_message_is_not_sent() {
    let swarm = ScriptedSwarm::new(Script::default());
    let client = connected(&swarm).await;

    let mut message = direct_to("coord-1");
    message.ttl = Some(Duration::from_secs(1));
    message.timestamp = chrono::Utc::now() - chrono::Duration::seconds(5);

    let err = client.send(message).await.unwrap_err();
    assert_eq!(err.code(), "MESSAGE_EXPIRED");
    assert_eq!(swarm.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_replicated_write_survives_a_silent_replica() {
    let swarm = ScriptedSwarm::new(Script {
        silent: vec!["mem-1"],
        ..Default::default()
    });
    let client = connected(&swarm).await;

    let response = client
        .store_memory("release", json!("v2"), "deploy", None, 3)
        .await
        .unwrap();
    let summary: ConsensusSummary = serde_json::from_value(response.result.unwrap()).unwrap();

    assert_eq!(summary.participants, 3);
    assert_eq!(summary.required, 2);
    assert_eq!(summary.agreeing, 2);
    assert_eq!(summary.decision["input"]["key"], "release");
}

#[tokio::test]
async fn test_eventual_read_asks_least_loaded_replica() {
    let swarm = ScriptedSwarm::new(Script::default());
    let client = connected(&swarm).await;

    let response = client
        .retrieve_memory("release", "deploy", Consistency::Eventual)
        .await
        .unwrap();

    assert_eq!(response.result.unwrap()["input"]["action"], "retrieve");
    let received = swarm.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].target, AgentTarget::single("mem-2"));
}

#[tokio::test]
async fn test_pipeline_hands_state_to_next_stage() {
    let swarm = ScriptedSwarm::new(Script::default());
    let client = connected(&swarm).await;

    let message = A2AMessage::builder()
        .target(AgentTarget::single("mem-2"))
        .tool(tools::MEMORY_USAGE)
        .coordination(CoordinationMode::pipeline(
            vec![
                PipelineStage::new("read").parameters(json!({"action": "retrieve"})),
                PipelineStage::new("report")
                    .target(AgentTarget::single("coord-1"))
                    .tool(tools::PERFORMANCE_REPORT)
                    .input_transform("summarize"),
            ],
            FailureStrategy::Abort,
            true,
        ))
        .parameters(json!({}))
        .build()
        .unwrap();

    let response = client.send(message).await.unwrap();
    let summary: PipelineSummary = serde_json::from_value(response.result.unwrap()).unwrap();
    assert_eq!(summary.stages.len(), 2);
    assert_eq!(summary.stage("report").unwrap().agents, ["coord-1"]);
    assert_eq!(summary.output["tool"], tools::PERFORMANCE_REPORT);

    let received = swarm.received();
    let passthrough = received[1].passthrough.as_ref().unwrap();
    assert_eq!(passthrough.previous_stage, "read");
    assert_eq!(passthrough.output["input"], json!({"action": "retrieve"}));
    assert_eq!(passthrough.input_transform.as_deref(), Some("summarize"));
}

#[tokio::test]
async fn test_disconnect_refuses_further_sends() {
    let swarm = ScriptedSwarm::new(Script::default());
    let client = A2AClientBuilder::new("http://swarm.test".parse().unwrap())
        .with_websocket(false)
        .with_retry_policy(RetryPolicy::none())
        .with_directory(directory())
        .with_unary_transport(Arc::new(swarm.clone()))
        .build()
        .unwrap();
    client.connect().await.unwrap();
    assert_eq!(client.active_channel().await, Some(ChannelKind::Unary));

    client.disconnect().await;
    let err = client.send(direct_to("coord-1")).await.unwrap_err();
    assert_eq!(err.code(), "CONNECTION_FAILED");
    assert_eq!(swarm.calls(), 0);
}
