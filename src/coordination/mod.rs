//! Coordination engine
//!
//! Resolves a message's target against a fresh directory snapshot, fans the
//! message out to the resolved agents through the [`TransportManager`] and
//! folds their answers into one [`A2AResponse`] according to the message's
//! [`CoordinationMode`].

mod broadcast;
mod consensus;
mod direct;
pub mod outcome;
mod pipeline;

use std::{sync::Arc, time::Duration};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt};
use serde::Serialize;
use tracing::Instrument;

use crate::{
    directory::AgentDirectory,
    layer::retry::RetryPolicy,
    protocol::{
        agent::AgentIdentifier,
        coordination::CoordinationMode,
        error::{A2AError, A2AResult, ClientError},
        message::A2AMessage,
        response::A2AResponse,
        target::AgentTarget,
    },
    resolver::TargetResolver,
    service::RequestContext,
    transport::TransportManager,
};

pub use outcome::{
    AgentFailure, AgentResult, BroadcastSummary, ConsensusSummary, PipelineSummary, StageOutcome,
    StageStatus,
};

/// Source identity stamped on aggregated responses
pub const COORDINATOR_ID: &str = "a2a-coordinator";

/// In-flight exchanges of one fan-out, each yielding the agent id and its result
type FanOut<'a> = FuturesUnordered<BoxFuture<'a, (String, A2AResult<A2AResponse>)>>;

/// Executes one logical send
pub struct Coordinator {
    transport: Arc<TransportManager>,
    directory: Arc<dyn AgentDirectory>,
    retry_policy: RetryPolicy,
}

impl Coordinator {
    pub fn new(transport: Arc<TransportManager>, directory: Arc<dyn AgentDirectory>) -> Self {
        Self {
            transport,
            directory,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Policy used by pipeline stages with the `retry` failure strategy when
    /// the message carries none
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.transport
    }

    pub fn directory(&self) -> &Arc<dyn AgentDirectory> {
        &self.directory
    }

    /// Resolve, dispatch and aggregate one message
    pub async fn execute(
        &self,
        message: &A2AMessage,
        context: &RequestContext,
    ) -> A2AResult<A2AResponse> {
        let span = tracing::info_span!(
            "coordinate",
            message_id = %message.id,
            mode = message.coordination.kind(),
            tool = %message.tool_name,
        );
        self.dispatch(message, context).instrument(span).await
    }

    async fn dispatch(
        &self,
        message: &A2AMessage,
        context: &RequestContext,
    ) -> A2AResult<A2AResponse> {
        match &message.coordination {
            CoordinationMode::Direct {
                timeout,
                retries,
                acknowledgment,
            } => {
                let agents = self.resolve(&message.target, message).await?;
                let timeout = self.dispatch_timeout(*timeout, message, context);
                self.direct(message, &agents, timeout, retries.unwrap_or(0), *acknowledgment)
                    .await
            }
            CoordinationMode::Broadcast {
                aggregation,
                timeout,
                partial_success,
            } => {
                let agents = self.resolve(&message.target, message).await?;
                let per_agent = self.dispatch_timeout(*timeout, message, context);
                self.broadcast(message, &agents, *aggregation, *timeout, per_agent, *partial_success)
                    .await
            }
            CoordinationMode::Consensus {
                consensus_type,
                voting_timeout,
                minimum_participants,
            } => {
                let agents = self.resolve(&message.target, message).await?;
                let window = self.dispatch_timeout(*voting_timeout, message, context);
                self.consensus(message, &agents, *consensus_type, window, *minimum_participants)
                    .await
            }
            CoordinationMode::Pipeline {
                stages,
                failure_strategy,
                state_passthrough,
            } => {
                self.pipeline(message, context, stages, *failure_strategy, *state_passthrough)
                    .await
            }
        }
    }

    /// Resolve `target` against a snapshot taken now
    async fn resolve(&self, target: &AgentTarget, message: &A2AMessage) -> A2AResult<Vec<String>> {
        let snapshot = self.directory.snapshot().await?;
        TargetResolver::new(&snapshot)
            .with_source(message.source.as_ref().map(|source| source.agent_id.as_str()))
            .resolve(target)
    }

    /// Deadline for one exchange: the mode's own, else the message's, else
    /// the call's, else the client default
    fn dispatch_timeout(
        &self,
        explicit: Option<Duration>,
        message: &A2AMessage,
        context: &RequestContext,
    ) -> Duration {
        explicit
            .or_else(|| message.timeout())
            .or(context.timeout)
            .unwrap_or_else(|| self.transport.default_timeout())
    }

    /// One request/response exchange with `agent_id`
    ///
    /// The response is returned as received; use [`settle`] to turn an
    /// agent-reported failure into an error.
    async fn exchange(
        &self,
        message: &A2AMessage,
        agent_id: &str,
        dispatch_id: String,
        timeout: Duration,
    ) -> A2AResult<A2AResponse> {
        let copy = message.addressed_to(agent_id, dispatch_id);
        tracing::debug!(agent_id, dispatch_id = %copy.id, "dispatching to agent");
        self.transport.send(&copy, Some(timeout), true).await
    }

    /// Concurrent exchanges with every agent in `agents`
    ///
    /// Dispatch ids are `<id_prefix>#<agent id>`. Dropping the returned set
    /// cancels whatever is still in flight.
    fn fan_out<'a>(
        &'a self,
        message: &A2AMessage,
        id_prefix: &str,
        agents: &[String],
        timeout: Duration,
    ) -> FanOut<'a> {
        agents
            .iter()
            .map(|agent_id| {
                let copy = message.clone();
                let agent_id = agent_id.clone();
                let dispatch_id = format!("{id_prefix}#{agent_id}");
                async move {
                    let result = self.exchange(&copy, &agent_id, dispatch_id, timeout).await;
                    (agent_id, result)
                }
                .boxed()
            })
            .collect()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("transport", &self.transport)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

/// Turn an agent-reported failure into [`A2AError::Remote`]
fn settle(agent_id: &str, response: A2AResponse) -> A2AResult<A2AResponse> {
    if response.success {
        Ok(response)
    } else {
        Err(A2AError::Remote {
            agent_id: agent_id.to_string(),
            error: response
                .error
                .unwrap_or_else(|| ClientError::new("UNKNOWN_ERROR", "agent reported failure")),
        })
    }
}

/// Re-key an agent's response to the caller's message
fn answer(message: &A2AMessage, mut response: A2AResponse) -> A2AResponse {
    response.message_id = message.id.clone();
    response.correlation_id = Some(message.correlation_id.clone());
    response
}

/// Successful response carrying an aggregated summary
fn aggregate<T: Serialize>(message: &A2AMessage, summary: &T) -> A2AResult<A2AResponse> {
    let response = A2AResponse::success(
        message.id.clone(),
        AgentIdentifier::new(COORDINATOR_ID),
        serde_json::to_value(summary)?,
    );
    Ok(answer(message, response))
}

/// The error reported for a failed fan-out: the first unrecoverable one, else
/// the first one
fn decisive(failures: Vec<(String, A2AError)>) -> Option<A2AError> {
    let index = failures
        .iter()
        .position(|(_, error)| !error.is_recoverable())
        .unwrap_or(0);
    failures.into_iter().nth(index).map(|(_, error)| error)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::Coordinator;
    use crate::{
        codec::JsonCodec,
        directory::InMemoryDirectory,
        protocol::{
            agent::{AgentDirectoryEntry, AgentIdentifier, AgentRole},
            error::ClientError,
            message::A2AMessage,
            response::A2AResponse,
            target::AgentTarget,
        },
        transport::{mock::MockTransport, Transport, TransportManager},
    };

    /// Agent id a dispatched copy is addressed to
    pub(crate) fn recipient(message: &A2AMessage) -> String {
        match &message.target {
            AgentTarget::Single { agent_id } => agent_id.clone(),
            other => panic!("dispatched copy must be addressed to one agent, got {other:?}"),
        }
    }

    pub(crate) fn ok(message: &A2AMessage, result: Value) -> A2AResponse {
        A2AResponse::success(message.id.clone(), AgentIdentifier::new(recipient(message)), result)
    }

    pub(crate) fn failed(message: &A2AMessage, code: &str, recoverable: bool) -> A2AResponse {
        A2AResponse::failure(
            message.id.clone(),
            AgentIdentifier::new(recipient(message)),
            ClientError::new(code, "agent failed").recoverable(recoverable),
        )
    }

    pub(crate) fn agents(ids: &[&str]) -> Vec<AgentDirectoryEntry> {
        ids.iter()
            .map(|id| AgentDirectoryEntry::new(*id, AgentRole::Analyst))
            .collect()
    }

    /// Coordinator over a connected unary mock and an in-memory directory
    pub(crate) async fn coordinator(
        transport: MockTransport,
        entries: Vec<AgentDirectoryEntry>,
    ) -> Coordinator {
        let manager = TransportManager::new(Arc::new(JsonCodec), std::time::Duration::from_secs(5));
        manager
            .connect(Arc::new(transport) as Arc<dyn Transport>, None)
            .await
            .unwrap();
        Coordinator::new(Arc::new(manager), Arc::new(InMemoryDirectory::new(entries)))
    }

    pub(crate) fn echo() -> MockTransport {
        MockTransport::responder(|message: A2AMessage| async move {
            let agent = recipient(&message);
            Ok(ok(&message, json!({ "agent": agent })))
        })
    }
}
