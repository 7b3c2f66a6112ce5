use std::{collections::HashSet, time::Duration};

use futures::StreamExt;
use tokio::time::{timeout_at, Instant};

use super::{
    aggregate, answer, decisive, settle, AgentFailure, AgentResult, BroadcastSummary, Coordinator,
};
use crate::protocol::{
    coordination::Aggregation,
    error::{A2AError, A2AResult},
    message::A2AMessage,
    response::A2AResponse,
};

impl Coordinator {
    /// Same message to every agent, combined by `aggregation`
    ///
    /// `window` bounds the whole broadcast; agents that have not answered when
    /// it closes are recorded as timed out.
    pub(super) async fn broadcast(
        &self,
        message: &A2AMessage,
        agents: &[String],
        aggregation: Aggregation,
        window: Option<Duration>,
        per_agent: Duration,
        partial_success: bool,
    ) -> A2AResult<A2AResponse> {
        let resolved = agents.len();
        if agents.is_empty() {
            tracing::debug!("broadcast target resolved to no agents");
            return aggregate(
                message,
                &BroadcastSummary {
                    aggregation,
                    resolved,
                    successes: Vec::new(),
                    failures: Vec::new(),
                    unanswered: Vec::new(),
                },
            );
        }

        let majority = resolved / 2 + 1;
        let deadline = window.map(|window| Instant::now() + window);
        let mut in_flight = self.fan_out(message, &message.id, agents, per_agent);
        let mut answered = HashSet::new();
        let mut successes = Vec::new();
        let mut failures: Vec<(String, A2AError)> = Vec::new();
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(deadline) => match timeout_at(deadline, in_flight.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => in_flight.next().await,
            };
            let Some((agent_id, result)) = next else {
                break;
            };
            answered.insert(agent_id.clone());

            match result {
                // Any answer at all settles `any`; `first` needs a success
                Ok(response)
                    if aggregation == Aggregation::Any
                        || (aggregation == Aggregation::First && response.success) =>
                {
                    tracing::debug!(agent_id = %agent_id, ?aggregation, "broadcast settled early");
                    return Ok(answer(message, response));
                }
                Ok(response) => match settle(&agent_id, response) {
                    Ok(response) => successes.push(AgentResult::from_response(&agent_id, response)),
                    Err(e) => failures.push((agent_id, e)),
                },
                Err(e) => {
                    tracing::debug!(agent_id = %agent_id, "broadcast exchange failed: {}", e);
                    failures.push((agent_id, e));
                }
            }

            if aggregation == Aggregation::Majority {
                // Decided either way; stragglers are listed as unanswered
                if successes.len() >= majority {
                    break;
                }
                if successes.len() + in_flight.len() < majority {
                    break;
                }
            }
        }
        drop(in_flight);

        let mut unanswered: Vec<String> = agents
            .iter()
            .filter(|agent_id| !answered.contains(*agent_id))
            .cloned()
            .collect();
        if timed_out {
            let after = window.unwrap_or(per_agent);
            tracing::warn!(unanswered = unanswered.len(), ?after, "broadcast window closed");
            if successes.len() < majority || aggregation != Aggregation::Majority {
                for agent_id in unanswered.drain(..) {
                    let error = A2AError::Timeout {
                        message_id: format!("{}#{}", message.id, agent_id),
                        after,
                    };
                    failures.push((agent_id, error));
                }
            }
        }

        let summary = BroadcastSummary {
            aggregation,
            resolved,
            successes,
            failures: failures
                .iter()
                .map(|(agent_id, error)| AgentFailure::new(agent_id, error))
                .collect(),
            unanswered,
        };

        let succeeded = match aggregation {
            Aggregation::All => {
                failures.is_empty() || (partial_success && !summary.successes.is_empty())
            }
            Aggregation::Majority => summary.successes.len() >= majority,
            Aggregation::First | Aggregation::Any => false,
        };

        if succeeded {
            tracing::debug!(
                successes = summary.successes.len(),
                failures = summary.failures.len(),
                "broadcast complete"
            );
            return aggregate(message, &summary);
        }

        Err(decisive(failures).unwrap_or_else(|| A2AError::Timeout {
            message_id: message.id.clone(),
            after: window.unwrap_or(per_agent),
        }))
    }
}
