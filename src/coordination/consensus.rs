use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::time::{timeout_at, Instant};

use super::{aggregate, settle, AgentFailure, AgentResult, ConsensusSummary, Coordinator};
use crate::protocol::{
    coordination::ConsensusType,
    error::{A2AError, A2AResult},
    message::A2AMessage,
    response::A2AResponse,
};

/// Most common result among `votes` and how many votes it got
///
/// Ties go to the result seen first.
fn tally(votes: &[AgentResult]) -> (Value, usize) {
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    for vote in votes {
        match counts.iter_mut().find(|(result, _)| **result == vote.result) {
            Some((_, count)) => *count += 1,
            None => counts.push((&vote.result, 1)),
        }
    }

    let mut best: Option<(&Value, usize)> = None;
    for (result, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((result, count));
        }
    }
    best.map_or((Value::Null, 0), |(result, count)| (result.clone(), count))
}

impl Coordinator {
    /// Every agent votes within `window`
    ///
    /// `unanimous` needs every agent to succeed with the same result;
    /// `majority` needs `minimum_participants` successes, or more than half of
    /// the resolved agents when unset.
    pub(super) async fn consensus(
        &self,
        message: &A2AMessage,
        agents: &[String],
        consensus_type: ConsensusType,
        window: Duration,
        minimum_participants: Option<usize>,
    ) -> A2AResult<A2AResponse> {
        if consensus_type == ConsensusType::Weighted {
            return Err(A2AError::Unsupported(
                "weighted consensus has no weighting source".to_string(),
            ));
        }

        let participants = agents.len();
        if participants == 0 || minimum_participants.is_some_and(|minimum| minimum > participants)
        {
            return Err(A2AError::InsufficientParticipants {
                required: minimum_participants.unwrap_or(1),
                available: participants,
            });
        }

        let required = match consensus_type {
            ConsensusType::Unanimous => participants,
            _ => minimum_participants.unwrap_or(participants / 2 + 1),
        };
        tracing::debug!(participants, required, ?window, "opening vote");

        let deadline = Instant::now() + window;
        let mut ballots = self.fan_out(message, &message.id, agents, window);
        let mut votes: Vec<AgentResult> = Vec::new();
        let mut failures: Vec<AgentFailure> = Vec::new();
        let mut received = 0;

        let agreeing = loop {
            let Ok(next) = timeout_at(deadline, ballots.next()).await else {
                tracing::warn!(received, required, "voting window closed");
                return Err(A2AError::ConsensusTimeout { received, required });
            };
            let Some((agent_id, result)) = next else {
                break tally(&votes).1;
            };
            received += 1;

            match result.and_then(|response| settle(&agent_id, response)) {
                Ok(response) => votes.push(AgentResult::from_response(&agent_id, response)),
                Err(e) => {
                    tracing::debug!(agent_id = %agent_id, "vote failed: {}", e);
                    failures.push(AgentFailure::new(&agent_id, &e));
                }
            }

            let (_, agreeing) = tally(&votes);
            match consensus_type {
                ConsensusType::Unanimous => {
                    if !failures.is_empty() || agreeing < votes.len() {
                        return Err(A2AError::ConsensusNotReached {
                            agreeing,
                            required,
                            received,
                        });
                    }
                    if agreeing >= required {
                        break agreeing;
                    }
                }
                _ => {
                    if votes.len() >= required {
                        break agreeing;
                    }
                    if votes.len() + ballots.len() < required {
                        return Err(A2AError::ConsensusNotReached {
                            agreeing,
                            required,
                            received,
                        });
                    }
                }
            }
        };
        drop(ballots);

        if votes.len() < required {
            return Err(A2AError::ConsensusNotReached {
                agreeing,
                required,
                received,
            });
        }

        let (decision, agreeing) = tally(&votes);
        tracing::debug!(agreeing, required, received, "consensus reached");
        aggregate(
            message,
            &ConsensusSummary {
                consensus_type,
                decision,
                agreeing,
                required,
                participants,
                votes,
                failures,
            },
        )
    }
}
