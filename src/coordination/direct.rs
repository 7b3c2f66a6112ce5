use std::time::Duration;

use super::{answer, settle, Coordinator};
use crate::protocol::{
    error::{A2AError, A2AResult},
    message::A2AMessage,
    response::A2AResponse,
};

impl Coordinator {
    /// Single exchange with exactly one resolved agent
    ///
    /// `retries` repeats the exchange immediately on channel-level failures,
    /// independent of the outer retry policy. Without `acknowledgment` a
    /// stream send returns once the frame is written.
    pub(super) async fn direct(
        &self,
        message: &A2AMessage,
        agents: &[String],
        timeout: Duration,
        retries: u32,
        acknowledgment: bool,
    ) -> A2AResult<A2AResponse> {
        let [agent_id] = agents else {
            return Err(A2AError::Validation(vec![format!(
                "direct coordination needs exactly one agent, target resolved to {}",
                agents.len()
            )]));
        };

        let copy = message.addressed_to(agent_id, message.id.clone());
        let mut attempt = 0;
        loop {
            match self.transport.send(&copy, Some(timeout), acknowledgment).await {
                Ok(response) => return settle(agent_id, response).map(|r| answer(message, r)),
                Err(e) if attempt < retries && e.is_transient() => {
                    attempt += 1;
                    tracing::debug!(agent_id = %agent_id, attempt, "direct exchange failed, repeating: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
