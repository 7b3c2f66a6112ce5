//! Structural validation of messages before any network activity
//!
//! Every rule is checked and all violations are reported together, so a
//! caller sees every problem in one round-trip.

use std::{
    collections::HashSet,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use serde_json::Value;
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    protocol::{
        coordination::CoordinationMode,
        error::A2AError,
        message::{A2AMessage, ToolName},
        response::A2AResponse,
        target::AgentTarget,
    },
    service::A2ARequest,
};

/// Collect every structural violation of a message's parts
///
/// Missing parts are violations in their own right; the remaining rules are
/// checked on whatever is present.
pub fn collect_violations(
    target: Option<&AgentTarget>,
    tool_name: Option<&ToolName>,
    coordination: Option<&CoordinationMode>,
    parameters: Option<&Value>,
    ttl: Option<Duration>,
) -> Vec<String> {
    let mut violations = Vec::new();

    match target {
        Some(target) => check_target(target, "target", &mut violations),
        None => violations.push("Message target is required".to_string()),
    }

    match tool_name {
        Some(tool) if tool.is_empty() => violations.push("Tool name cannot be empty".to_string()),
        Some(_) => {}
        None => violations.push("Tool name is required".to_string()),
    }

    match coordination {
        Some(coordination) => check_coordination(coordination, target, &mut violations),
        None => violations.push("Coordination mode is required".to_string()),
    }

    if parameters.is_some_and(|params| !params.is_object()) {
        violations.push("Parameters must be a JSON object".to_string());
    }

    if ttl.is_some_and(|ttl| ttl.is_zero()) {
        violations.push("ttl must be positive".to_string());
    }

    violations
}

/// Violations of an already-built message
pub fn message_violations(message: &A2AMessage) -> Vec<String> {
    let mut violations = collect_violations(
        Some(&message.target),
        Some(&message.tool_name),
        Some(&message.coordination),
        message.parameters.as_ref(),
        message.ttl,
    );
    if message.id.trim().is_empty() {
        violations.insert(0, "Message id cannot be empty".to_string());
    }
    violations
}

fn check_target(target: &AgentTarget, path: &str, violations: &mut Vec<String>) {
    match target {
        AgentTarget::Single { agent_id } => {
            if agent_id.trim().is_empty() {
                violations.push(format!("{path}: single target requires an agent id"));
            }
        }
        AgentTarget::Multiple { agent_ids, .. } => {
            if agent_ids.is_empty() {
                violations.push(format!("{path}: multiple target must list at least one agent"));
            }
            if agent_ids.iter().any(|id| id.trim().is_empty()) {
                violations.push(format!("{path}: agent ids cannot be empty"));
            }
        }
        AgentTarget::Group {
            role, max_agents, ..
        } => {
            if role.is_unset() {
                violations.push(format!("{path}: group target requires a role"));
            }
            if *max_agents == Some(0) {
                violations.push(format!("{path}: max_agents must be at least 1"));
            }
        }
        AgentTarget::Broadcast { .. } => {}
        AgentTarget::Conditional { fallback, .. } => {
            if let Some(fallback) = fallback {
                if matches!(**fallback, AgentTarget::Conditional { .. }) {
                    violations.push(format!("{path}: fallback cannot be another conditional target"));
                }
                check_target(fallback, &format!("{path}.fallback"), violations);
            }
        }
    }
}

/// Upper bound on how many agents a target can resolve to, when static
fn static_capacity(target: &AgentTarget) -> Option<usize> {
    match target {
        AgentTarget::Single { .. } => Some(1),
        AgentTarget::Multiple { agent_ids, .. } => {
            Some(agent_ids.iter().collect::<HashSet<_>>().len())
        }
        AgentTarget::Group { max_agents, .. } => *max_agents,
        _ => None,
    }
}

fn check_coordination(
    coordination: &CoordinationMode,
    target: Option<&AgentTarget>,
    violations: &mut Vec<String>,
) {
    match coordination {
        CoordinationMode::Consensus {
            minimum_participants: Some(minimum),
            ..
        } => {
            if *minimum == 0 {
                violations.push("consensus: minimum_participants must be at least 1".to_string());
            }
            if let Some(capacity) = target.and_then(static_capacity) {
                if *minimum > capacity {
                    violations.push(format!(
                        "consensus: minimum_participants ({minimum}) exceeds the {capacity} agent(s) the target can reach"
                    ));
                }
            }
        }
        CoordinationMode::Pipeline { stages, .. } => {
            if stages.is_empty() {
                violations.push("pipeline: at least one stage is required".to_string());
            }
            for (index, stage) in stages.iter().enumerate() {
                let name = stage.display_name(index);
                if let Some(target) = &stage.agent_target {
                    check_target(target, &format!("pipeline stage '{name}'"), violations);
                }
                if stage.tool_name.as_ref().is_some_and(ToolName::is_empty) {
                    violations.push(format!("pipeline stage '{name}': tool name cannot be empty"));
                }
                if stage.parameters.as_ref().is_some_and(|p| !p.is_object()) {
                    violations.push(format!(
                        "pipeline stage '{name}': parameters must be a JSON object"
                    ));
                }
            }
        }
        _ => {}
    }
}

/// Layer that rejects structurally invalid messages before dispatch
#[derive(Clone, Debug, Default)]
pub struct A2AValidationLayer;

impl A2AValidationLayer {
    /// Create a new validation layer
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for A2AValidationLayer {
    type Service = A2AValidationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        A2AValidationService { inner }
    }
}

/// Validation service that wraps an inner service
#[derive(Clone, Debug)]
pub struct A2AValidationService<S> {
    inner: S,
}

impl<S> A2AValidationService<S> {
    /// Validate an A2A request
    fn validate_request(req: &A2ARequest) -> Result<(), A2AError> {
        let violations = message_violations(&req.message);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(A2AError::Validation(violations))
        }
    }

    /// Validate an A2A response
    fn validate_response(resp: &A2AResponse) -> Result<(), A2AError> {
        if resp.message_id.is_empty() {
            return Err(A2AError::Protocol("response has no message id".into()));
        }
        if resp.success == resp.error.is_some() {
            return Err(A2AError::Protocol(format!(
                "response {} must carry an error exactly when it failed",
                resp.message_id
            )));
        }
        Ok(())
    }
}

impl<S> Service<A2ARequest> for A2AValidationService<S>
where
    S: Service<A2ARequest, Response = A2AResponse, Error = A2AError> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = A2AResponse;
    type Error = A2AError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: A2ARequest) -> Self::Future {
        // Validate request before passing to inner service
        if let Err(e) = Self::validate_request(&req) {
            tracing::debug!(message_id = %req.message.id, "rejected invalid message: {}", e);
            return Box::pin(async move { Err(e) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await?;

            Self::validate_response(&response)?;

            Ok(response)
        })
    }
}
