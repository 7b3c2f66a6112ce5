use std::{collections::HashMap, time::Duration};

use futures::StreamExt;
use serde_json::Value;

use super::{
    aggregate, decisive, settle, Coordinator, PipelineSummary, StageOutcome, StageStatus,
};
use crate::{
    protocol::{
        coordination::{CoordinationMode, FailureStrategy, PipelineStage},
        error::{A2AError, A2AResult},
        message::{A2AMessage, StagePassthrough},
        response::A2AResponse,
        target::{AgentTarget, MultiTargetMode},
    },
    service::RequestContext,
};

impl Coordinator {
    /// Run `stages` strictly in order
    ///
    /// Each stage resolves its own target against a fresh snapshot. With
    /// `state_passthrough` the most recent non-null stage output travels with
    /// the next stage's message.
    pub(super) async fn pipeline(
        &self,
        message: &A2AMessage,
        context: &RequestContext,
        stages: &[PipelineStage],
        failure_strategy: FailureStrategy,
        state_passthrough: bool,
    ) -> A2AResult<A2AResponse> {
        let mut outcomes = Vec::with_capacity(stages.len());
        let mut carried: Option<StagePassthrough> = None;
        let mut output = Value::Null;

        for (index, stage) in stages.iter().enumerate() {
            let name = stage.display_name(index);
            let passthrough = if state_passthrough {
                carried.clone()
            } else {
                None
            };
            let stage_message = stage_message(message, stage, &name, passthrough);
            let timeout = self.dispatch_timeout(stage.timeout, message, context);
            tracing::debug!(stage = %name, index, "running pipeline stage");

            let mut attempts = 0u32;
            let result = match failure_strategy {
                FailureStrategy::Retry => {
                    let policy = message
                        .retry_policy
                        .as_ref()
                        .unwrap_or(&self.retry_policy);
                    policy
                        .retry(|_| {
                            attempts += 1;
                            self.run_stage(&stage_message, timeout)
                        })
                        .await
                }
                FailureStrategy::Abort | FailureStrategy::Skip => {
                    attempts = 1;
                    self.run_stage(&stage_message, timeout).await
                }
            };

            match result {
                Ok((agents, stage_output)) => {
                    if !stage_output.is_null() {
                        carried = Some(StagePassthrough {
                            previous_stage: name.clone(),
                            output: stage_output.clone(),
                            output_transform: stage.output_transform.clone(),
                            input_transform: None,
                        });
                        output = stage_output.clone();
                    }
                    outcomes.push(StageOutcome {
                        name,
                        index,
                        status: StageStatus::Completed,
                        agents,
                        output: stage_output,
                        attempts,
                        error: None,
                    });
                }
                Err(e) if failure_strategy == FailureStrategy::Skip => {
                    tracing::warn!(stage = %name, index, "skipping failed stage: {}", e);
                    outcomes.push(StageOutcome {
                        name,
                        index,
                        status: StageStatus::Skipped,
                        agents: Vec::new(),
                        output: Value::Null,
                        attempts,
                        error: Some(e.to_client_error()),
                    });
                }
                Err(e) => {
                    tracing::warn!(stage = %name, index, attempts, "aborting pipeline: {}", e);
                    return Err(A2AError::PipelineStage {
                        stage: name,
                        index,
                        source: Box::new(e),
                    });
                }
            }
        }

        aggregate(
            message,
            &PipelineSummary {
                stages: outcomes,
                output,
            },
        )
    }

    /// Resolve and dispatch one stage, returning the agents and the output
    ///
    /// One agent yields its result as is; several yield an array in resolved
    /// order, as does any `multiple` target.
    async fn run_stage(
        &self,
        stage_message: &A2AMessage,
        timeout: Duration,
    ) -> A2AResult<(Vec<String>, Value)> {
        let agents = self.resolve(&stage_message.target, stage_message).await?;
        if agents.is_empty() {
            tracing::debug!(stage = %stage_message.id, "stage target resolved to no agents");
            return Ok((agents, Value::Null));
        }

        let mode = match &stage_message.target {
            AgentTarget::Multiple {
                coordination_mode, ..
            } => Some(*coordination_mode),
            _ => None,
        };

        let output = match mode {
            Some(MultiTargetMode::Sequential) => {
                let mut results = Vec::with_capacity(agents.len());
                for agent_id in &agents {
                    let dispatch_id = format!("{}#{}", stage_message.id, agent_id);
                    let response = self
                        .exchange(stage_message, agent_id, dispatch_id, timeout)
                        .await
                        .and_then(|response| settle(agent_id, response))?;
                    results.push(response.result.unwrap_or(Value::Null));
                }
                Value::Array(results)
            }
            Some(MultiTargetMode::Race) => self.race(stage_message, &agents, timeout).await?,
            Some(MultiTargetMode::Parallel) | None => {
                let mut in_flight = self.fan_out(stage_message, &stage_message.id, &agents, timeout);
                let mut results: HashMap<String, Value> = HashMap::with_capacity(agents.len());
                while let Some((agent_id, result)) = in_flight.next().await {
                    let response = result.and_then(|response| settle(&agent_id, response))?;
                    results.insert(agent_id, response.result.unwrap_or(Value::Null));
                }

                let mut ordered: Vec<Value> = agents
                    .iter()
                    .map(|agent_id| results.remove(agent_id).unwrap_or(Value::Null))
                    .collect();
                if mode.is_none() && ordered.len() == 1 {
                    ordered.pop().unwrap_or(Value::Null)
                } else {
                    Value::Array(ordered)
                }
            }
        };

        Ok((agents, output))
    }

    /// First successful result among `agents`
    async fn race(
        &self,
        stage_message: &A2AMessage,
        agents: &[String],
        timeout: Duration,
    ) -> A2AResult<Value> {
        let mut in_flight = self.fan_out(stage_message, &stage_message.id, agents, timeout);
        let mut failures = Vec::new();
        while let Some((agent_id, result)) = in_flight.next().await {
            match result.and_then(|response| settle(&agent_id, response)) {
                Ok(response) => {
                    tracing::debug!(agent_id = %agent_id, "race won");
                    return Ok(response.result.unwrap_or(Value::Null));
                }
                Err(e) => failures.push((agent_id, e)),
            }
        }
        Err(decisive(failures).unwrap_or_else(|| {
            A2AError::Protocol(format!("race in {} produced no result", stage_message.id))
        }))
    }
}

/// The message one stage sends
///
/// Unset stage fields fall back to the pipeline message. The stage id is
/// `<pipeline id>#<stage name>`; the correlation id stays the pipeline's so
/// every dispatch links back to the caller's conversation.
fn stage_message(
    message: &A2AMessage,
    stage: &PipelineStage,
    name: &str,
    passthrough: Option<StagePassthrough>,
) -> A2AMessage {
    let mut stage_message = message.clone();
    stage_message.id = format!("{}#{}", message.id, name);
    stage_message.coordination = CoordinationMode::direct();
    if let Some(target) = &stage.agent_target {
        stage_message.target = target.clone();
    }
    if let Some(tool_name) = &stage.tool_name {
        stage_message.tool_name = tool_name.clone();
    }
    if let Some(parameters) = &stage.parameters {
        stage_message.parameters = Some(parameters.clone());
    }
    stage_message.passthrough = passthrough.map(|carried| StagePassthrough {
        input_transform: stage.input_transform.clone(),
        ..carried
    });
    stage_message
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::super::testing::*;
    use super::*;
    use crate::{
        layer::retry::RetryPolicy,
        protocol::{agent::AgentRole, message::tools},
        transport::mock::MockTransport,
    };

    fn pipeline(stages: Vec<PipelineStage>, strategy: FailureStrategy) -> A2AMessage {
        A2AMessage::builder()
            .target(AgentTarget::single("a1"))
            .tool(tools::TASK_ORCHESTRATE)
            .coordination(CoordinationMode::pipeline(stages, strategy, true))
            .parameters(json!({"task": "ship"}))
            .build()
            .unwrap()
    }

    fn three_stages() -> Vec<PipelineStage> {
        vec![
            PipelineStage::new("fetch")
                .target(AgentTarget::single("a1"))
                .output_transform("to_rows"),
            PipelineStage::new("analyze")
                .target(AgentTarget::single("a2"))
                .tool(tools::NEURAL_TRAIN),
            PipelineStage::new("report")
                .target(AgentTarget::single("a3"))
                .input_transform("summarize"),
        ]
    }

    /// a2 fails; everyone else echoes the passthrough it received
    fn stage_agents(seen: Arc<Mutex<Vec<A2AMessage>>>) -> MockTransport {
        MockTransport::responder(move |message: A2AMessage| {
            seen.lock().unwrap().push(message.clone());
            async move {
                let agent = recipient(&message);
                if agent == "a2" {
                    return Ok(failed(&message, "TOOL_FAILED", false));
                }
                let from = message
                    .passthrough
                    .as_ref()
                    .map(|p| p.previous_stage.clone());
                Ok(ok(&message, json!({ "agent": agent, "from": from })))
            }
        })
    }

    fn summary(response: &A2AResponse) -> PipelineSummary {
        serde_json::from_value(response.result.clone().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_skip_records_null_and_continues() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let coordinator =
            coordinator(stage_agents(seen.clone()), agents(&["a1", "a2", "a3"])).await;
        let message = pipeline(three_stages(), FailureStrategy::Skip);

        let response = coordinator
            .execute(&message, &RequestContext::default())
            .await
            .unwrap();
        let summary = summary(&response);

        assert_eq!(summary.stages.len(), 3);
        let analyze = summary.stage("analyze").unwrap();
        assert_eq!(analyze.status, StageStatus::Skipped);
        assert_eq!(analyze.output, Value::Null);
        assert_eq!(analyze.error.as_ref().unwrap().code, "TOOL_FAILED");

        let report = summary.stage("report").unwrap();
        assert_eq!(report.status, StageStatus::Completed);
        assert_eq!(report.output, json!({"agent": "a3", "from": "fetch"}));
        assert_eq!(summary.output, report.output);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].id, format!("{}#fetch#a1", message.id));
        assert_eq!(seen[1].tool_name.as_str(), tools::NEURAL_TRAIN);
        let carried = seen[2].passthrough.as_ref().unwrap();
        assert_eq!(carried.output_transform.as_deref(), Some("to_rows"));
        assert_eq!(carried.input_transform.as_deref(), Some("summarize"));
        assert_eq!(seen[2].conversation_id.as_deref(), Some(message.correlation_id.as_str()));
    }

    #[tokio::test]
    async fn test_abort_anchors_error_to_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let coordinator =
            coordinator(stage_agents(seen.clone()), agents(&["a1", "a2", "a3"])).await;

        let err = coordinator
            .execute(
                &pipeline(three_stages(), FailureStrategy::Abort),
                &RequestContext::default(),
            )
            .await
            .unwrap_err();

        match err {
            A2AError::PipelineStage { stage, index, source } => {
                assert_eq!(stage, "analyze");
                assert_eq!(index, 1);
                assert_eq!(source.code(), "TOOL_FAILED");
            }
            other => panic!("Expected pipeline stage error, got {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_repeats_stage_under_message_policy() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let transport = MockTransport::responder(move |message: A2AMessage| {
            let call = {
                let mut calls = counter.lock().unwrap();
                *calls += 1;
                *calls
            };
            async move {
                if call < 3 {
                    Err(A2AError::Connection("flaky".into()))
                } else {
                    Ok(ok(&message, json!("done")))
                }
            }
        });
        let coordinator = coordinator(transport, agents(&["a1"])).await;

        let mut message = pipeline(
            vec![PipelineStage::new("only").target(AgentTarget::single("a1"))],
            FailureStrategy::Retry,
        );
        message.retry_policy = Some(RetryPolicy::default().with_max_retries(2));

        let response = coordinator
            .execute(&message, &RequestContext::default())
            .await
            .unwrap();
        let summary = summary(&response);
        assert_eq!(summary.stages[0].attempts, 3);
        assert_eq!(summary.output, json!("done"));
    }

    #[tokio::test]
    async fn test_multiple_targets_collect_in_order() {
        let coordinator = coordinator(echo(), agents(&["a1", "a2", "a3"])).await;
        let stages = vec![
            PipelineStage::new("parallel")
                .target(AgentTarget::multiple(["a3", "a1"], MultiTargetMode::Parallel)),
            PipelineStage::new("sequential")
                .target(AgentTarget::multiple(["a2"], MultiTargetMode::Sequential)),
            PipelineStage::new("group").target(AgentTarget::group(AgentRole::Analyst)),
        ];

        let response = coordinator
            .execute(
                &pipeline(stages, FailureStrategy::Abort),
                &RequestContext::default(),
            )
            .await
            .unwrap();
        let summary = summary(&response);

        assert_eq!(
            summary.stages[0].output,
            json!([{"agent": "a3"}, {"agent": "a1"}])
        );
        assert_eq!(summary.stages[1].output, json!([{"agent": "a2"}]));
        assert_eq!(summary.stages[2].agents.len(), 3);
        assert!(summary.stages[2].output.is_array());
    }

    #[tokio::test]
    async fn test_race_takes_first_success() {
        let transport = MockTransport::responder(|message: A2AMessage| async move {
            if recipient(&message) == "a1" {
                Ok(failed(&message, "TOOL_FAILED", true))
            } else {
                Ok(ok(&message, json!("winner")))
            }
        });
        let coordinator = coordinator(transport, agents(&["a1", "a2"])).await;
        let stages = vec![PipelineStage::new("race")
            .target(AgentTarget::multiple(["a1", "a2"], MultiTargetMode::Race))];

        let response = coordinator
            .execute(
                &pipeline(stages, FailureStrategy::Abort),
                &RequestContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(summary(&response).output, json!("winner"));
    }
}
