//! Retry controller
//!
//! Wraps one full logical send (resolution, dispatch and aggregation) and
//! repeats it with backoff while the failure is classified as retryable.

use std::{
    collections::HashSet,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    protocol::{
        error::{A2AError, A2AResult},
        response::A2AResponse,
        time,
    },
    service::A2ARequest,
};

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base_delay * (attempt + 1)`
    Linear,
    /// `base_delay * 2^attempt`
    #[default]
    Exponential,
    /// Explicit schedule from `custom_delays`
    Custom,
}

/// How failed sends are retried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    pub backoff_strategy: BackoffStrategy,

    #[serde(with = "time::secs")]
    pub base_delay: Duration,

    /// Upper bound on any computed delay
    #[serde(with = "time::secs")]
    pub max_delay: Duration,

    /// Error codes worth another attempt
    pub retryable_errors: HashSet<String>,

    /// Schedule for [`BackoffStrategy::Custom`]; the last entry repeats
    #[serde(with = "time::vec_secs", skip_serializing_if = "Vec::is_empty")]
    pub custom_delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retryable_errors: ["NETWORK_TIMEOUT", "CONNECTION_FAILED"]
                .into_iter()
                .map(String::from)
                .collect(),
            custom_delays: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, strategy: BackoffStrategy, base_delay: Duration) -> Self {
        self.backoff_strategy = strategy;
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Switch to the custom strategy with an explicit schedule
    pub fn with_custom_delays(mut self, delays: Vec<Duration>) -> Self {
        self.backoff_strategy = BackoffStrategy::Custom;
        self.custom_delays = delays;
        self
    }

    pub fn with_retryable_error(mut self, code: impl Into<String>) -> Self {
        self.retryable_errors.insert(code.into());
        self
    }

    /// Delay to wait after failed attempt number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let linear = || self.base_delay.saturating_mul(attempt.saturating_add(1));

        let delay = match self.backoff_strategy {
            BackoffStrategy::Linear => linear(),
            BackoffStrategy::Exponential => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Custom => match self.custom_delays.last() {
                Some(last) => *self
                    .custom_delays
                    .get(attempt as usize)
                    .unwrap_or(last),
                None => linear(),
            },
        };

        delay.min(self.max_delay)
    }

    /// Whether `error` is worth another attempt under this policy
    pub fn is_retryable(&self, error: &A2AError) -> bool {
        self.retryable_errors.contains(error.code())
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retries are used up
    ///
    /// `operation` receives the 0-based attempt number. The error of the last
    /// attempt is returned unchanged.
    pub async fn retry<T, F, Fut>(&self, mut operation: F) -> A2AResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = A2AResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && self.is_retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        ?delay,
                        code = e.code(),
                        "attempt failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 0 {
                        tracing::debug!(attempts = attempt + 1, "giving up: {}", e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Layer applying a [`RetryPolicy`] around each request
///
/// A policy attached to the message wins over the layer's default.
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    default_policy: RetryPolicy,
}

impl RetryLayer {
    pub fn new(default_policy: RetryPolicy) -> Self {
        Self { default_policy }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            default_policy: self.default_policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    default_policy: RetryPolicy,
}

impl<S> Service<A2ARequest> for RetryService<S>
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
        let inner = self.inner.clone();
        let policy = req
            .message
            .retry_policy
            .clone()
            .unwrap_or_else(|| self.default_policy.clone());

        Box::pin(async move {
            policy
                .retry(move |attempt| {
                    let inner = inner.clone();
                    let req = req.clone();
                    async move {
                        if req.message.is_expired(Utc::now()) {
                            return Err(A2AError::Expired {
                                message_id: req.message.id,
                            });
                        }
                        if attempt > 0 {
                            tracing::debug!(message_id = %req.message.id, attempt, "re-sending message");
                        }
                        inner.oneshot(req).await
                    }
                })
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use serde_json::json;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::protocol::{
        agent::AgentIdentifier, coordination::CoordinationMode, message::A2AMessage,
        message::tools, target::AgentTarget,
    };

    fn timeout_error() -> A2AError {
        A2AError::Timeout {
            message_id: "m1".into(),
            after: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_exponential_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..6).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30]);
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_linear_and_custom_schedules() {
        let linear = RetryPolicy::default()
            .with_backoff(BackoffStrategy::Linear, Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(1));
        assert_eq!(linear.delay_for(0), Duration::from_millis(500));
        assert_eq!(linear.delay_for(1), Duration::from_secs(1));
        assert_eq!(linear.delay_for(5), Duration::from_secs(1));

        let custom = RetryPolicy::default()
            .with_custom_delays(vec![Duration::from_millis(100), Duration::from_secs(3)]);
        assert_eq!(custom.delay_for(0), Duration::from_millis(100));
        assert_eq!(custom.delay_for(1), Duration::from_secs(3));
        assert_eq!(custom.delay_for(7), Duration::from_secs(3));

        let empty = RetryPolicy::default().with_custom_delays(vec![]);
        assert_eq!(empty.delay_for(2), Duration::from_secs(3));
    }

    #[test]
    fn test_policy_serde_uses_seconds() {
        let policy: RetryPolicy = serde_json::from_value(json!({
            "max_retries": 5,
            "backoff_strategy": "linear",
            "base_delay": 0.25
        }))
        .unwrap();

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert!(policy.retryable_errors.contains("NETWORK_TIMEOUT"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backs_off_then_propagates_original_error() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let attempts = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result: A2AResult<()> = policy
            .retry(|attempt| {
                let attempts = attempts.clone();
                async move {
                    attempts.lock().unwrap().push((attempt, start.elapsed().as_secs()));
                    Err(timeout_error())
                }
            })
            .await;

        let err = assert_err!(result);
        assert!(matches!(err, A2AError::Timeout { ref message_id, .. } if message_id == "m1"));
        // Attempts at t=0, then after 1, 2 and 4 seconds of backoff
        assert_eq!(
            *attempts.lock().unwrap(),
            vec![(0, 0), (1, 1), (2, 3), (3, 7)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_not_repeated() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: A2AResult<()> = policy
            .retry(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(A2AError::Validation(vec!["bad".into()])) }
            })
            .await;

        assert!(matches!(result, Err(A2AError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let policy = RetryPolicy::default();
        let result = policy
            .retry(|attempt| async move {
                if attempt < 2 {
                    Err(A2AError::Connection("refused".into()))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(assert_ok!(result), 2);
    }

    fn message() -> A2AMessage {
        A2AMessage::builder()
            .target(AgentTarget::single("agent-1"))
            .tool(tools::SWARM_STATUS)
            .coordination(CoordinationMode::direct())
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_prefers_message_policy() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let inner = tower::service_fn(move |_req: A2ARequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<A2AResponse, _>(A2AError::Connection("down".into())) }
        });
        let service = RetryLayer::new(RetryPolicy::default()).layer(inner);

        let mut message = message();
        message.retry_policy = Some(RetryPolicy::default().with_max_retries(1));

        let result = service.oneshot(A2ARequest::from(message)).await;
        assert!(matches!(result, Err(A2AError::Connection(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_message_is_not_sent() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let inner = tower::service_fn(move |req: A2ARequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, A2AError>(A2AResponse::success(
                    req.message.id,
                    AgentIdentifier::new("agent-1"),
                    json!({}),
                ))
            }
        });
        let service = RetryLayer::default().layer(inner);

        let mut message = message();
        message.ttl = Some(Duration::from_secs(1));
        message.timestamp = Utc::now() - chrono::Duration::seconds(5);

        let result = service.oneshot(A2ARequest::from(message)).await;
        assert!(matches!(result, Err(A2AError::Expired { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
