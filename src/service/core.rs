//! Core A2A coordination service

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tower_service::Service;

use crate::{
    coordination::Coordinator,
    protocol::{error::A2AError, response::A2AResponse},
    service::A2ARequest,
};

/// Core A2A service that runs each request through the coordination engine
///
/// This service implements the Tower `Service` trait so that retry and
/// validation can be stacked on top of it as layers.
#[derive(Debug, Clone)]
pub struct A2AProtocolService {
    coordinator: Arc<Coordinator>,
}

impl A2AProtocolService {
    /// Create a new A2A protocol service
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }
}

impl Service<A2ARequest> for A2AProtocolService {
    type Response = A2AResponse;
    type Error = A2AError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Channels are checked per dispatch
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: A2ARequest) -> Self::Future {
        let coordinator = self.coordinator.clone();

        Box::pin(async move { coordinator.execute(&req.message, &req.context).await })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;
    use tower::{ServiceBuilder, ServiceExt};

    use super::*;
    use crate::{
        coordination::testing::{agents, coordinator, echo},
        layer::{A2AValidationLayer, RetryLayer, RetryPolicy},
        protocol::{
            coordination::CoordinationMode, message::tools, message::A2AMessage,
            target::AgentTarget,
        },
        transport::{mock::MockTransport, TransportResponse},
    };

    fn message() -> A2AMessage {
        A2AMessage::builder()
            .target(AgentTarget::single("a1"))
            .tool(tools::AGENT_LIST)
            .coordination(CoordinationMode::direct())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_service_executes_message() {
        let mut service = A2AProtocolService::new(Arc::new(coordinator(echo(), agents(&["a1"])).await));

        let response = service.call(A2ARequest::from(message())).await.unwrap();

        assert!(response.success);
        assert_eq!(response.result, Some(json!({"agent": "a1"})));
    }

    #[tokio::test]
    async fn test_service_error_handling() {
        let transport = MockTransport::new(|_req| {
            let error_json = r#"{"message": "Unauthorized"}"#;
            TransportResponse::new(401).body(Bytes::from(error_json))
        });
        let mut service =
            A2AProtocolService::new(Arc::new(coordinator(transport, agents(&["a1"])).await));

        let err = service.call(A2ARequest::from(message())).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_stack_rejects_invalid_message_before_dispatch() {
        let transport = echo();
        let probe = transport.clone();
        let core = A2AProtocolService::new(Arc::new(coordinator(transport, agents(&["a1"])).await));
        let stack = ServiceBuilder::new()
            .layer(A2AValidationLayer::new())
            .layer(RetryLayer::new(RetryPolicy::none()))
            .service(core);

        let mut invalid = message();
        invalid.parameters = Some(json!("not an object"));

        let err = stack.oneshot(A2ARequest::from(invalid)).await.unwrap_err();
        assert!(matches!(err, A2AError::Validation(ref v) if v.len() == 1));
        assert_eq!(probe.call_count(), 0);
    }
}
