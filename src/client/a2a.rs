//! The client session: channel lifecycle plus the Tower stack messages go through

use std::sync::Arc;

use futures::FutureExt;
use tower::ServiceExt;

use crate::{
    client::{
        builder::stream_headers,
        config::ClientConfig,
        tls::TlsMaterial,
    },
    coordination::Coordinator,
    directory::AgentDirectory,
    layer::{A2AValidationService, RetryService},
    protocol::{
        error::A2AResult,
        message::A2AMessage,
        response::A2AResponse,
    },
    service::{A2AProtocolService, A2ARequest, RequestContext},
    transport::{
        manager::StreamConnect, websocket::stream_url, ChannelKind, Transport, TransportManager,
        WebSocketTransport,
    },
};

/// Validation, then retry, then coordination
pub type ClientStack = A2AValidationService<RetryService<A2AProtocolService>>;

/// High-level A2A client
///
/// Every instance owns its own channels and pending table; nothing is shared
/// between clients. Call [`connect`](Self::connect) before sending.
///
/// # Example
///
/// ```rust,no_run
/// use tower_a2a_swarm::prelude::*;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), A2AError> {
/// let client = A2AClientBuilder::new("https://swarm.example.com".parse().unwrap()).build()?;
/// client.connect().await?;
///
/// let message = A2AMessage::builder()
///     .target(AgentTarget::single("agent-1"))
///     .tool(tools::SWARM_STATUS)
///     .coordination(CoordinationMode::direct())
///     .parameters(json!({}))
///     .build()?;
/// let response = client.send(message).await?;
/// println!("{:?}", response.result);
///
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct A2AClient {
    config: ClientConfig,
    service: ClientStack,
    coordinator: Arc<Coordinator>,
    transport: Arc<TransportManager>,
    unary: Arc<dyn Transport>,
    stream: Option<Arc<dyn Transport>>,
    tls: Option<TlsMaterial>,
}

impl A2AClient {
    pub(crate) fn new(
        config: ClientConfig,
        service: ClientStack,
        coordinator: Arc<Coordinator>,
        transport: Arc<TransportManager>,
        unary: Arc<dyn Transport>,
        stream: Option<Arc<dyn Transport>>,
        tls: Option<TlsMaterial>,
    ) -> Self {
        Self {
            config,
            service,
            coordinator,
            transport,
            unary,
            stream,
            tls,
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Directory view targets are resolved against
    pub fn directory(&self) -> &Arc<dyn AgentDirectory> {
        self.coordinator.directory()
    }

    /// Establish the unary channel, then try to upgrade to the stream
    ///
    /// # Errors
    ///
    /// `Connection` when the unary channel is unusable. A failed stream
    /// upgrade only leaves the session unary-only.
    pub async fn connect(&self) -> A2AResult<()> {
        let stream: Option<StreamConnect<'_>> = match (&self.stream, self.config.websocket_enabled) {
            (_, false) => None,
            (Some(channel), true) => {
                let channel = channel.clone();
                Some(async move { Ok(channel) }.boxed())
            }
            (None, true) => Some(self.open_stream().boxed()),
        };

        self.transport.connect(self.unary.clone(), stream).await?;
        tracing::info!(
            base_url = %self.config.base_url,
            channel = ?self.transport.active_channel().await,
            "connected"
        );
        Ok(())
    }

    async fn open_stream(&self) -> A2AResult<Arc<dyn Transport>> {
        let url = stream_url(&self.config.base_url)?;
        let tls = self
            .tls
            .as_ref()
            .map(TlsMaterial::stream_connector)
            .transpose()?;
        let headers = stream_headers(&self.config);

        let channel = WebSocketTransport::connect(url, &headers, tls).await?;
        Ok(Arc::new(channel))
    }

    /// Close both channels; callers still waiting on the stream get `Cancelled`
    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Channel the next message would travel on
    pub async fn active_channel(&self) -> Option<ChannelKind> {
        self.transport.active_channel().await
    }

    /// Validate, coordinate and retry one message
    ///
    /// # Errors
    ///
    /// `Validation` before anything is sent; otherwise whatever the
    /// coordination mode produced once retries are exhausted.
    pub async fn send(&self, message: A2AMessage) -> A2AResult<A2AResponse> {
        self.send_with_context(message, RequestContext::default())
            .await
    }

    /// [`send`](Self::send) with an explicit per-call context
    pub async fn send_with_context(
        &self,
        message: A2AMessage,
        context: RequestContext,
    ) -> A2AResult<A2AResponse> {
        tracing::debug!(
            message_id = %message.id,
            tool = %message.tool_name,
            mode = message.coordination.kind(),
            "sending"
        );
        self.service
            .clone()
            .oneshot(A2ARequest::new(message, context))
            .await
    }
}

impl std::fmt::Debug for A2AClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2AClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::{
        client::A2AClientBuilder,
        coordination::testing::{agents, echo},
        directory::InMemoryDirectory,
        layer::retry::RetryPolicy,
        protocol::{
            coordination::CoordinationMode, error::A2AError, message::tools,
            target::AgentTarget,
        },
        transport::mock::MockTransport,
    };

    fn client(unary: MockTransport, stream: Option<MockTransport>, websocket: bool) -> A2AClient {
        let mut builder = A2AClientBuilder::new("http://127.0.0.1:1".parse().unwrap())
            .with_websocket(websocket)
            .with_retry_policy(RetryPolicy::none())
            .with_directory(Arc::new(InMemoryDirectory::new(agents(&["a1", "a2"]))))
            .with_unary_transport(Arc::new(unary));
        if let Some(stream) = stream {
            builder = builder.with_stream_transport(Arc::new(stream.streaming()));
        }
        builder.build().unwrap()
    }

    fn status(target: AgentTarget) -> A2AMessage {
        A2AMessage::builder()
            .target(target)
            .tool(tools::SWARM_STATUS)
            .coordination(CoordinationMode::direct())
            .parameters(json!({}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_stream_preferred_when_available() {
        let unary = echo();
        let stream = echo();
        let (unary_probe, stream_probe) = (unary.clone(), stream.clone());
        let client = client(unary, Some(stream), true);

        assert_ok!(client.connect().await);
        assert_eq!(client.active_channel().await, Some(ChannelKind::Stream));

        let response = assert_ok!(client.send(status(AgentTarget::single("a1"))).await);
        assert_eq!(response.result, Some(json!({"agent": "a1"})));
        assert_eq!(stream_probe.call_count(), 1);
        assert_eq!(unary_probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_websocket_disabled_stays_unary() {
        let client = client(echo(), Some(echo()), false);

        assert_ok!(client.connect().await);
        assert_eq!(client.active_channel().await, Some(ChannelKind::Unary));
    }

    #[tokio::test]
    async fn test_failed_upgrade_falls_back_to_unary() {
        // Nothing listens on port 1, so the WebSocket upgrade is refused
        let client = client(echo(), None, true);

        assert_ok!(client.connect().await);
        assert!(client.is_connected().await);
        assert_eq!(client.active_channel().await, Some(ChannelKind::Unary));
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let client = client(echo(), None, false);

        let err = assert_err!(client.send(status(AgentTarget::single("a1"))).await);
        assert!(matches!(err, A2AError::Connection(_)));
    }

    #[tokio::test]
    async fn test_disconnect_closes_session() {
        let client = client(echo(), Some(echo()), true);
        assert_ok!(client.connect().await);

        client.disconnect().await;
        assert!(!client.is_connected().await);
        assert_eq!(client.active_channel().await, None);
    }

    #[tokio::test]
    async fn test_unknown_target_is_reported() {
        let client = client(echo(), None, false);
        assert_ok!(client.connect().await);

        let err = assert_err!(
            client
                .send_with_context(
                    status(AgentTarget::single("ghost")),
                    RequestContext::new().with_timeout(Duration::from_secs(1)),
                )
                .await
        );
        assert!(matches!(err, A2AError::TargetNotFound { .. }));
    }
}
