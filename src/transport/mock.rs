use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use url::Url;

use crate::{
    protocol::{error::A2AError, message::A2AMessage, response::A2AResponse},
    transport::{Transport, TransportRequest, TransportResponse},
};

type Handler =
    Arc<dyn Fn(TransportRequest) -> BoxFuture<'static, Result<TransportResponse, A2AError>> + Send + Sync>;

/// Mock transport for internal testing
///
/// Stands in for either channel without a network connection. Handlers may
/// be plain closures or return futures (for slow or never-answering agents).
#[derive(Clone)]
pub(crate) struct MockTransport {
    handler: Handler,
    base_url: Url,
    streaming: bool,
    open: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Create a new mock transport with a synchronous request handler
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(TransportRequest) -> TransportResponse + Send + Sync + 'static,
    {
        Self::new_async(move |request| {
            let response = handler(request);
            async move { Ok(response) }
        })
    }

    /// Create a new mock transport with an asynchronous request handler
    pub fn new_async<F, Fut>(handler: F) -> Self
    where
        F: Fn(TransportRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TransportResponse, A2AError>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |request| Box::pin(handler(request))),
            base_url: Url::parse("mock://agents").unwrap(),
            streaming: false,
            open: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock that decodes each message and lets `respond` play the agent
    pub fn responder<F, Fut>(respond: F) -> Self
    where
        F: Fn(A2AMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A2AResponse, A2AError>> + Send + 'static,
    {
        let respond = Arc::new(respond);
        Self::new_async(move |request| {
            let respond = respond.clone();
            async move {
                let message: A2AMessage = serde_json::from_slice(&request.body)?;
                let response = respond(message).await?;
                let body = serde_json::to_vec(&response)?;
                Ok(TransportResponse::new(200).body(Bytes::from(body)))
            }
        })
    }

    /// Mock whose every call fails with `error()`
    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> A2AError + Send + Sync + 'static,
    {
        Self::new_async(move |_| {
            let error = error();
            async move { Err(error) }
        })
    }

    /// Report this mock as a stream channel
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Number of requests executed so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError> {
        if !self.is_open() {
            return Err(A2AError::Connection("mock channel closed".into()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(request).await
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("streaming", &self.streaming)
            .finish()
    }
}
