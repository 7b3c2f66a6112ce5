//! Channel ownership and dispatch policy
//!
//! The manager holds a required unary channel and an optional stream channel.
//! Messages go over the stream while it is open and over the unary channel
//! otherwise.

use std::{fmt, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    codec::Codec,
    protocol::{
        error::{A2AError, A2AResult, ClientError},
        message::A2AMessage,
        response::A2AResponse,
    },
    transport::{Transport, TransportRequest, TransportResponse, MESSAGE_ENDPOINT, STREAM_ENDPOINT},
};

/// Which channel carried (or would carry) a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Stream,
    Unary,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Stream => f.write_str("stream"),
            ChannelKind::Unary => f.write_str("unary"),
        }
    }
}

/// Pending stream connection attempt handed to [`TransportManager::connect`]
pub type StreamConnect<'a> = BoxFuture<'a, A2AResult<Arc<dyn Transport>>>;

/// Owns both channels of a client session
pub struct TransportManager {
    unary: RwLock<Option<Arc<dyn Transport>>>,
    stream: RwLock<Option<Arc<dyn Transport>>>,
    codec: Arc<dyn Codec>,
    default_timeout: Duration,
    log_requests: bool,
    log_responses: bool,
}

impl TransportManager {
    pub fn new(codec: Arc<dyn Codec>, default_timeout: Duration) -> Self {
        Self {
            unary: RwLock::new(None),
            stream: RwLock::new(None),
            codec,
            default_timeout,
            log_requests: false,
            log_responses: false,
        }
    }

    /// Log serialized request and response bodies at debug level
    pub fn with_body_logging(mut self, requests: bool, responses: bool) -> Self {
        self.log_requests = requests;
        self.log_responses = responses;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Install the unary channel, then try the stream channel
    ///
    /// A failed stream attempt is logged and the session stays unary-only.
    /// Connecting a session that is already connected keeps its channels and
    /// leaves `stream` unpolled; call [`disconnect`](Self::disconnect) first
    /// to replace them.
    ///
    /// # Errors
    ///
    /// `Connection` if the unary channel is not usable.
    pub async fn connect(
        &self,
        unary: Arc<dyn Transport>,
        stream: Option<StreamConnect<'_>>,
    ) -> A2AResult<()> {
        if self.is_connected().await {
            tracing::debug!("already connected, keeping existing channels");
            return Ok(());
        }
        if !unary.is_open() {
            return Err(A2AError::Connection(format!(
                "unary channel to {} is not available",
                unary.base_url()
            )));
        }
        tracing::debug!(url = %unary.base_url(), "unary channel ready");
        *self.unary.write().await = Some(unary);

        if let Some(stream) = stream {
            match stream.await {
                Ok(channel) => {
                    tracing::info!(url = %channel.base_url(), "stream channel connected");
                    *self.stream.write().await = Some(channel);
                }
                Err(e) => {
                    tracing::warn!("stream channel unavailable, using unary only: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Whether the unary channel is installed and open
    pub async fn is_connected(&self) -> bool {
        self.unary
            .read()
            .await
            .as_ref()
            .is_some_and(|channel| channel.is_open())
    }

    /// The channel the next message would use, if any
    pub async fn active_channel(&self) -> Option<ChannelKind> {
        self.select().await.map(|(kind, _)| kind)
    }

    async fn select(&self) -> Option<(ChannelKind, Arc<dyn Transport>)> {
        if let Some(stream) = self.stream.read().await.as_ref() {
            if stream.is_open() {
                return Some((ChannelKind::Stream, stream.clone()));
            }
        }
        self.unary
            .read()
            .await
            .as_ref()
            .filter(|channel| channel.is_open())
            .map(|channel| (ChannelKind::Unary, channel.clone()))
    }

    /// Send one message addressed to a single agent
    ///
    /// The deadline is `timeout`, else the message's execution timeout, else
    /// the client default. With `expect_reply == false` a stream send returns
    /// as soon as the frame is written.
    pub async fn send(
        &self,
        message: &A2AMessage,
        timeout: Option<Duration>,
        expect_reply: bool,
    ) -> A2AResult<A2AResponse> {
        let (kind, channel) = self
            .select()
            .await
            .ok_or_else(|| A2AError::Connection("client is not connected".to_string()))?;

        let timeout = timeout
            .or_else(|| message.timeout())
            .unwrap_or(self.default_timeout);
        let body = self.codec.encode_message(message)?;

        if self.log_requests {
            tracing::debug!(channel = %kind, body = %String::from_utf8_lossy(&body), "sending message");
        }

        let endpoint = match kind {
            ChannelKind::Stream => STREAM_ENDPOINT,
            ChannelKind::Unary => MESSAGE_ENDPOINT,
        };
        let request = TransportRequest::new(endpoint, "POST")
            .header("Content-Type", self.codec.content_type())
            .message_id(message.id.clone())
            .timeout(timeout)
            .expect_reply(expect_reply || kind == ChannelKind::Unary)
            .body(body);

        tracing::trace!(channel = %kind, message_id = %message.id, ?timeout, "dispatching");
        let response = channel.execute(request).await?;

        if self.log_responses {
            tracing::debug!(
                channel = %kind,
                status = response.status,
                body = %String::from_utf8_lossy(&response.body),
                "received response"
            );
        }

        self.parse_transport_response(response, message, timeout)
    }

    fn parse_transport_response(
        &self,
        response: TransportResponse,
        message: &A2AMessage,
        timeout: Duration,
    ) -> A2AResult<A2AResponse> {
        if !response.is_success() {
            return Err(Self::handle_error_response(&response, message, timeout));
        }
        self.codec.decode_response(&response.body, message)
    }

    /// Map a non-2xx status to the error taxonomy
    fn handle_error_response(
        response: &TransportResponse,
        message: &A2AMessage,
        timeout: Duration,
    ) -> A2AError {
        let json = serde_json::from_slice::<Value>(&response.body).ok();

        // A structured error body wins over the status code
        if let Some(error) = json
            .as_ref()
            .and_then(|json| json.get("error"))
            .and_then(|error| serde_json::from_value::<ClientError>(error.clone()).ok())
        {
            return A2AError::Client(error);
        }

        let detail = json
            .as_ref()
            .and_then(|json| json.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP error: {}", response.status));

        match response.status {
            401 | 403 => A2AError::Client(
                ClientError::new("UNAUTHORIZED", detail)
                    .with_suggested_action("check the configured API key or client certificate"),
            ),
            408 | 504 => A2AError::Timeout {
                message_id: message.id.clone(),
                after: timeout,
            },
            429 => A2AError::Client(
                ClientError::new("RATE_LIMITED", detail)
                    .recoverable(true)
                    .with_suggested_action("slow down and retry"),
            ),
            502 | 503 => A2AError::Connection(format!("HTTP {}: {}", response.status, detail)),
            status => A2AError::Transport(format!("HTTP {status}: {detail}")),
        }
    }

    /// Close both channels, failing every in-flight stream request
    pub async fn disconnect(&self) {
        if let Some(stream) = self.stream.write().await.take() {
            stream.close().await;
        }
        if let Some(unary) = self.unary.write().await.take() {
            unary.close().await;
        }
        tracing::info!("transport channels closed");
    }
}

impl fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportManager")
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
