//! WebSocket transport: the persistent stream channel
//!
//! Outbound messages are written as tagged text frames. A listener task reads
//! inbound frames for the lifetime of the connection and completes pending
//! requests by correlation id, so any number of requests share one socket.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, PoisonError,
    },
};

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream, StreamExt},
    SinkExt,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue},
        protocol::Message,
    },
    Connector, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::{
    codec::{FrameCodec, InboundFrame},
    protocol::error::A2AError,
    transport::{pending::PendingRequests, Transport, TransportRequest, TransportResponse},
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// WebSocket transport for the stream channel
///
/// Created already connected; once the socket closes the transport reports
/// itself closed and never reconnects.
pub struct WebSocketTransport {
    url: Url,
    sink: Arc<Mutex<WsSink>>,
    pending: PendingRequests,
    open: Arc<AtomicBool>,
    listener: StdMutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Open the stream channel
    ///
    /// # Arguments
    ///
    /// * `url` - The WebSocket URL (e.g., "wss://a2a.example.com/ws")
    /// * `headers` - Sent with the upgrade request (API key, user agent)
    /// * `tls` - Connector carrying the client identity, default TLS when absent
    pub async fn connect(
        url: Url,
        headers: &HashMap<String, String>,
        tls: Option<native_tls::TlsConnector>,
    ) -> Result<Self, A2AError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| A2AError::Connection(format!("invalid WebSocket URL {url}: {e}")))?;

        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| A2AError::Protocol(format!("invalid header name {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| A2AError::Protocol(format!("invalid value for header {key}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (ws_stream, _) =
            connect_async_tls_with_config(request, None, false, tls.map(Connector::NativeTls))
                .await
                .map_err(|e| A2AError::Connection(format!("WebSocket connection failed: {e}")))?;

        let (sink, source) = ws_stream.split();
        let pending = PendingRequests::new();
        let open = Arc::new(AtomicBool::new(true));

        let listener = tokio::spawn(Self::listen(source, pending.clone(), open.clone()));
        tracing::debug!(%url, "stream channel open");

        Ok(Self {
            url,
            sink: Arc::new(Mutex::new(sink)),
            pending,
            open,
            listener: StdMutex::new(Some(listener)),
        })
    }

    /// Inbound listener: completes pending requests until the socket closes
    async fn listen(mut source: WsSource, pending: PendingRequests, open: Arc<AtomicBool>) {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => match FrameCodec::decode_inbound(&text) {
                    Ok(InboundFrame::Response { key, payload }) => {
                        if !pending.fulfill(&key, Ok(payload)) {
                            tracing::debug!(correlation_id = %key, "response for unknown or expired request");
                        }
                    }
                    Ok(InboundFrame::Other { kind }) => {
                        tracing::trace!(%kind, "ignoring inbound frame");
                    }
                    Err(e) => tracing::warn!("malformed inbound frame: {}", e),
                },
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::error!("WebSocket receive error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        open.store(false, Ordering::SeqCst);
        let failed = pending.fail_all(|| A2AError::Connection("stream channel closed".to_string()));
        tracing::info!(failed, "stream channel closed");
    }

    /// Number of requests awaiting a correlated response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    async fn send_frame(&self, frame: String) -> Result<(), A2AError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| A2AError::Connection(format!("WebSocket send failed: {e}")))
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("open", &self.is_open())
            .finish()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError> {
        if !self.is_open() {
            return Err(A2AError::Connection("stream channel is closed".to_string()));
        }

        let frame = FrameCodec::encode_outbound(&request.body)?;

        if !request.expect_reply {
            self.send_frame(frame).await?;
            return Ok(TransportResponse::new(202));
        }

        // Register before sending so a fast reply cannot miss its entry
        let handle = self.pending.register(&request.message_id, request.timeout)?;
        self.send_frame(frame).await?;

        let body = handle.wait().await?;
        Ok(TransportResponse::new(200).body(body))
    }

    fn base_url(&self) -> &Url {
        &self.url
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);

        let cancelled = self
            .pending
            .fail_all(|| A2AError::Cancelled("client disconnected".to_string()));
        if cancelled > 0 {
            tracing::info!(cancelled, "cancelled in-flight stream requests");
        }

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            tracing::debug!("WebSocket close failed: {}", e);
        }
        drop(sink);

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.abort();
        }
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}

/// Derive the stream URL from the unary base URL (`http` to `ws`, `https` to `wss`)
pub fn stream_url(base_url: &Url) -> Result<Url, A2AError> {
    let scheme = match base_url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(A2AError::Connection(format!(
                "cannot derive a stream URL from scheme {other}"
            )))
        }
    };

    let rest = &base_url.as_str()[base_url.scheme().len()..];
    let joined = format!(
        "{scheme}{}{}",
        rest.trim_end_matches('/'),
        super::STREAM_ENDPOINT
    );
    Url::parse(&joined).map_err(|e| A2AError::Connection(format!("invalid stream URL: {e}")))
}
