//! Client builder for assembling an [`A2AClient`] from its configuration

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tower::ServiceBuilder;
use url::Url;

use crate::{
    client::{
        config::{CertificateConfig, ClientConfig, LoggingConfig},
        tls::TlsMaterial,
        A2AClient,
    },
    codec::{Codec, JsonCodec},
    coordination::Coordinator,
    directory::{AgentDirectory, InMemoryDirectory},
    layer::{retry::RetryPolicy, A2AValidationLayer, RetryLayer},
    protocol::error::{A2AError, A2AResult},
    service::A2AProtocolService,
    transport::{HttpTransport, Transport, TransportManager},
};

/// Header carrying the API key on both channels
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Builder for constructing A2A clients
///
/// Channels default to HTTP for unary exchanges and a WebSocket opened on
/// [`A2AClient::connect`]; either can be replaced with a pre-built transport.
///
/// # Example
///
/// ```rust,no_run
/// use tower_a2a_swarm::prelude::*;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), A2AError> {
/// let url = "https://swarm.example.com".parse().unwrap();
/// let client = A2AClientBuilder::new(url)
///     .with_api_key("secret")
///     .with_timeout(Duration::from_secs(60))
///     .build()?;
///
/// client.connect().await?;
/// let agents = client.list_agents(None).await?;
/// println!("{:?}", agents.result);
/// # Ok(())
/// # }
/// ```
pub struct A2AClientBuilder {
    config: ClientConfig,
    directory: Option<Arc<dyn AgentDirectory>>,
    codec: Option<Arc<dyn Codec>>,
    unary: Option<Arc<dyn Transport>>,
    stream: Option<Arc<dyn Transport>>,
}

impl A2AClientBuilder {
    /// Start from the default configuration for `base_url`
    pub fn new(base_url: Url) -> Self {
        Self::from_config(ClientConfig::new(base_url))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            directory: None,
            codec: None,
            unary: None,
            stream: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config = self.config.with_api_key(api_key);
        self
    }

    pub fn with_certificate(mut self, certificate: CertificateConfig) -> Self {
        self.config = self.config.with_certificate(certificate);
        self
    }

    /// Set the default deadline for one exchange
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config = self.config.with_retry_policy(policy);
        self
    }

    /// Enable or disable the stream channel
    pub fn with_websocket(mut self, enabled: bool) -> Self {
        self.config = self.config.with_websocket(enabled);
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.config = self.config.with_logging(logging);
        self
    }

    /// Directory view targets are resolved against
    ///
    /// Defaults to an empty [`InMemoryDirectory`].
    pub fn with_directory(mut self, directory: Arc<dyn AgentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Use a custom codec
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replace the HTTP channel
    pub fn with_unary_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.unary = Some(transport);
        self
    }

    /// Replace the WebSocket channel; only installed when the stream is enabled
    pub fn with_stream_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.stream = Some(transport);
        self
    }

    /// Build the A2A client
    ///
    /// Assembles the Tower stack `validation -> retry -> coordination`.
    ///
    /// # Errors
    ///
    /// `Connection` when the certificate cannot be loaded or the HTTP client
    /// cannot be configured.
    pub fn build(self) -> A2AResult<A2AClient> {
        let config = self.config;
        let tls = config
            .certificate
            .as_ref()
            .map(TlsMaterial::load)
            .transpose()?;

        let unary = match self.unary {
            Some(transport) => transport,
            None => Arc::new(http_transport(&config, tls.as_ref())?) as Arc<dyn Transport>,
        };

        let codec = self.codec.unwrap_or_else(|| Arc::new(JsonCodec));
        let manager = Arc::new(
            TransportManager::new(codec, config.timeout).with_body_logging(
                config.logging.enable_request_logging,
                config.logging.enable_response_logging,
            ),
        );

        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(InMemoryDirectory::default()));
        let coordinator = Arc::new(
            Coordinator::new(manager.clone(), directory)
                .with_retry_policy(config.retry_policy.clone()),
        );

        let service = ServiceBuilder::new()
            .layer(A2AValidationLayer::new())
            .layer(RetryLayer::new(config.retry_policy.clone()))
            .service(A2AProtocolService::new(coordinator.clone()));

        tracing::debug!(
            base_url = %config.base_url,
            websocket = config.websocket_enabled,
            mtls = tls.is_some(),
            "client assembled"
        );

        Ok(A2AClient::new(
            config,
            service,
            coordinator,
            manager,
            unary,
            self.stream,
            tls,
        ))
    }
}

/// Headers sent with the stream upgrade request
pub(crate) fn stream_headers(config: &ClientConfig) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("User-Agent".to_string(), config.user_agent.clone());
    if let Some(key) = &config.api_key {
        headers.insert(API_KEY_HEADER.to_string(), key.clone());
    }
    headers
}

fn http_transport(config: &ClientConfig, tls: Option<&TlsMaterial>) -> A2AResult<HttpTransport> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = &config.api_key {
        let value = HeaderValue::from_str(key)
            .map_err(|e| A2AError::Connection(format!("invalid API key header: {e}")))?;
        headers.insert(API_KEY_HEADER, value);
    }

    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(config.timeout);
    if let Some(tls) = tls {
        builder = tls.configure_http(builder)?;
    }

    let client = builder
        .build()
        .map_err(|e| A2AError::Connection(format!("failed to build HTTP client: {e}")))?;
    Ok(HttpTransport::with_client(config.base_url.clone(), client))
}
