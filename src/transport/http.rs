//! HTTP transport: the unary request/response channel

use async_trait::async_trait;
use url::Url;

use crate::protocol::error::A2AError;

use super::{Transport, TransportRequest, TransportResponse};

/// HTTP transport implementation using reqwest
///
/// Default headers (user agent, API key) and TLS identity are configured on
/// the `reqwest::Client` passed to [`HttpTransport::with_client`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the coordination server (e.g., "<https://a2a.example.com>")
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a new HTTP transport with a custom reqwest client
    pub fn with_client(base_url: Url, client: reqwest::Client) -> Self {
        Self { client, base_url }
    }

    /// Join the base URL and an endpoint path with exactly one slash
    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn map_send_error(err: reqwest::Error, request: &TransportRequest) -> A2AError {
        if err.is_timeout() {
            A2AError::Timeout {
                message_id: request.message_id.clone(),
                after: request.timeout,
            }
        } else if err.is_connect() {
            A2AError::Connection(format!("HTTP connection failed: {err}"))
        } else {
            A2AError::Transport(format!("HTTP request failed: {err}"))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError> {
        let url = self.endpoint_url(&request.endpoint);

        let mut req_builder = match request.method.as_str() {
            "POST" => self.client.post(&url),
            "GET" => self.client.get(&url),
            _ => {
                return Err(A2AError::Transport(format!(
                    "Unsupported HTTP method: {}",
                    request.method
                )))
            }
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.body.is_empty() {
            req_builder = req_builder.body(request.body.clone());
        }

        let response = req_builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|err| Self::map_send_error(err, &request))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|err| Self::map_send_error(err, &request))?;

        tracing::trace!(status, message_id = %request.message_id, "unary exchange complete");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}
