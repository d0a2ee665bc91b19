//! HTTP transport
//!
//! POSTs the request body as JSON and streams the `text/event-stream` response back
//! chunk by chunk.

use crate::error::sanitize_error_message;
use crate::protocol::RequestBody;
use crate::transport::{ByteSource, Transport, TransportError};
use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: Url,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl HttpTransportConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(300),
            api_key: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Parse `endpoint` and build a transport with default settings
    pub fn for_endpoint(endpoint: &str) -> Result<Self, TransportError> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        Self::new(HttpTransportConfig::new(url))
    }

    pub fn endpoint(&self) -> &Url {
        &self.config.endpoint
    }

    /// Map a response status to a transport result (pure function)
    fn check_status(status: u16, body: &str) -> Result<(), TransportError> {
        if (200..=299).contains(&status) {
            Ok(())
        } else {
            Err(Self::status_error(status, body))
        }
    }

    /// Rejection carrying the sanitized response body (pure function)
    fn status_error(status: u16, body: &str) -> TransportError {
        TransportError::Status {
            status,
            body: sanitize_error_message(body),
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    type Source = HttpByteSource;

    async fn open(&self, body: &RequestBody) -> Result<HttpByteSource, TransportError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| TransportError::Encode(e.to_string()))?;

        let mut request = self
            .client
            .post(self.config.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, EVENT_STREAM_MIME)
            .body(payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {api_key}"));
        }

        let response = request.send().await.map_err(|e| {
            let message = format!(
                "{} (is_connect: {}, is_timeout: {})",
                e,
                e.is_connect(),
                e.is_timeout()
            );
            error!(endpoint = %self.config.endpoint, "Agent request failed: {}", message);
            TransportError::Request(message)
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status, "Agent rejected request");
            return Err(Self::status_error(status, &text));
        }

        if response.content_length() == Some(0) {
            warn!(status, "Agent response has an empty body");
            return Err(TransportError::MissingBody);
        }

        debug!(status, endpoint = %self.config.endpoint, "Agent stream opened");
        Ok(HttpByteSource::new(response))
    }
}

/// Response body of an open HTTP stream
#[derive(Debug)]
pub struct HttpByteSource {
    response: Option<Response>,
    received_any: bool,
}

impl HttpByteSource {
    fn new(response: Response) -> Self {
        Self {
            response: Some(response),
            received_any: false,
        }
    }
}

#[async_trait::async_trait]
impl ByteSource for HttpByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) if chunk.is_empty() => continue,
                Ok(Some(chunk)) => {
                    self.received_any = true;
                    return Ok(Some(chunk));
                }
                Ok(None) => {
                    self.response = None;
                    if self.received_any {
                        return Ok(None);
                    }
                    return Err(TransportError::MissingBody);
                }
                Err(e) => {
                    self.response = None;
                    error!(error = %e, "Agent response stream aborted");
                    return Err(TransportError::Aborted(e.to_string()));
                }
            }
        }
    }
}
