//! The network boundary.
//!
//! The client never talks to the network directly. It hands a fully assembled
//! [`TransportRequest`] to a [`Transport`] and receives status, headers and body text back.
//! [`ReqwestTransport`] is the production implementation; tests substitute scripted ones.

use http::{HeaderMap, Method, StatusCode};
use std::future::Future;
use std::time::Duration;
use url::Url;

/// A single request, ready to be sent.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Full URL, query string included.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Serialized body, if any.
    pub body: Option<String>,
    /// Proxy URL to route the request through, passed along as given.
    pub proxy: Option<String>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

/// The response to a [`TransportRequest`], with the body fully buffered as text.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: String,
}

impl TransportResponse {
    /// Creates a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Connectivity failures reported by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established or was interrupted.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server did not answer within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The proxy URL could not be used.
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),
}

/// Performs HTTP requests on behalf of the client.
pub trait Transport: Send + Sync {
    /// Sends the request and returns the buffered response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained. A response with a
    /// non-2xx status is not an error at this level.
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = std::result::Result<TransportResponse, TransportError>> + Send;
}

/// Production transport using reqwest.
///
/// Requests without a proxy share one pooled `reqwest::Client`. A request carrying a proxy is
/// sent through a client built for that proxy.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with reqwest's default configuration.
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Creates a transport from an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.inner.clone());
        };
        let proxy =
            reqwest::Proxy::all(proxy).map_err(|e| TransportError::InvalidProxy(e.to_string()))?;
        reqwest::Client::builder()
            .proxy(proxy)
            .build()
            .map_err(|e| TransportError::InvalidProxy(e.to_string()))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(Box::new(e))
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(request.proxy.as_deref())?;
        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse::new(status, headers, body))
    }
}
