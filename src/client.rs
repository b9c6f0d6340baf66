//! Postmen API client.
//!
//! The [`Client`] turns "method + path + options" into a reliable API interaction: it builds the
//! request, honours the rate-limit gate, dispatches through the [`Transport`], decodes the
//! envelope and retries retryable API errors with exponential backoff.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::config::{ClientConfig, EffectiveOptions};
use crate::envelope;
use crate::options::{Body, CallOptions};
use crate::rate_limit::{RateGate, RateState};
use crate::report::ErrorReporter;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::time::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
use crate::{Error, ErrorKind, Response, Result, Value};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

const API_KEY_HEADER: &str = "postmen-api-key";
const AGENT_HEADER: &str = "x-postmen-agent";

/// A client for the Postmen API.
///
/// Clones share the same rate-limit state and last-error slot.
///
/// # Examples
///
/// ```no_run
/// use postmen::{CallOptions, Client, Query};
/// use http::Method;
///
/// # async fn example() -> Result<(), postmen::Error> {
/// let client = Client::builder()
///     .api_key("YOUR_API_KEY")
///     .region("sandbox")
///     .build()?;
///
/// // GET /v3/labels?limit=10
/// let labels = client
///     .call(
///         Method::GET,
///         "labels",
///         CallOptions::new().with_query(Query::pairs([("limit", "10")])),
///     )
///     .await?;
/// println!("labels: {:?}", labels.data);
///
/// // POST a pre-serialized body
/// let cancelled = client.post("cancel-labels", r#"{"label":{"id":"abc"}}"#).await?;
/// println!("cancel: {:?}", cancelled.data);
/// # Ok(())
/// # }
/// ```
pub struct Client<T = ReqwestTransport, S = TokioSleeper> {
    inner: Arc<ClientInner<T, S>>,
}

struct ClientInner<T, S> {
    transport: T,
    sleeper: S,
    config: ClientConfig,
    endpoint: String,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    rate_gate: RateGate,
    reporter: ErrorReporter,
}

impl<T, S> Clone for Client<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Client {
    /// Creates a new `ClientBuilder` using the reqwest transport and tokio sleeps.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T: Transport, S: Sleeper> Client<T, S> {
    /// Performs an API call and returns the envelope's `data`.
    ///
    /// Retryable API errors are retried up to the effective attempt limit, waiting 1s, 2s,
    /// 4s, ... between attempts. When the rate-limit quota is exhausted the call first waits
    /// for the reset (or fails immediately if waiting is disabled). Every failure is returned;
    /// in safe mode it is additionally stored for [`Client::last_error`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] describing the first non-retryable failure, or the last retryable
    /// one once attempts are used up.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        options: CallOptions,
    ) -> Result<Response<Value>> {
        let inner = &*self.inner;
        inner.reporter.clear();

        let effective = inner.config.resolve(&options);
        let request = match self.build_request(method, path, &options, &effective) {
            Ok(request) => request,
            Err(e) => return Err(inner.reporter.report(e, effective.safe)),
        };

        let tries = effective.tries();
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            match inner.rate_gate.check(effective.rate_limit) {
                Ok(Some(delay)) => {
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        "Rate limit exhausted - waiting for reset"
                    );
                    inner.sleeper.sleep(delay).await;
                }
                Ok(None) => {}
                Err(e) => return Err(inner.reporter.report(e, effective.safe)),
            }

            attempt += 1;
            let response = match self.dispatch(&request, attempt).await {
                Ok(response) => response,
                Err(e) => return Err(inner.reporter.report(e, effective.safe)),
            };
            inner.rate_gate.update(&response.headers);

            let error = match envelope::decode(&response, effective.raw, effective.time) {
                Ok(data) => {
                    return Ok(Response::new(
                        data,
                        response.body,
                        response.status,
                        response.headers,
                        start_time.elapsed(),
                        attempt,
                    ));
                }
                Err(e) => e,
            };

            tracing::warn!(
                error = %error,
                attempt = attempt,
                method = %request.method,
                url = %request.url,
                "Request failed"
            );

            // Only server-reported failures are ever retried.
            let retryable = error.kind() == ErrorKind::Api && error.is_retryable();
            match inner
                .retry_policy
                .decide(retryable, attempt, tries, effective.retry)
            {
                RetryDecision::Retry(delay) => {
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                    inner.sleeper.sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(inner.reporter.report(error, effective.safe)),
            }
        }
    }

    /// Sends one attempt through the transport.
    async fn dispatch(&self, request: &TransportRequest, attempt: u32) -> Result<TransportResponse> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let start_time = Instant::now();
        let response = self
            .inner
            .transport
            .send(request.clone())
            .await
            .map_err(Error::transport)?;

        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            attempt = attempt,
            "Received HTTP response"
        );
        Ok(response)
    }

    /// Assembles the wire request for a call.
    fn build_request(
        &self,
        method: Method,
        path: &str,
        options: &CallOptions,
        effective: &EffectiveOptions,
    ) -> Result<TransportRequest> {
        let inner = &*self.inner;
        let raw_url = format!(
            "{}/{}/{}",
            inner.endpoint,
            inner.config.api_version,
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw_url)
            .map_err(|e| Error::config(format!("Invalid request URL {raw_url}: {e}")).with_source(e))?;
        if let Some(query) = &options.query {
            query.apply(&mut url);
        }

        let mut headers = inner.default_headers.clone();
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        Ok(TransportRequest {
            method,
            url,
            headers,
            body: options.body.as_ref().map(Body::to_wire),
            proxy: effective.proxy.clone(),
            timeout: inner.config.timeout,
        })
    }

    /// Makes a GET request to the specified path.
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn get(&self, path: &str) -> Result<Response<Value>> {
        self.call(Method::GET, path, CallOptions::new()).await
    }

    /// Makes a POST request with the given body.
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn post(&self, path: &str, body: impl Into<Body>) -> Result<Response<Value>> {
        self.call(Method::POST, path, CallOptions::new().with_body(body))
            .await
    }

    /// Makes a PUT request with the given body.
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn put(&self, path: &str, body: impl Into<Body>) -> Result<Response<Value>> {
        self.call(Method::PUT, path, CallOptions::new().with_body(body))
            .await
    }

    /// Makes a DELETE request to the specified path.
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn delete(&self, path: &str) -> Result<Response<Value>> {
        self.call(Method::DELETE, path, CallOptions::new()).await
    }
}

impl<T, S> Client<T, S> {
    /// Returns the error stored by the most recent safe-mode call.
    ///
    /// Cleared at the start of every call.
    pub fn last_error(&self) -> Option<Error> {
        self.inner.reporter.last_error()
    }

    /// Returns the rate-limit state learned from responses so far.
    pub fn rate_limit_state(&self) -> RateState {
        self.inner.rate_gate.snapshot()
    }

    /// Returns the construction-time configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use postmen::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), postmen::Error> {
/// let client = ClientBuilder::new()
///     .api_key("YOUR_API_KEY")
///     .endpoint("https://sandbox-api.postmen.com")
///     .max_tries(3)
///     .time(true)
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<T = ReqwestTransport, S = TokioSleeper> {
    config: ClientConfig,
    extra_headers: HeaderMap,
    transport: T,
    sleeper: S,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    /// Creates a builder starting from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            extra_headers: HeaderMap::new(),
            transport: ReqwestTransport::new(),
            sleeper: TokioSleeper,
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> ClientBuilder<T, S> {
    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    /// Sets the region; the endpoint becomes `https://<region>-api.postmen.com`.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    /// Sets an explicit endpoint, overriding the region.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the API version path segment.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    /// Sets the `x-postmen-agent` header value.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Sets the total attempts per call when retrying.
    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.config.max_tries = max_tries;
        self
    }

    /// Sets the default raw mode.
    pub fn raw(mut self, raw: bool) -> Self {
        self.config.raw = raw;
        self
    }

    /// Sets the default safe mode.
    pub fn safe(mut self, safe: bool) -> Self {
        self.config.safe = safe;
        self
    }

    /// Sets the default time conversion.
    pub fn time(mut self, time: bool) -> Self {
        self.config.time = time;
        self
    }

    /// Routes every call through the given proxy by default.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy.into());
        self
    }

    /// Sets whether retryable API errors are retried.
    pub fn retry(mut self, retry: bool) -> Self {
        self.config.retry = retry;
        self
    }

    /// Sets whether an exhausted quota is waited out (`true`) or rejected (`false`).
    pub fn rate_limit(mut self, wait: bool) -> Self {
        self.config.rate_limit = wait;
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Sets the backoff policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the clock used for rate-limit arithmetic.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::config(format!("Invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::config(format!("Invalid header value: {e}")))?;
        self.extra_headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the transport.
    pub fn transport<T2>(self, transport: T2) -> ClientBuilder<T2, S> {
        ClientBuilder {
            config: self.config,
            extra_headers: self.extra_headers,
            transport,
            sleeper: self.sleeper,
            clock: self.clock,
            retry_policy: self.retry_policy,
        }
    }

    /// Replaces the sleeper used for backoff and rate-limit waits.
    pub fn sleeper<S2>(self, sleeper: S2) -> ClientBuilder<T, S2> {
        ClientBuilder {
            config: self.config,
            extra_headers: self.extra_headers,
            transport: self.transport,
            sleeper,
            clock: self.clock,
            retry_policy: self.retry_policy,
        }
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key, the region/endpoint or the version is
    /// missing, if the endpoint is not a valid URL, if a header value is invalid, or if
    /// `max_tries` is zero. These errors are returned regardless of safe mode.
    pub fn build(self) -> Result<Client<T, S>> {
        let config = self.config;
        if config.api_key.is_empty() {
            return Err(Error::config("missing API key"));
        }
        let endpoint = config
            .resolved_endpoint()
            .ok_or_else(|| Error::config("missing region or endpoint"))?;
        if config.api_version.is_empty() {
            return Err(Error::config("missing API version"));
        }
        if config.max_tries == 0 {
            return Err(Error::config("max tries must be at least 1"));
        }

        let endpoint = endpoint.trim_end_matches('/').to_string();
        Url::parse(&endpoint)
            .map_err(|e| Error::config(format!("Invalid endpoint {endpoint}: {e}")).with_source(e))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(API_KEY_HEADER, header_value(&config.api_key, "API key")?);
        default_headers.insert(AGENT_HEADER, header_value(&config.user_agent, "user agent")?);
        for (name, value) in &self.extra_headers {
            default_headers.insert(name.clone(), value.clone());
        }

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                sleeper: self.sleeper,
                config,
                endpoint,
                default_headers,
                retry_policy: self.retry_policy,
                rate_gate: RateGate::new(self.clock),
                reporter: ErrorReporter::default(),
            }),
        })
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value).map_err(|e| Error::config(format!("Invalid {what}: {e}")))
}
