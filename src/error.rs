//! Error types for Postmen API calls.
//!
//! Every failure a call can produce is surfaced as a single [`Error`] value. API-reported
//! failures keep the server's own code, message, details and retryable flag; local failures
//! (no response, malformed JSON, connectivity problems) are given the same shape with
//! defaults filled in, so callers can always inspect the same fields.

use crate::value::Value;
use std::sync::Arc;

/// Message used when neither the server nor the local failure supplied one.
pub const DEFAULT_MESSAGE: &str = "no details";

/// Broad classification of an [`Error`].
///
/// Only [`ErrorKind::Api`] errors are ever retried by the client, and only when the
/// server marked them retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The client could not be constructed or a request could not be assembled.
    ///
    /// Construction-time configuration errors are always returned, even in safe mode.
    Config,

    /// The transport failed to perform the request (connection refused, timeout, ...).
    Transport,

    /// The response body was empty, not JSON, or not a valid envelope.
    Decode,

    /// The server returned a well-formed envelope reporting a failure.
    Api,

    /// The rate-limit quota is exhausted and waiting for the reset is disabled.
    RateLimit,
}

/// The error type surfaced by every client call.
///
/// # Examples
///
/// ```no_run
/// use postmen::{Client, ErrorKind};
///
/// # async fn example() -> Result<(), postmen::Error> {
/// let client = Client::builder().api_key("KEY").region("sandbox").build()?;
///
/// match client.get("labels").await {
///     Ok(response) => println!("labels: {:?}", response.data),
///     Err(e) if e.kind() == ErrorKind::Api => {
///         eprintln!("API error {:?}: {}", e.code(), e.message());
///         for detail in e.details() {
///             eprintln!("  {detail:?}");
///         }
///     }
///     Err(e) => eprintln!("call failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}{}", code_suffix(.code))]
pub struct Error {
    kind: ErrorKind,
    code: Option<i64>,
    message: String,
    details: Vec<Value>,
    retryable: bool,
    data: Option<Value>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

fn code_suffix(code: &Option<i64>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

impl Error {
    /// Creates an error of the given kind with defaults for every other field.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            details: Vec::new(),
            retryable: false,
            data: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    /// Wraps a transport failure. Transport failures are never retryable.
    pub fn transport(source: crate::transport::TransportError) -> Self {
        Self::new(ErrorKind::Transport, "failed to perform request").with_source(source)
    }

    /// The synthetic error returned when the quota is exhausted and waiting is disabled.
    pub fn rate_limited() -> Self {
        Self::new(ErrorKind::RateLimit, "rate limit exceeded")
            .with_code(429)
            .with_retryable(true)
    }

    /// Builds an error from an envelope's `meta` object.
    ///
    /// `code`, `message`, `details` and `retryable` are taken verbatim when present;
    /// missing fields fall back to the defaults.
    pub fn from_meta(kind: ErrorKind, meta: Option<&Value>) -> Self {
        let mut error = Self::new(kind, DEFAULT_MESSAGE);
        let Some(meta) = meta else {
            return error;
        };

        error.code = meta.get("code").and_then(Value::as_i64);
        if let Some(message) = meta.get("message").and_then(Value::as_str) {
            error.message = message.to_string();
        }
        if let Some(details) = meta.get("details").and_then(Value::as_array) {
            error.details = details.to_vec();
        }
        error.retryable = meta
            .get("retryable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        error
    }

    /// Sets the error code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Removes the error code.
    pub fn without_code(mut self) -> Self {
        self.code = None;
        self
    }

    /// Replaces the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the retryable flag.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attaches the `data` payload that accompanied the failure.
    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the API error code, if any.
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// Returns the human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the structured details reported with the error (empty if none).
    pub fn details(&self) -> &[Value] {
        &self.details
    }

    /// Returns `true` if the failure is transient and the call may be repeated.
    ///
    /// # Examples
    ///
    /// ```
    /// use postmen::Error;
    ///
    /// assert!(Error::rate_limited().is_retryable());
    /// assert!(!Error::decode("malformed response from server").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns the `data` payload that accompanied the failure, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

/// A specialized `Result` type for Postmen API calls.
pub type Result<T> = std::result::Result<T, Error>;
