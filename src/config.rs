//! Client configuration and per-call option resolution.

use crate::options::{CallOptions, Proxy};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "v3";

/// Total attempts per call when retrying is enabled.
pub const DEFAULT_MAX_TRIES: u32 = 5;

/// Default value of the `x-postmen-agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("rust-sdk-", env!("CARGO_PKG_VERSION"));

/// Construction-time configuration of a [`Client`](crate::Client).
///
/// Usually assembled through [`ClientBuilder`](crate::ClientBuilder). It can also be
/// deserialized, e.g. from a JSON settings file, and handed to
/// [`ClientBuilder::from_config`](crate::ClientBuilder::from_config).
///
/// # Examples
///
/// ```
/// use postmen::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(
///     r#"{"api_key": "KEY", "region": "sandbox", "safe": true}"#,
/// ).unwrap();
/// assert_eq!(config.api_version, "v3");
/// assert_eq!(config.max_tries, 5);
/// assert!(config.safe);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Value of the `postmen-api-key` header.
    pub api_key: String,
    /// Region used to derive the endpoint when no endpoint is given.
    pub region: Option<String>,
    /// Explicit endpoint; takes precedence over `region`.
    pub endpoint: Option<String>,
    /// API version path segment.
    pub api_version: String,
    /// Value of the `x-postmen-agent` header.
    pub user_agent: String,
    /// Total attempts per call when retrying.
    pub max_tries: u32,
    /// Return body text without envelope validation.
    pub raw: bool,
    /// Store failures for [`Client::last_error`](crate::Client::last_error).
    pub safe: bool,
    /// Convert date/time strings in payloads into timestamps.
    pub time: bool,
    /// Proxy URL for every call.
    pub proxy: Option<String>,
    /// Retry retryable API errors.
    pub retry: bool,
    /// Wait for the rate-limit reset (`true`) or fail immediately (`false`).
    pub rate_limit: bool,
    /// Per-request timeout handed to the transport.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            region: None,
            endpoint: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_tries: DEFAULT_MAX_TRIES,
            raw: false,
            safe: false,
            time: false,
            proxy: None,
            retry: true,
            rate_limit: true,
            timeout: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("user_agent", &self.user_agent)
            .field("max_tries", &self.max_tries)
            .field("raw", &self.raw)
            .field("safe", &self.safe)
            .field("time", &self.time)
            .field("proxy", &self.proxy)
            .field("retry", &self.retry)
            .field("rate_limit", &self.rate_limit)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Options in force for one call: the call's overrides layered over the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOptions {
    /// Raw mode.
    pub raw: bool,
    /// Safe mode.
    pub safe: bool,
    /// Time conversion.
    pub time: bool,
    /// Retry retryable API errors.
    pub retry: bool,
    /// Wait out an exhausted quota.
    pub rate_limit: bool,
    /// Configured attempt limit.
    pub max_tries: u32,
    /// Proxy for this call.
    pub proxy: Option<String>,
}

impl EffectiveOptions {
    /// Number of attempts this call may make.
    pub fn tries(&self) -> u32 {
        if self.retry {
            self.max_tries.max(1)
        } else {
            1
        }
    }
}

impl ClientConfig {
    /// Merges per-call overrides onto this configuration. Call-level values win.
    ///
    /// # Examples
    ///
    /// ```
    /// use postmen::{CallOptions, ClientConfig};
    ///
    /// let config = ClientConfig { retry: false, raw: true, ..ClientConfig::default() };
    /// let effective = config.resolve(&CallOptions::new().with_retry(true));
    ///
    /// assert!(effective.retry);
    /// assert!(effective.raw);
    /// assert_eq!(effective.tries(), 5);
    /// ```
    pub fn resolve(&self, options: &CallOptions) -> EffectiveOptions {
        let proxy = match &options.proxy {
            Some(Proxy::Direct) => None,
            Some(Proxy::Url(url)) => Some(url.clone()),
            None => self.proxy.clone(),
        };

        EffectiveOptions {
            raw: options.raw.unwrap_or(self.raw),
            safe: options.safe.unwrap_or(self.safe),
            time: options.time.unwrap_or(self.time),
            retry: options.retry.unwrap_or(self.retry),
            rate_limit: options.rate_limit.unwrap_or(self.rate_limit),
            max_tries: options.max_tries.unwrap_or(self.max_tries),
            proxy,
        }
    }

    /// Returns the endpoint the client talks to, if one can be determined.
    ///
    /// An explicit endpoint wins; otherwise it is derived from the region.
    pub fn resolved_endpoint(&self) -> Option<String> {
        match (&self.endpoint, &self.region) {
            (Some(endpoint), _) if !endpoint.is_empty() => Some(endpoint.clone()),
            (_, Some(region)) if !region.is_empty() => {
                Some(format!("https://{region}-api.postmen.com"))
            }
            _ => None,
        }
    }
}
