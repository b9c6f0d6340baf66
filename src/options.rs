//! Per-call options.
//!
//! Every field of [`CallOptions`] is optional. Unset fields fall back to the client's
//! construction-time configuration (see [`ClientConfig::resolve`](crate::ClientConfig::resolve)),
//! and a call's overrides never change that configuration.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, TimeZone};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Pre-serialized text, sent exactly as given.
    Text(String),
    /// A JSON document, serialized once when the request is built.
    Json(serde_json::Value),
}

impl Body {
    /// Encodes any serializable value as a JSON body.
    ///
    /// [`Value`](crate::Value) timestamps and chrono date/times serialize as ISO-8601 strings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| Error::config(format!("failed to serialize request body: {e}")).with_source(e))
    }

    /// Returns the wire form of the body.
    pub fn to_wire(&self) -> String {
        match self {
            Body::Text(text) => text.clone(),
            Body::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

/// A query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Sent as is.
    Text(String),
    /// Sent as an RFC 3339 string.
    Time(DateTime<FixedOffset>),
}

impl QueryValue {
    fn to_wire(&self) -> String {
        match self {
            QueryValue::Text(text) => text.clone(),
            QueryValue::Time(time) => time.to_rfc3339(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for QueryValue {
    fn from(value: DateTime<Tz>) -> Self {
        QueryValue::Time(value.fixed_offset())
    }
}

/// A URL query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Key/value pairs, form-encoded in order.
    Pairs(Vec<(String, QueryValue)>),
    /// A pre-built query string. A leading `?` is ignored.
    Raw(String),
}

impl Query {
    /// Builds a query from key/value pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use postmen::Query;
    ///
    /// let query = Query::pairs([("status", "created"), ("limit", "10")]);
    /// ```
    pub fn pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<QueryValue>,
    {
        Query::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Appends the query to `url`.
    pub(crate) fn apply(&self, url: &mut Url) {
        match self {
            Query::Pairs(pairs) => {
                if pairs.is_empty() {
                    return;
                }
                let mut serializer = url.query_pairs_mut();
                for (key, value) in pairs {
                    serializer.append_pair(key, &value.to_wire());
                }
            }
            Query::Raw(raw) => {
                let raw = raw.strip_prefix('?').unwrap_or(raw);
                if !raw.is_empty() {
                    url.set_query(Some(raw));
                }
            }
        }
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Query::Raw(value.to_string())
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Query::Raw(value)
    }
}

/// Proxy override for a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proxy {
    /// Ignore the configured proxy and connect directly.
    Direct,
    /// Route the call through this proxy.
    Url(String),
}

/// Options for a single call.
///
/// # Examples
///
/// ```
/// use postmen::{CallOptions, Query};
///
/// let options = CallOptions::new()
///     .with_query(Query::pairs([("limit", "10")]))
///     .with_time(true)
///     .with_retry(false);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Request body.
    pub body: Option<Body>,
    /// URL query.
    pub query: Option<Query>,
    /// Extra headers, layered over the client's default headers.
    pub headers: HeaderMap,
    /// Return the body text without envelope validation.
    pub raw: Option<bool>,
    /// Store failures for [`Client::last_error`](crate::Client::last_error).
    pub safe: Option<bool>,
    /// Convert date/time strings in the payload into timestamps.
    pub time: Option<bool>,
    /// Proxy override.
    pub proxy: Option<Proxy>,
    /// Retry retryable API errors.
    pub retry: Option<bool>,
    /// Total attempts when retrying.
    pub max_tries: Option<u32>,
    /// Wait for the rate-limit reset instead of failing.
    pub rate_limit: Option<bool>,
}

impl CallOptions {
    /// Creates options with nothing overridden.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the URL query.
    pub fn with_query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::config(format!("Invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::config(format!("Invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Overrides raw mode.
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Overrides safe mode.
    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = Some(safe);
        self
    }

    /// Overrides time conversion.
    pub fn with_time(mut self, time: bool) -> Self {
        self.time = Some(time);
        self
    }

    /// Overrides the proxy.
    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Overrides whether retryable errors are retried.
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Overrides the total number of attempts.
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = Some(max_tries);
        self
    }

    /// Overrides whether an exhausted quota is waited out (`true`) or rejected (`false`).
    pub fn with_rate_limit(mut self, wait: bool) -> Self {
        self.rate_limit = Some(wait);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_text_body_is_not_re_encoded() {
        let text = r#"{"async":false}"#;
        let body = Body::from(text);
        assert_eq!(body.to_wire(), text);
        assert_eq!(Body::from(body.to_wire()).to_wire(), text);
    }

    #[test]
    fn test_json_body_is_encoded_once() {
        let body = Body::json(&json!({"something": "value"})).unwrap();
        assert_eq!(body.to_wire(), r#"{"something":"value"}"#);
    }

    #[test]
    fn test_json_body_from_value_with_timestamp() {
        let value: crate::Value = json!({"ship_date": "2016-01-31"}).into();
        let body = Body::json(&value.convert_timestamps()).unwrap();
        assert_eq!(body.to_wire(), r#"{"ship_date":"2016-01-31T00:00:00+00:00"}"#);
    }

    #[test]
    fn test_query_pairs_render_timestamps() {
        let when = Utc.with_ymd_and_hms(2016, 1, 31, 16, 45, 46).unwrap();
        let mut url = Url::parse("https://sandbox-api.postmen.com/v3/labels").unwrap();
        Query::Pairs(vec![
            ("created_at_min".to_string(), when.into()),
            ("limit".to_string(), 10i64.into()),
        ])
        .apply(&mut url);

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0].1, "2016-01-31T16:45:46+00:00");
        assert_eq!(pairs[1], ("limit".to_string(), "10".to_string()));
    }

    #[test]
    fn test_raw_query_strips_question_mark() {
        let mut url = Url::parse("https://sandbox-api.postmen.com/v3/labels").unwrap();
        Query::from("?string").apply(&mut url);
        assert_eq!(url.query(), Some("string"));

        let mut url = Url::parse("https://sandbox-api.postmen.com/v3/labels").unwrap();
        Query::from("string").apply(&mut url);
        assert_eq!(url.query(), Some("string"));
    }

    #[test]
    fn test_empty_query_leaves_url_alone() {
        let mut url = Url::parse("https://sandbox-api.postmen.com/v3/labels").unwrap();
        Query::Pairs(Vec::new()).apply(&mut url);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        assert!(CallOptions::new().with_header("bad header", "x").is_err());
    }
}
