//! Successful call results.
//!
//! [`Response`] carries the envelope's decoded `data` together with details of the HTTP
//! exchange that produced it: raw body, status, headers, total latency and attempt count.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// The result of a successful call.
///
/// Dereferences to the decoded data.
///
/// # Examples
///
/// ```no_run
/// use postmen::Client;
///
/// # async fn example() -> Result<(), postmen::Error> {
/// let client = Client::builder().api_key("KEY").region("sandbox").build()?;
/// let response = client.get("labels").await?;
///
/// println!("labels: {:?}", response.get("labels"));
/// println!("took {:?} over {} attempt(s)", response.latency, response.attempts);
/// println!("calls left: {:?}", response.header("x-ratelimit-remaining"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The envelope's `data`, or the body text in raw mode.
    pub data: T,

    /// The raw response body of the successful attempt.
    pub raw_body: String,

    /// The HTTP status code of the successful attempt.
    pub status: StatusCode,

    /// The response headers of the successful attempt.
    pub headers: HeaderMap,

    /// Time from the start of the call to the successful response, including retries and
    /// rate-limit waits.
    pub latency: Duration,

    /// The number of attempts made; `1` when the first attempt succeeded.
    pub attempts: u32,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the data to a different type, keeping the exchange details.
    ///
    /// # Examples
    ///
    /// ```
    /// # use postmen::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     "42".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Consumes the response, returning the data.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
