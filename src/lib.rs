//! # Postmen - a client for the Postmen shipping API
//!
//! Every Postmen response is wrapped in a `{ "meta": ..., "data": ... }` envelope. This crate
//! builds requests, unwraps that envelope, keeps track of the server's rate-limit quota and
//! retries the failures the server marks as retryable.
//!
//! ## Quick Start
//!
//! ```no_run
//! use postmen::{Body, CallOptions, Client};
//! use http::Method;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), postmen::Error> {
//!     let client = Client::builder()
//!         .api_key("YOUR_API_KEY")
//!         .region("sandbox")
//!         .build()?;
//!
//!     // GET /v3/labels
//!     let labels = client.get("labels").await?;
//!     println!("labels: {:?}", labels.get("labels"));
//!     println!("request took {:?}", labels.latency);
//!
//!     // POST /v3/rates with a JSON body
//!     let body = Body::json(&json!({ "async": false, "is_document": false }))?;
//!     let rates = client
//!         .call(Method::POST, "rates", CallOptions::new().with_body(body))
//!         .await?;
//!     println!("rates: {:?}", rates.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is returned as an [`Error`] carrying the server's `meta` fields where they
//! exist. In *safe* mode the error is also kept on the client for later inspection:
//!
//! ```no_run
//! use postmen::{CallOptions, Client, ErrorKind};
//! use http::Method;
//!
//! # async fn example() -> Result<(), postmen::Error> {
//! # let client = Client::builder().api_key("KEY").region("sandbox").build()?;
//! match client.call(Method::GET, "labels/unknown", CallOptions::new().with_safe(true)).await {
//!     Ok(response) => println!("label: {:?}", response.data),
//!     Err(e) if e.kind() == ErrorKind::Api => {
//!         eprintln!("API error {:?}: {} ({:?})", e.code(), e.message(), e.details());
//!     }
//!     Err(e) => eprintln!("call failed: {e}"),
//! }
//! if let Some(e) = client.last_error() {
//!     eprintln!("last error retryable: {}", e.is_retryable());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries and Rate Limits
//!
//! Errors flagged `retryable` by the server are retried, by default up to 5 attempts in total,
//! waiting 1s, 2s, 4s and 8s in between. When a response reports that no calls remain, the
//! next call waits until the advertised reset, or fails with a 429 error if waiting is off:
//!
//! ```no_run
//! use postmen::{CallOptions, Client};
//! use http::Method;
//!
//! # async fn example() -> Result<(), postmen::Error> {
//! let client = Client::builder()
//!     .api_key("YOUR_API_KEY")
//!     .region("sandbox")
//!     .max_tries(3)
//!     .rate_limit(false)
//!     .build()?;
//!
//! let once = CallOptions::new().with_retry(false);
//! client.call(Method::GET, "labels", once).await?;
//! println!("calls left: {:?}", client.rate_limit_state().calls_remaining);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod envelope;
mod error;
pub mod options;
pub mod rate_limit;
mod report;
mod response;
pub mod retry;
pub mod time;
pub mod transport;
mod value;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, EffectiveOptions};
pub use error::{Error, ErrorKind, Result};
pub use options::{Body, CallOptions, Proxy, Query, QueryValue};
pub use response::Response;
pub use value::{parse_timestamp, Value};
