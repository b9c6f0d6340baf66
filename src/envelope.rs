//! Decoding of the API's response envelope.
//!
//! Every response has the shape
//!
//! ```json
//! { "meta": { "code": 200, "message": "OK", "details": [], "retryable": false },
//!   "data": { ... } }
//! ```
//!
//! [`decode`] validates the envelope and returns `data`, or the failure the envelope (or the
//! lack of one) describes.

use crate::transport::TransportResponse;
use crate::value::Value;
use crate::{Error, ErrorKind, Result};

/// Message of the error for an empty response body.
pub const NO_RESPONSE: &str = "no response from server";

/// Message of the error for a body that is not JSON.
pub const MALFORMED_RESPONSE: &str = "malformed response from server";

/// Message of the error for an envelope without a usable `meta.code`.
pub const MISSING_META: &str = "response missing meta information";

/// Message of the error for a successful envelope without `data`.
pub const NO_DATA: &str = "no data returned";

/// Returns `true` for `meta.code` values that denote success.
pub fn is_success_code(code: i64) -> bool {
    (200..300).contains(&code)
}

/// Decodes a transport response into the envelope's payload.
///
/// With `raw` set, the body text is returned as a [`Value::String`] without any checks. With
/// `time` set, date/time strings anywhere in the document become [`Value::Timestamp`]s.
///
/// # Errors
///
/// In order of precedence:
/// - empty body: [`NO_RESPONSE`]
/// - body is not JSON: [`MALFORMED_RESPONSE`], code 500
/// - `meta.code` missing or zero: [`MISSING_META`], other `meta` fields kept
/// - `meta.code` outside 2xx: the server's `meta` verbatim ([`ErrorKind::Api`])
/// - `data` missing: [`NO_DATA`]
/// - non-2xx HTTP status: `HTTP code = <status>`
///
/// # Examples
///
/// ```
/// use postmen::envelope::decode;
/// use postmen::transport::TransportResponse;
/// use http::{HeaderMap, StatusCode};
///
/// let response = TransportResponse::new(
///     StatusCode::OK,
///     HeaderMap::new(),
///     r#"{"meta":{"code":200,"message":"OK","details":[]},"data":{"id":"abc"}}"#,
/// );
/// let data = decode(&response, false, false).unwrap();
/// assert_eq!(data.get("id").and_then(|v| v.as_str()), Some("abc"));
/// ```
pub fn decode(response: &TransportResponse, raw: bool, time: bool) -> Result<Value> {
    if raw {
        return Ok(Value::String(response.body.clone()));
    }

    if response.body.is_empty() {
        return Err(Error::decode(NO_RESPONSE));
    }

    let document = parse(&response.body, time)?;
    let Value::Object(mut envelope) = document else {
        return Err(Error::decode(MISSING_META));
    };

    let meta = envelope.remove("meta");
    let data = envelope.remove("data");

    let code = meta.as_ref().and_then(|m| m.get("code")).and_then(Value::as_i64);
    let code = match code {
        Some(code) if code != 0 => code,
        _ => {
            return Err(Error::from_meta(ErrorKind::Decode, meta.as_ref())
                .with_message(MISSING_META)
                .without_code()
                .with_retryable(false)
                .with_data(data));
        }
    };

    if !is_success_code(code) {
        return Err(Error::from_meta(ErrorKind::Api, meta.as_ref()).with_data(data));
    }

    let Some(data) = data else {
        return Err(Error::from_meta(ErrorKind::Decode, meta.as_ref())
            .with_message(NO_DATA)
            .with_retryable(false));
    };

    if !response.is_success() {
        return Err(Error::decode(format!("HTTP code = {}", response.status.as_u16()))
            .with_code(i64::from(response.status.as_u16()))
            .with_data(Some(data)));
    }

    Ok(data)
}

fn parse(body: &str, time: bool) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, raw_response = %body, "Failed to parse response body");
        Error::decode(MALFORMED_RESPONSE).with_code(500).with_source(e)
    })?;

    let value = Value::from(json);
    Ok(if time { value.convert_timestamps() } else { value })
}
