//! The uniform `{success, data, error}` response envelope and its codec.
//!
//! Every single-shot call resolves to an [`Envelope`], whatever happened on
//! the wire: pre-normalized server envelopes pass through, bare JSON bodies
//! are wrapped, and non-2xx statuses or transport failures become a failed
//! envelope with an [`ErrorCode`].
//!
//! # Example
//!
//! ```rust
//! use http::StatusCode;
//! use runfeed::envelope::decode;
//!
//! let envelope = decode(StatusCode::OK, r#"{"id":"run-1"}"#, None);
//! assert!(envelope.success);
//! assert_eq!(envelope.data.expect("data")["id"], "run-1");
//!
//! let envelope = decode(StatusCode::UNAUTHORIZED, "", None);
//! assert!(envelope.is_unauthorized());
//! ```

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ErrorCode;

/// Error payload of a failed [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Uniform response wrapper.
///
/// When `success` is true `data` is meaningful and `error` is `None`;
/// otherwise `error` describes the failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl<T> Envelope<T> {
    /// A successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed envelope.
    pub fn failure(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError::new(code, message)),
        }
    }

    /// A failed envelope from an existing [`ApiError`].
    pub fn from_error(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// The error code, if this envelope failed.
    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.error.as_ref().map(|e| &e.code)
    }

    /// Returns true if this envelope carries an `UNAUTHORIZED` error.
    pub fn is_unauthorized(&self) -> bool {
        self.error_code().is_some_and(ErrorCode::is_unauthorized)
    }

    /// Map the payload to a new type.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Envelope<U> {
        Envelope {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
        }
    }

    /// Convert into a `Result`, treating a successful envelope with no data as
    /// `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.success {
            return Ok(self.data);
        }
        Err(self
            .error
            .unwrap_or_else(|| ApiError::new(ErrorCode::Unknown, "request failed")))
    }
}

impl Envelope<Value> {
    /// Deserialize the JSON payload into `T`.
    ///
    /// A payload that does not match `T` turns the envelope into an
    /// `INVALID_FORMAT` failure; a failed envelope keeps its error.
    pub fn into_typed<T: DeserializeOwned>(self) -> Envelope<T> {
        if !self.success {
            return Envelope {
                success: false,
                data: None,
                error: self.error,
            };
        }

        let value = self.data.unwrap_or(Value::Null);
        match serde_json::from_value::<Option<T>>(value) {
            Ok(data) => Envelope {
                success: true,
                data,
                error: None,
            },
            Err(e) => Envelope::failure(
                ErrorCode::InvalidFormat,
                format!("Unexpected response shape: {e}"),
            ),
        }
    }
}

/// Returns true if `value` already has the envelope shape.
///
/// A boolean `success` plus a `data` or `error` key marks an envelope; a
/// `success: false` object always does. Extra keys (trace ids and the like)
/// are ignored.
fn is_envelope(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let Some(success) = obj.get("success").and_then(Value::as_bool) else {
        return false;
    };
    !success || obj.contains_key("data") || obj.contains_key("error")
}

fn normalize_envelope(value: Value) -> Envelope<Value> {
    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or_default();
    let data = value.get("data").filter(|v| !v.is_null()).cloned();
    let error = value
        .get("error")
        .filter(|v| !v.is_null())
        .map(|err| match err {
            Value::String(message) => ApiError::new(ErrorCode::Unknown, message.as_str()),
            _ => ApiError::new(
                err.get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN"),
                err.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            ),
        });

    Envelope {
        success,
        data,
        error: if success { None } else { error },
    }
}

fn failure_from_status(status: StatusCode, body: &str, parsed: Option<&Value>) -> Envelope<Value> {
    let parsed_error = parsed.and_then(|v| v.get("error"));

    let code = parsed_error
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(ErrorCode::from)
        .unwrap_or_else(|| {
            if status == StatusCode::UNAUTHORIZED {
                ErrorCode::Unauthorized
            } else {
                ErrorCode::Unknown
            }
        });

    let message = parsed_error
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(Value::as_str)
        .or_else(|| parsed.and_then(|v| v.get("message")).and_then(Value::as_str))
        .map(str::to_string)
        .filter(|m| !m.is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| {
            format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )
            .trim_end()
            .to_string()
        });

    Envelope::failure(code, message)
}

/// Normalize a raw HTTP response into an [`Envelope`].
///
/// `default` is the payload reported for `204 No Content` (and for empty 2xx
/// bodies); `None` reports `data: null`.
pub fn decode(status: StatusCode, body: &str, default: Option<Value>) -> Envelope<Value> {
    if status == StatusCode::NO_CONTENT {
        return Envelope {
            success: true,
            data: default,
            error: None,
        };
    }

    let parsed = serde_json::from_str::<Value>(body).ok();

    if let Some(value) = parsed.as_ref()
        && is_envelope(value)
    {
        let envelope = normalize_envelope(value.clone());
        if envelope.success || envelope.error.is_some() {
            return envelope;
        }
        // `success: false` without an error object: describe it from the status.
        if status.is_success() {
            return Envelope::failure(ErrorCode::Unknown, "request failed");
        }
        return failure_from_status(status, body, parsed.as_ref());
    }

    if !status.is_success() {
        return failure_from_status(status, body, parsed.as_ref());
    }

    match parsed {
        Some(value) => Envelope::ok(value),
        None if body.trim().is_empty() => Envelope {
            success: true,
            data: default,
            error: None,
        },
        None => Envelope::failure(
            ErrorCode::InvalidFormat,
            format!(
                "Response is not valid JSON: {}",
                body.chars().take(200).collect::<String>()
            ),
        ),
    }
}

/// The envelope reported when no response was received at all.
pub fn network_failure<T>(message: impl Into<String>) -> Envelope<T> {
    Envelope::failure(ErrorCode::NetworkError, message)
}
