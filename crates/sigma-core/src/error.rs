//! Error types for CloudSigma operations.
//!
//! This module provides the error taxonomy shared by every sigma crate: local
//! precondition failures, transport failures, structured service rejections
//! and client-side operation timeouts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the structured error payload returned by the service.
///
/// The service replies to rejected requests with a JSON array of these
/// objects, e.g. `[{"error_point":null,"error_type":"notexist","error_message":"notfound"}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceErrorPayload {
    /// Field or location the error refers to, if any
    #[serde(default)]
    pub error_point: Option<String>,
    /// Error class (`permission`, `notexist`, `validation`, ...)
    #[serde(default)]
    pub error_type: String,
    /// Human-readable error message
    #[serde(default)]
    pub error_message: String,
}

impl ServiceErrorPayload {
    /// Create a payload without an error point.
    #[must_use]
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_point: None,
            error_type: error_type.into(),
            error_message: error_message.into(),
        }
    }
}

/// Main error type for CloudSigma operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Local precondition failed; nothing was sent over the wire
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection or transport level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service rejected the request
    #[error("Service error {status}: {}", summarize(.errors))]
    Service {
        /// HTTP status code of the response
        status: u16,
        /// Parsed service error payload (empty when the body was not structured)
        errors: Vec<ServiceErrorPayload>,
    },

    /// A client-side wait exceeded its deadline
    #[error("Operation timeout: {0}")]
    OperationTimeout(String),

    /// Failed to parse a response body
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The response was well-formed but not what the operation expects
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

fn summarize(errors: &[ServiceErrorPayload]) -> String {
    if errors.is_empty() {
        return "no error payload".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{}: {}", e.error_type, e.error_message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Specialized result type for CloudSigma operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional correlation ID of the failed request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Build a service error from a status code and a raw response body.
    ///
    /// Bodies that are not a structured error array yield an empty payload list.
    #[must_use]
    pub fn from_service_response(status: u16, body: &[u8]) -> Self {
        let errors = serde_json::from_slice::<Vec<ServiceErrorPayload>>(body).unwrap_or_default();
        Self::Service { status, errors }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "PRECONDITION_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Service { .. } => "SERVICE_ERROR",
            Self::OperationTimeout(_) => "OPERATION_TIMEOUT",
            Self::Parse(_) => "PARSE_ERROR",
            Self::UnexpectedResponse(_) => "UNEXPECTED_RESPONSE",
        }
    }

    /// HTTP status of a service rejection.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// First `error_type` of a service rejection.
    #[must_use]
    pub fn service_error_type(&self) -> Option<&str> {
        match self {
            Self::Service { errors, .. } => errors.first().map(|e| e.error_type.as_str()),
            _ => None,
        }
    }

    /// First `error_message` of a service rejection.
    #[must_use]
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Service { errors, .. } => errors.first().map(|e| e.error_message.as_str()),
            _ => None,
        }
    }

    /// Returns true for a 404 service rejection.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { status: 404, .. })
    }

    /// Returns true when a client-side wait ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::OperationTimeout(_))
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        self.into_error_response_with_id(None)
    }

    /// Converts the error into an `ErrorResponse` with a correlation ID.
    #[must_use]
    pub fn into_error_response_with_id(self, request_id: Option<String>) -> ErrorResponse {
        let details = match &self {
            Self::Service { errors, .. } => serde_json::to_value(errors).ok(),
            _ => None,
        };
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details,
            },
            request_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Transport(_) | Self::Parse(_) | Self::UnexpectedResponse(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOT_FOUND_BODY: &str =
        r#"[{"error_point":null,"error_type":"notexist","error_message":"notfound"}]"#;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::Precondition("test".to_string()).error_code(),
            "PRECONDITION_FAILED"
        );
        assert_eq!(Error::Config("test".to_string()).error_code(), "CONFIG_ERROR");
        assert_eq!(
            Error::InvalidEndpoint("test".to_string()).error_code(),
            "INVALID_ENDPOINT"
        );
        assert_eq!(
            Error::Transport("test".to_string()).error_code(),
            "TRANSPORT_ERROR"
        );
        assert_eq!(
            Error::Service {
                status: 403,
                errors: Vec::new()
            }
            .error_code(),
            "SERVICE_ERROR"
        );
        assert_eq!(
            Error::OperationTimeout("test".to_string()).error_code(),
            "OPERATION_TIMEOUT"
        );
        assert_eq!(Error::Parse("test".to_string()).error_code(), "PARSE_ERROR");
        assert_eq!(
            Error::UnexpectedResponse("test".to_string()).error_code(),
            "UNEXPECTED_RESPONSE"
        );
    }

    #[test]
    fn test_service_error_from_structured_body() {
        let err = Error::from_service_response(404, NOT_FOUND_BODY.as_bytes());
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert_eq!(err.service_error_type(), Some("notexist"));
        assert_eq!(err.service_message(), Some("notfound"));
        assert_eq!(err.to_string(), "Service error 404: notexist: notfound");
    }

    #[test]
    fn test_service_error_from_unstructured_body() {
        let err = Error::from_service_response(500, b"500 internal");
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.service_message(), None);
        assert_eq!(err.to_string(), "Service error 500: no error payload");
    }

    #[test]
    fn test_into_error_response_carries_payload() {
        let err = Error::from_service_response(404, NOT_FOUND_BODY.as_bytes());
        let response = err.into_error_response_with_id(Some("7".to_string()));

        assert_eq!(response.error.code, "SERVICE_ERROR");
        assert_eq!(response.request_id.as_deref(), Some("7"));
        let details = response.error.details.unwrap();
        assert_eq!(details[0]["error_type"], "notexist");
    }

    #[test]
    fn test_into_error_response_without_details() {
        let response = Error::OperationTimeout("server u1".to_string()).into_error_response();
        assert_eq!(response.error.code, "OPERATION_TIMEOUT");
        assert!(response.error.details.is_none());

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("request_id"));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_should_log() {
        assert!(Error::Transport("test".to_string()).should_log());
        assert!(Error::Config("test".to_string()).should_log());
        assert!(!Error::OperationTimeout("test".to_string()).should_log());
        assert!(!Error::Precondition("test".to_string()).should_log());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let sigma_err: Error = err.into();
        assert!(matches!(sigma_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let sigma_err: Error = err.into();
        assert!(matches!(sigma_err, Error::Parse(_)));
    }

    #[test]
    fn test_error_partial_eq() {
        let err1 = Error::Precondition("empty uuid".to_string());
        let err2 = Error::Precondition("empty uuid".to_string());
        let err3 = Error::Precondition("other".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
