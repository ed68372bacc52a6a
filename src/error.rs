//! Error taxonomy for the flight offers API and its user-facing messages.
//!
//! [`ApiError`] is what the API layer returns. [`ApiError::kind`] maps it onto
//! the small [`ErrorKind`] set the UI reasons about, and
//! [`ApiError::user_message`] turns it into text that is safe to show in the
//! status line (never a raw upstream payload).

use serde_json::Value;
use thiserror::Error;

/// Errors produced by the token manager, retry executor and API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad caller input, raised before any network call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Credential exchange failed, or the offer search was rejected twice.
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        /// Status returned by the endpoint, when one was received.
        status: Option<u16>,
        /// Transport failure that prevented the exchange from completing.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Upstream answered 2xx but the body broke the expected shape.
    #[error("Invalid response from flight API: {0}")]
    InvalidResponse(String),

    /// Upstream answered with a non-2xx status.
    #[error("HTTP {status} from flight API")]
    Http { status: u16, body: Option<Value> },

    /// No HTTP response was received (connect failure, timeout, reset).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Classification of an [`ApiError`] as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NetworkError,
    BadRequest,
    AuthError,
    Forbidden,
    NotFound,
    RateLimited,
    ServiceUnavailable,
    InvalidResponse,
    Unknown,
}

impl ApiError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Authentication failure with no transport cause.
    pub fn authentication<S: Into<String>>(message: S, status: Option<u16>) -> Self {
        Self::Authentication {
            message: message.into(),
            status,
            source: None,
        }
    }

    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// HTTP status carried by the error, if the upstream answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Authentication { status, .. } => *status,
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }

    /// Maps the error onto the classifier taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Authentication {
                source: Some(_), ..
            } => ErrorKind::NetworkError,
            Self::Authentication { .. } => ErrorKind::AuthError,
            Self::Http { status, .. } => match status {
                400 => ErrorKind::BadRequest,
                401 => ErrorKind::AuthError,
                403 => ErrorKind::Forbidden,
                404 => ErrorKind::NotFound,
                429 => ErrorKind::RateLimited,
                500 | 502 | 503 => ErrorKind::ServiceUnavailable,
                _ => ErrorKind::Unknown,
            },
        }
    }

    /// Text for the status line. Uses upstream detail where the API offers one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => match self {
                Self::Validation(message) => message.clone(),
                _ => "Please check your search inputs.".to_string(),
            },
            ErrorKind::NetworkError => {
                "Unable to connect. Please check your internet connection.".to_string()
            }
            ErrorKind::BadRequest => self
                .upstream_detail()
                .unwrap_or_else(|| {
                    "Invalid search parameters. Please check your inputs.".to_string()
                }),
            ErrorKind::AuthError => {
                "Authentication failed. Please check your API credentials.".to_string()
            }
            ErrorKind::Forbidden => {
                "Access denied. Your API key may not have the required permissions.".to_string()
            }
            ErrorKind::NotFound => {
                "No flights found for this route. Try different dates or airports.".to_string()
            }
            ErrorKind::RateLimited => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            ErrorKind::ServiceUnavailable => {
                "Service temporarily unavailable. Please try again in a few moments.".to_string()
            }
            ErrorKind::InvalidResponse => {
                "Received an unexpected response from the flight service. Please try again."
                    .to_string()
            }
            ErrorKind::Unknown => self
                .upstream_description()
                .unwrap_or_else(|| "Something went wrong. Please try again.".to_string()),
        }
    }

    fn body(&self) -> Option<&Value> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// `errors[0].detail` from an upstream error document.
    fn upstream_detail(&self) -> Option<String> {
        self.body()?
            .pointer("/errors/0/detail")
            .and_then(Value::as_str)
            .filter(|detail| !detail.is_empty())
            .map(str::to_string)
    }

    /// `error_description` from an OAuth-style error document.
    fn upstream_description(&self) -> Option<String> {
        self.body()?
            .get("error_description")
            .and_then(Value::as_str)
            .filter(|description| !description.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http(status: u16) -> ApiError {
        ApiError::Http { status, body: None }
    }

    #[test]
    fn test_status_table() {
        assert_eq!(http(400).kind(), ErrorKind::BadRequest);
        assert_eq!(http(401).kind(), ErrorKind::AuthError);
        assert_eq!(http(403).kind(), ErrorKind::Forbidden);
        assert_eq!(http(404).kind(), ErrorKind::NotFound);
        assert_eq!(http(429).kind(), ErrorKind::RateLimited);
        for status in [500, 502, 503] {
            assert_eq!(http(status).kind(), ErrorKind::ServiceUnavailable);
        }
        assert_eq!(http(504).kind(), ErrorKind::Unknown);
        assert_eq!(http(418).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_non_http_kinds() {
        assert_eq!(
            ApiError::validation("missing origin").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ApiError::invalid_response("data is not an array").kind(),
            ErrorKind::InvalidResponse
        );
        assert_eq!(
            ApiError::authentication("rejected", Some(401)).kind(),
            ErrorKind::AuthError
        );
    }

    #[test]
    fn test_bad_request_prefers_upstream_detail() {
        let err = ApiError::Http {
            status: 400,
            body: Some(json!({
                "errors": [{ "status": 400, "detail": "departureDate cannot be in the past" }]
            })),
        };
        assert_eq!(err.user_message(), "departureDate cannot be in the past");

        assert!(http(400).user_message().starts_with("Invalid search parameters"));
    }

    #[test]
    fn test_unknown_prefers_error_description() {
        let err = ApiError::Http {
            status: 418,
            body: Some(json!({ "error": "teapot", "error_description": "Short and stout" })),
        };
        assert_eq!(err.user_message(), "Short and stout");
        assert_eq!(
            http(418).user_message(),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn test_user_messages() {
        assert!(http(401).user_message().contains("Authentication failed"));
        assert!(http(403).user_message().contains("Access denied"));
        assert!(http(404).user_message().contains("No flights found"));
        assert!(http(429).user_message().contains("Too many requests"));
        assert!(http(503).user_message().contains("temporarily unavailable"));
        assert_eq!(
            ApiError::validation("Please fill in all search fields").user_message(),
            "Please fill in all search fields"
        );
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(http(429).status(), Some(429));
        assert_eq!(ApiError::authentication("no creds", None).status(), None);
        assert_eq!(ApiError::validation("x").status(), None);
        assert!(http(401).is_unauthorized());
        assert!(!ApiError::authentication("x", Some(401)).is_unauthorized());
    }
}
