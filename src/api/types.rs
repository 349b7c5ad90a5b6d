use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub const MISSING_FILE_MESSAGE: &str = "PDF file required";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Only POST requests are allowed";
pub const NOT_FOUND_MESSAGE: &str = "Endpoint not found. Use /pdf";
pub const FALLBACK_ERROR_MESSAGE: &str = "Error processing PDF";

/// Headers stamped onto every response, preflight or not.
pub const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

pub fn cors_header_values() -> impl Iterator<Item = (HeaderName, HeaderValue)> {
    CORS_HEADERS
        .into_iter()
        .map(|(name, value)| (name, HeaderValue::from_static(value)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: Some(text.into()),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            message: Some(message.into()),
        }
    }
}

/// An envelope paired with the status it is sent under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl RelayResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: Envelope::text(text),
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope: Envelope::message(message),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::failure(StatusCode::BAD_REQUEST, message)
    }

    pub fn missing_file() -> Self {
        Self::bad_request(MISSING_FILE_MESSAGE)
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
