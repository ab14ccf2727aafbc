// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    MissingCredentials(String),
    InvalidCredentials(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    RouteNotFound(String),
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed {
        message: String,
        allowed: Vec<Method>,
    },

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 422 Unprocessable Entity
    MalformedBody(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 500 Internal Server Error
    InternalServerError(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::MissingCredentials(_) => 401,
            ApiError::InvalidCredentials(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::RouteNotFound(_) => 404,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed { .. } => 405,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::MalformedBody(_) => 422,
            ApiError::ValidationError { .. } => 422,
            ApiError::InternalServerError(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::MissingCredentials(msg) => msg,
            ApiError::InvalidCredentials(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::RouteNotFound(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed { message, .. } => message,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::MalformedBody(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["field_errors"] = json!(field_errors);
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::MissingCredentials(_) => "MISSING_CREDENTIALS",
            ApiError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::MalformedBody(_) => "MALFORMED_BODY",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    /// 401 for a request that carried no credentials at all.
    pub fn missing_credentials() -> Self {
        ApiError::MissingCredentials("Authentication credentials were not provided".to_string())
    }

    /// 401 for any credential that failed verification. The message never
    /// says why: expired, badly signed and wrong-kind tokens all look alike.
    pub fn invalid_credentials() -> Self {
        ApiError::InvalidCredentials("Authentication credentials are invalid".to_string())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn route_not_found(path: &str) -> Self {
        ApiError::RouteNotFound(format!("No route matches '{}'", path))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn method_not_allowed(method: &Method, path: &str, allowed: Vec<Method>) -> Self {
        ApiError::MethodNotAllowed {
            message: format!("Method {} is not allowed for '{}'", method, path),
            allowed,
        }
    }

    pub fn payload_too_large(limit: usize) -> Self {
        ApiError::PayloadTooLarge(format!("Request body exceeds {} bytes", limit))
    }

    pub fn malformed_body(message: impl Into<String>) -> Self {
        ApiError::MalformedBody(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.to_json())).into_response();

        if let ApiError::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }

        response
    }
}

/// Failures while assembling the application at startup. None of these are
/// recoverable: the process must not serve traffic after one.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("route collision: {method} {pattern} is defined by both '{first}' and '{second}'")]
    RouteCollision {
        method: Method,
        pattern: String,
        first: String,
        second: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl BuildError {
    pub fn config(message: impl Into<String>) -> Self {
        BuildError::Config(message.into())
    }
}
