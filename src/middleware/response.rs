use axum::{
    http::{header::IntoHeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

/// Structured handler response: status, headers and a JSON body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiResponse {
    /// 200 with the `{"success": true, "data": ...}` envelope
    pub fn success(data: impl Serialize) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    /// Envelope with a custom status code
    pub fn with_status(data: impl Serialize, status: StatusCode) -> Self {
        match serde_json::to_value(&data) {
            Ok(value) => Self::json(json!({ "success": true, "data": value })).status(status),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                Self::json(json!({
                    "success": false,
                    "error": "Failed to serialize response data"
                }))
                .status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// 201 Created with the envelope
    pub fn created(data: impl Serialize) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// Raw JSON body, no envelope
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: impl IntoHeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) if self.status != StatusCode::NO_CONTENT => (self.status, Json(body)).into_response(),
            _ => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}
