pub mod auth;
pub mod headers;
pub mod response;

pub use auth::{authenticate, authorization_gate, extract_bearer_token};
pub use headers::{apply_security_headers, cors_layer};
pub use response::ApiResponse;
