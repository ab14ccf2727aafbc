pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod routing;

pub use app::{build_router, AppContext};
pub use dispatch::RequestContext;
pub use error::{ApiError, BuildError};
pub use middleware::ApiResponse;
pub use routing::{DispatchTable, HandlerRegistry, RouteModule};
