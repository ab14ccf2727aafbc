// routing/mod.rs - Route assembly engine
//
// handler tree (RouteNode) + registry (RouteModule per identifier)
//   → DispatchTable (ordered, collision-free, immutable)
//   → resolve(method, path) per request

pub mod openapi;
pub mod registry;
pub mod segment;
pub mod table;
pub mod tree;

pub use registry::{EntryPoint, Handler, HandlerRegistry, RouteModule, METHOD_ORDER};
pub use segment::{split_request_path, PathParams, PathPattern, PathSegment};
pub use table::{DispatchTable, ResolvedRoute, RouteEntry, RouteError};
pub use tree::{NodeKind, RouteNode};
