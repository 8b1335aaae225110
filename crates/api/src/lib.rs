pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod models;

pub use error::{ApiError, ApiResult};
pub use graph::GraphService;
pub use lifecycle::IndexService;
pub use models::*;

/// Composite trait representing the full codegraph API.
pub trait CodegraphEngine: GraphService + IndexService {}

impl<T> CodegraphEngine for T where T: GraphService + IndexService {}
