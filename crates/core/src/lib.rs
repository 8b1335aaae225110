//! SCIP ingestion, the per-codebase code graph and the queries over it.

pub mod codebase;
pub mod config;
pub mod error;
pub mod facade;
pub mod logging;
pub mod processor;
pub mod query;
pub mod scip;
pub mod store;

pub use error::{Result, ShenmaError};
pub use facade::CodegraphService;
pub use processor::CodegraphProcessor;
