pub mod graph;
pub mod language;
pub mod query;
pub mod symbol;
pub mod sync;
pub mod util;

pub use graph::*;
pub use language::*;
pub use query::*;
pub use symbol::*;
pub use sync::*;
