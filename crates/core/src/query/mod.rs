pub mod content;
pub mod engine;

pub use content::{CodebaseContent, ContentSource};
pub use engine::QueryEngine;
