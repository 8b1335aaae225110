//! SCIP index generation and ingestion.

pub mod canonical;
pub mod command;
pub mod generator;
pub mod parser;
pub mod stream;
pub mod symbol;

pub use command::{CommandExecutor, RenderedCommand, render_command, replace_placeholders};
pub use generator::IndexGenerator;
pub use parser::{
    IndexParser, ParseReport, ParsedIndex, ScipMetadata, build_symbol_keys, parse_index,
    parse_unseekable, prepare_visit,
};
pub use stream::{IndexVisitor, StreamStats, parse_streaming};
