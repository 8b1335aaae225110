//! Record-at-a-time reader over a SCIP `Index` protobuf stream.
//!
//! The top-level `Index` message is never materialized: each `metadata`,
//! `documents` and `external_symbols` field is decoded on its own and handed
//! to an [`IndexVisitor`].

use std::io::Read;

use protobuf::{CodedInputStream, Message, UnknownFields};
use scip::types::{Document, Metadata, SymbolInformation};
use tracing::warn;

use crate::error::{Result, ShenmaError};

// wire tags: field number << 3 | length-delimited
const METADATA_TAG: u32 = (1 << 3) | 2;
const DOCUMENT_TAG: u32 = (2 << 3) | 2;
const EXTERNAL_SYMBOL_TAG: u32 = (3 << 3) | 2;

pub trait IndexVisitor {
    fn visit_metadata(&mut self, _metadata: Metadata) {}

    fn visit_document(&mut self, _document: Document) {}

    fn visit_external_symbol(&mut self, _symbol: SymbolInformation) {}

    /// Called when one record's payload fails to decode. The record is skipped.
    fn record_error(&mut self, field: &'static str, ordinal: usize, err: protobuf::Error) {
        warn!(field, ordinal, "skipping undecodable scip record: {err}");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub documents: usize,
    pub external_symbols: usize,
    pub skipped: usize,
}

/// Walks the stream once. Framing errors abort; a record whose payload does
/// not decode is reported through [`IndexVisitor::record_error`] and skipped.
pub fn parse_streaming<R: Read>(reader: &mut R, visitor: &mut impl IndexVisitor) -> Result<StreamStats> {
    let mut input = CodedInputStream::new(reader);
    let mut stats = StreamStats::default();

    while let Some(tag) = input.read_raw_tag_or_eof().map_err(framing)? {
        match tag {
            METADATA_TAG => {
                let bytes = input.read_bytes().map_err(framing)?;
                let metadata = Metadata::parse_from_bytes(&bytes)
                    .map_err(|e| ShenmaError::Parse(format!("invalid scip metadata: {e}")))?;
                visitor.visit_metadata(metadata);
            }
            DOCUMENT_TAG => {
                let bytes = input.read_bytes().map_err(framing)?;
                let ordinal = stats.documents;
                stats.documents += 1;
                match Document::parse_from_bytes(&bytes) {
                    Ok(document) => visitor.visit_document(document),
                    Err(e) => {
                        stats.skipped += 1;
                        visitor.record_error("documents", ordinal, e);
                    }
                }
            }
            EXTERNAL_SYMBOL_TAG => {
                let bytes = input.read_bytes().map_err(framing)?;
                let ordinal = stats.external_symbols;
                stats.external_symbols += 1;
                match SymbolInformation::parse_from_bytes(&bytes) {
                    Ok(symbol) => visitor.visit_external_symbol(symbol),
                    Err(e) => {
                        stats.skipped += 1;
                        visitor.record_error("external_symbols", ordinal, e);
                    }
                }
            }
            _ => {
                protobuf::rt::read_unknown_or_skip_group(tag, &mut input, &mut UnknownFields::new())
                    .map_err(framing)?;
            }
        }
    }
    Ok(stats)
}

fn framing(err: protobuf::Error) -> ShenmaError {
    ShenmaError::Parse(format!("corrupt scip stream: {err}"))
}
