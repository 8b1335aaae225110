use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use scip::types::{Document as ScipDocument, Metadata, SymbolInformation};
use shenma_api::models::{Document, KeyRange, KeySet, Relation, RelationType, Symbol};
use tracing::{debug, info, warn};

use super::canonical::{canonicalize_document, flatten_documents};
use super::stream::{IndexVisitor, StreamStats, parse_streaming};
use super::symbol::{build_symbol, describe, is_local, occurrence_role, relationship_type};
use crate::codebase::{self, CodebaseStore};
use crate::error::{Result, ShenmaError};
use crate::store::{GraphStore, keys};

/// Output of the first pass. Read-only once built.
#[derive(Debug, Default)]
pub struct ScipMetadata {
    pub metadata: Option<Metadata>,
    pub external_symbols_by_name: HashMap<String, SymbolInformation>,
    pub all_definition_occurrences: HashMap<String, Symbol>,
    pub doc_count_by_path: HashMap<String, usize>,
}

impl IndexVisitor for ScipMetadata {
    fn visit_metadata(&mut self, metadata: Metadata) {
        if self.metadata.is_none() {
            self.metadata = Some(metadata);
        }
    }

    fn visit_document(&mut self, document: ScipDocument) {
        *self
            .doc_count_by_path
            .entry(document.relative_path.clone())
            .or_default() += 1;
        for occ in &document.occurrences {
            if occ.symbol.is_empty() || is_local(&occ.symbol) {
                continue;
            }
            if occurrence_role(occ) != RelationType::Definition {
                continue;
            }
            if let Some(symbol) = build_symbol(occ, &document.relative_path) {
                self.all_definition_occurrences
                    .insert(occ.symbol.clone(), symbol);
            }
        }
    }

    fn visit_external_symbol(&mut self, symbol: SymbolInformation) {
        self.external_symbols_by_name
            .insert(symbol.symbol.clone(), symbol);
    }
}

/// Normalized graph content of one SCIP index.
#[derive(Debug, Default)]
pub struct ParsedIndex {
    pub tool_name: Option<String>,
    pub documents: Vec<Document>,
    pub symbol_keys: HashMap<String, KeySet>,
    /// Paths whose duplicate documents could not be merged into one.
    pub dropped_paths: Vec<String>,
    pub stats: StreamStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub documents: usize,
    pub symbol_names: usize,
    pub dropped_paths: Vec<String>,
    pub skipped_records: usize,
    pub elapsed_ms: u128,
}

/// Second pass: merges duplicate paths and resolves edges document by document.
struct DocumentResolver<'a> {
    meta: &'a ScipMetadata,
    pending_duplicates: HashMap<String, Vec<ScipDocument>>,
    relations_by_identifier: IndexMap<String, IndexSet<Relation>>,
    documents: Vec<Document>,
    dropped_paths: Vec<String>,
}

impl<'a> DocumentResolver<'a> {
    fn new(meta: &'a ScipMetadata) -> Self {
        Self {
            meta,
            pending_duplicates: HashMap::new(),
            relations_by_identifier: IndexMap::new(),
            documents: Vec::new(),
            dropped_paths: Vec::new(),
        }
    }

    fn add_missing_external_symbols(&self, document: &mut ScipDocument) {
        let mut known: HashSet<String> = document.symbols.iter().map(|s| s.symbol.clone()).collect();
        let mut referenced: Vec<String> = document
            .occurrences
            .iter()
            .map(|o| o.symbol.clone())
            .collect();
        referenced.extend(
            document
                .symbols
                .iter()
                .flat_map(|s| s.relationships.iter().map(|r| r.symbol.clone())),
        );

        for identifier in referenced {
            if identifier.is_empty()
                || is_local(&identifier)
                || known.contains(&identifier)
                || self.meta.all_definition_occurrences.contains_key(&identifier)
            {
                continue;
            }
            if let Some(external) = self.meta.external_symbols_by_name.get(&identifier) {
                document.symbols.push(external.clone());
                known.insert(identifier);
            }
        }
    }

    /// Declared relationships of one symbol, resolved against the
    /// definition table. Unresolved targets keep no location.
    fn resolve_relationships(&self, info: &SymbolInformation) -> Vec<Relation> {
        let mut relations = Vec::with_capacity(info.relationships.len());
        for rel in &info.relationships {
            if rel.symbol.is_empty() || is_local(&rel.symbol) {
                continue;
            }
            let Some(relation_type) = relationship_type(rel) else {
                debug!(symbol = %info.symbol, target = %rel.symbol, "relationship without kind");
                continue;
            };
            relations.push(match self.meta.all_definition_occurrences.get(&rel.symbol) {
                Some(target) => target.as_relation(relation_type),
                None => Relation {
                    identifier: rel.symbol.clone(),
                    name: describe(&rel.symbol).name,
                    file_path: None,
                    range: None,
                    relation_type,
                },
            });
        }
        relations
    }

    fn process_document(&mut self, mut document: ScipDocument) {
        self.add_missing_external_symbols(&mut document);
        canonicalize_document(&mut document);
        let path = document.relative_path.clone();

        // Relationships of project definitions go to the shared definition
        // record. Symbols without a project definition (injected externals)
        // have no such record, so their relationships ride on this
        // document's occurrences of them.
        let mut occurrence_relations: HashMap<&str, Vec<Relation>> = HashMap::new();
        for info in &document.symbols {
            if info.symbol.is_empty() || is_local(&info.symbol) {
                continue;
            }
            let relations = self.resolve_relationships(info);
            if relations.is_empty() {
                continue;
            }
            if self.meta.all_definition_occurrences.contains_key(&info.symbol) {
                self.relations_by_identifier
                    .entry(info.symbol.clone())
                    .or_default()
                    .extend(relations);
            } else {
                occurrence_relations
                    .entry(info.symbol.as_str())
                    .or_default()
                    .extend(relations);
            }
        }

        // occurrences: definitions keep their own record, references get a
        // reference -> definition edge and feed the definition's back edge
        let mut symbols = Vec::with_capacity(document.occurrences.len());
        for occ in &document.occurrences {
            if occ.symbol.is_empty() || is_local(&occ.symbol) {
                continue;
            }
            let Some(mut symbol) = build_symbol(occ, &path) else {
                debug!(path = %path, symbol = %occ.symbol, "skipping occurrence with malformed range");
                continue;
            };
            if symbol.role != RelationType::Definition {
                if let Some(definition) = self.meta.all_definition_occurrences.get(&occ.symbol) {
                    symbol
                        .relations
                        .push(definition.as_relation(RelationType::Definition));
                    self.relations_by_identifier
                        .entry(occ.symbol.clone())
                        .or_default()
                        .insert(symbol.as_relation(RelationType::Reference));
                }
            }
            if let Some(declared) = occurrence_relations.get(occ.symbol.as_str()) {
                symbol.relations.extend(declared.iter().cloned());
            }
            symbols.push(symbol);
        }

        self.documents.push(Document { path, symbols });
    }

    /// Attaches the accumulated edges to every definition record.
    fn finish(self) -> (Vec<Document>, Vec<String>) {
        let Self {
            mut documents,
            relations_by_identifier,
            mut dropped_paths,
            pending_duplicates,
            ..
        } = self;

        for (path, buffered) in pending_duplicates {
            warn!(
                path = %path,
                buffered = buffered.len(),
                "incomplete duplicate document set at end of stream, dropping path"
            );
            dropped_paths.push(path);
        }

        documents.par_iter_mut().for_each(|doc| {
            for symbol in doc.symbols.iter_mut().filter(|s| s.is_definition()) {
                if let Some(edges) = relations_by_identifier.get(&symbol.identifier) {
                    symbol.relations = edges.iter().cloned().collect();
                }
            }
        });
        dropped_paths.sort();
        (documents, dropped_paths)
    }
}

impl IndexVisitor for DocumentResolver<'_> {
    fn visit_document(&mut self, document: ScipDocument) {
        let path = document.relative_path.clone();
        let expected = self.meta.doc_count_by_path.get(&path).copied().unwrap_or(1);
        if expected <= 1 {
            self.process_document(document);
            return;
        }

        let buffered = self.pending_duplicates.entry(path.clone()).or_default();
        buffered.push(document);
        if buffered.len() < expected {
            return;
        }
        let buffered = self.pending_duplicates.remove(&path).unwrap_or_default();
        let mut merged = flatten_documents(buffered);
        if merged.len() != 1 {
            warn!(path = %path, results = merged.len(), "duplicate documents did not merge into one, dropping path");
            self.dropped_paths.push(path);
            return;
        }
        if let Some(document) = merged.pop() {
            self.process_document(document);
        }
    }
}

/// Name index over the definitions of the persisted documents.
pub fn build_symbol_keys(documents: &[Document]) -> HashMap<String, KeySet> {
    let mut keys: HashMap<String, KeySet> = HashMap::new();
    for doc in documents {
        let doc_key = keys::doc_key(&doc.path);
        for symbol in doc.symbols.iter().filter(|s| s.is_definition()) {
            if symbol.name.is_empty() {
                continue;
            }
            keys.entry(symbol.name.clone()).or_default().merge(KeySet {
                keys: vec![KeyRange {
                    doc_key: doc_key.clone(),
                    range: symbol.range,
                }],
            });
        }
    }
    keys
}

/// Pass 1. Leaves the reader rewound to offset 0.
pub fn prepare_visit<R: Read + Seek>(reader: &mut R) -> Result<ScipMetadata> {
    let mut meta = ScipMetadata::default();
    parse_streaming(reader, &mut meta)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(meta)
}

/// Both passes over a seekable stream.
pub fn parse_index<R: Read + Seek>(reader: &mut R) -> Result<ParsedIndex> {
    let meta = prepare_visit(reader)?;
    debug!(
        definitions = meta.all_definition_occurrences.len(),
        externals = meta.external_symbols_by_name.len(),
        paths = meta.doc_count_by_path.len(),
        "scip prepare pass done"
    );

    let mut resolver = DocumentResolver::new(&meta);
    let stats = parse_streaming(reader, &mut resolver)?;
    let (documents, dropped_paths) = resolver.finish();
    let symbol_keys = build_symbol_keys(&documents);

    Ok(ParsedIndex {
        tool_name: meta
            .metadata
            .as_ref()
            .map(|m| m.tool_info.name.clone())
            .filter(|n| !n.is_empty()),
        documents,
        symbol_keys,
        dropped_paths,
        stats,
    })
}

/// Copies a forward-only stream to an anonymous temp file and parses that.
pub fn parse_unseekable<R: Read>(mut reader: R) -> Result<ParsedIndex> {
    let mut spooled = tempfile::tempfile()?;
    io::copy(&mut reader, &mut spooled)?;
    spooled.seek(SeekFrom::Start(0))?;
    parse_index(&mut spooled)
}

pub struct IndexParser {
    codebase_store: Arc<dyn CodebaseStore>,
}

impl IndexParser {
    pub fn new(codebase_store: Arc<dyn CodebaseStore>) -> Self {
        Self { codebase_store }
    }

    pub fn parse_file(&self, scip_path: &Path) -> Result<ParsedIndex> {
        let len = match self.codebase_store.file_len(scip_path) {
            Ok(len) => len,
            Err(ShenmaError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShenmaError::Parse(format!(
                    "SCIP file does not exist: {}",
                    scip_path.display()
                )));
            }
            Err(e) => {
                return Err(ShenmaError::Parse(format!(
                    "failed to stat SCIP file {}: {e}",
                    scip_path.display()
                )));
            }
        };
        if len == 0 {
            return Err(ShenmaError::Parse(format!(
                "empty SCIP file: {}",
                scip_path.display()
            )));
        }
        let mut reader = io::BufReader::new(self.codebase_store.open(scip_path)?);
        parse_index(&mut reader)
    }

    /// Parses `<codebase>/.shenma/index.scip` (or `scip_path`) and replaces
    /// the stored graph with its documents and name index. Nothing is
    /// written unless the whole stream parsed.
    pub fn process_index_file(
        &self,
        codebase: &Path,
        scip_path: Option<&Path>,
        graph: &dyn GraphStore,
    ) -> Result<ParseReport> {
        let started = Instant::now();
        let default_path = codebase::scip_file_path(codebase);
        let scip_path = scip_path.unwrap_or(&default_path);

        let parsed = self.parse_file(scip_path)?;
        info!(
            codebase = %codebase.display(),
            tool = parsed.tool_name.as_deref().unwrap_or("-"),
            documents = parsed.documents.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "scip index parsed"
        );

        graph.replace_all(&parsed.documents, &parsed.symbol_keys)?;

        let report = ParseReport {
            documents: parsed.documents.len(),
            symbol_names: parsed.symbol_keys.len(),
            dropped_paths: parsed.dropped_paths,
            skipped_records: parsed.stats.skipped,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            codebase = %codebase.display(),
            documents = report.documents,
            symbol_names = report.symbol_names,
            dropped = report.dropped_paths.len(),
            elapsed_ms = report.elapsed_ms,
            "scip index saved"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuf::{Enum, Message};
    use scip::types::{Index, Occurrence, Relationship, SymbolRole};
    use std::io::Cursor;

    const FOO: &str = "scip-go gomod example.com/app v1 `example.com/app`/Foo().";
    const BAR: &str = "scip-go gomod example.com/app v1 `example.com/app`/Bar#";
    const IFACE: &str = "scip-go gomod example.com/app v1 `example.com/app`/Runner#";
    const PRINTLN: &str = "scip-go gomod github.com/golang/go/src go1.22 fmt/Println().";

    fn occ(symbol: &str, range: &[i32], definition: bool) -> Occurrence {
        let mut o = Occurrence::new();
        o.symbol = symbol.into();
        o.range = range.to_vec();
        if definition {
            o.symbol_roles = SymbolRole::Definition.value();
        }
        o
    }

    fn doc(path: &str, occurrences: Vec<Occurrence>) -> ScipDocument {
        let mut d = ScipDocument::new();
        d.relative_path = path.into();
        d.occurrences = occurrences;
        d
    }

    fn encode(documents: Vec<ScipDocument>, externals: Vec<SymbolInformation>) -> Cursor<Vec<u8>> {
        let mut index = Index::new();
        index.documents = documents;
        index.external_symbols = externals;
        Cursor::new(index.write_to_bytes().unwrap())
    }

    #[test]
    fn reference_and_definition_are_linked_both_ways() {
        let a = doc("a.go", vec![occ(FOO, &[2, 5, 8], true)]);
        let b = doc("b.go", vec![occ(FOO, &[7, 1, 4], false), occ(FOO, &[9, 1, 4], false)]);
        let parsed = parse_index(&mut encode(vec![a, b], vec![])).unwrap();

        let def = &parsed.documents[0].symbols[0];
        assert!(def.is_definition());
        let refs: Vec<_> = def
            .relations
            .iter()
            .filter(|r| r.relation_type == RelationType::Reference)
            .collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].file_path.as_deref(), Some("b.go"));

        for reference in &parsed.documents[1].symbols {
            let to_def: Vec<_> = reference
                .relations
                .iter()
                .filter(|r| r.relation_type == RelationType::Definition)
                .collect();
            assert_eq!(to_def.len(), 1);
            assert_eq!(to_def[0].file_path.as_deref(), Some("a.go"));
            assert_eq!(to_def[0].range, Some(def.range));
            assert!(def.relations.contains(&reference.as_relation(RelationType::Reference)));
        }
    }

    #[test]
    fn local_symbols_never_enter_the_graph() {
        let a = doc(
            "a.go",
            vec![occ("local 1", &[1, 0, 1], true), occ("local 1", &[3, 0, 1], false)],
        );
        let mut reader = encode(vec![a], vec![]);
        let meta = prepare_visit(&mut reader).unwrap();
        assert!(meta.all_definition_occurrences.is_empty());

        let parsed = parse_index(&mut reader).unwrap();
        assert_eq!(parsed.documents.len(), 1);
        assert!(parsed.documents[0].symbols.is_empty());
        assert!(parsed.symbol_keys.is_empty());
    }

    #[test]
    fn duplicate_paths_produce_one_document() {
        let first = doc("a.go", vec![occ(FOO, &[2, 5, 8], true)]);
        let second = doc("a.go", vec![occ(FOO, &[2, 5, 8], true), occ(BAR, &[4, 0, 3], true)]);
        let other = doc("b.go", vec![occ(FOO, &[1, 0, 3], false)]);
        let parsed = parse_index(&mut encode(vec![first, other, second], vec![])).unwrap();

        let paths: Vec<&str> = parsed.documents.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["b.go", "a.go"]);
        assert_eq!(parsed.documents[1].symbols.len(), 2);
        assert!(parsed.dropped_paths.is_empty());
    }

    #[test]
    fn declared_relationships_attach_to_the_definition() {
        let mut a = doc(
            "a.go",
            vec![occ(BAR, &[4, 5, 8], true), occ(IFACE, &[1, 5, 11], true)],
        );
        let mut info = SymbolInformation::new();
        info.symbol = BAR.into();
        let mut implements = Relationship::new();
        implements.symbol = IFACE.into();
        implements.is_implementation = true;
        let mut printer = Relationship::new();
        printer.symbol = PRINTLN.into();
        printer.is_reference = true;
        info.relationships = vec![implements, printer];
        a.symbols.push(info);

        let parsed = parse_index(&mut encode(vec![a], vec![])).unwrap();
        let bar = parsed.documents[0]
            .symbols
            .iter()
            .find(|s| s.identifier == BAR)
            .unwrap();
        let implementation = bar
            .relations
            .iter()
            .find(|r| r.relation_type == RelationType::Implementation)
            .unwrap();
        assert_eq!(implementation.name, "Runner");
        assert_eq!(implementation.range, Some(shenma_api::Range::new(1, 5, 1, 11)));

        let external = bar.relations.iter().find(|r| r.identifier == PRINTLN).unwrap();
        assert!(!external.has_location());
        assert_eq!(external.name, "Println");
    }

    #[test]
    fn external_symbols_are_injected_into_referencing_documents() {
        let mut ext = SymbolInformation::new();
        ext.symbol = PRINTLN.into();
        ext.documentation = vec!["prints".into()];
        let a = doc("a.go", vec![occ(PRINTLN, &[3, 4, 11], false)]);

        let mut reader = encode(vec![a.clone()], vec![ext]);
        let meta = prepare_visit(&mut reader).unwrap();
        assert!(meta.external_symbols_by_name.contains_key(PRINTLN));

        let resolver = DocumentResolver::new(&meta);
        let mut injected = a;
        resolver.add_missing_external_symbols(&mut injected);
        assert_eq!(injected.symbols.len(), 1);
        assert_eq!(injected.symbols[0].documentation, vec!["prints"]);
    }

    #[test]
    fn external_relationships_reach_the_referencing_occurrences() {
        let mut ext = SymbolInformation::new();
        ext.symbol = PRINTLN.into();
        let mut implements = Relationship::new();
        implements.symbol = IFACE.into();
        implements.is_implementation = true;
        ext.relationships = vec![implements];

        let a = doc("a.go", vec![occ(IFACE, &[1, 5, 11], true)]);
        let b = doc(
            "b.go",
            vec![occ(PRINTLN, &[3, 4, 11], false), occ(PRINTLN, &[6, 4, 11], false)],
        );
        let parsed = parse_index(&mut encode(vec![a, b], vec![ext])).unwrap();

        let uses: Vec<&Symbol> = parsed.documents[1]
            .symbols
            .iter()
            .filter(|s| s.identifier == PRINTLN)
            .collect();
        assert_eq!(uses.len(), 2);
        for symbol in uses {
            let edge = symbol
                .relations
                .iter()
                .find(|r| r.relation_type == RelationType::Implementation)
                .unwrap();
            assert_eq!(edge.identifier, IFACE);
            assert_eq!(edge.file_path.as_deref(), Some("a.go"));
            assert_eq!(edge.range, Some(shenma_api::Range::new(1, 5, 1, 11)));
        }
        // the external is not a project definition, so nothing else changes
        assert!(parsed.documents[0].symbols[0].relations.is_empty());
        assert!(!parsed.symbol_keys.contains_key("Println"));
    }

    #[test]
    fn name_index_lists_each_definition_once() {
        let a = doc("a.go", vec![occ(FOO, &[2, 5, 8], true)]);
        let b = doc("pkg/b.go", vec![occ(FOO, &[7, 1, 4], false)]);
        let parsed = parse_index(&mut encode(vec![a, b], vec![])).unwrap();
        let foo = &parsed.symbol_keys["Foo"];
        assert_eq!(foo.len(), 1);
        assert_eq!(foo.keys[0].doc_key, keys::doc_key("a.go"));
    }

    #[test]
    fn unseekable_input_is_spooled() {
        let a = doc("a.go", vec![occ(FOO, &[2, 5, 8], true)]);
        let bytes = encode(vec![a], vec![]).into_inner();
        let parsed = parse_unseekable(&bytes[..]).unwrap();
        assert_eq!(parsed.documents.len(), 1);
    }
}
