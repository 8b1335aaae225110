use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use shenma_api::models::{
    DefinitionNode, DefinitionQuery, Document, GraphNode, NodeType, Position, Range, Relation,
    RelationQuery, RelationType, StructureItem, StructureQuery, Symbol, SymbolKind,
};
use tracing::debug;

use super::content::ContentSource;
use crate::error::{Result, ShenmaError};
use crate::store::{GraphStore, keys};

/// Documents loaded during one query, keyed by document key.
struct DocumentCache<'a> {
    store: &'a dyn GraphStore,
    docs: HashMap<String, Option<Arc<Document>>>,
}

impl<'a> DocumentCache<'a> {
    fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            docs: HashMap::new(),
        }
    }

    fn by_key(&mut self, doc_key: &str) -> Result<Option<Arc<Document>>> {
        if let Some(doc) = self.docs.get(doc_key) {
            return Ok(doc.clone());
        }
        let doc = self.store.get_document_by_key(doc_key)?.map(Arc::new);
        self.docs.insert(doc_key.to_string(), doc.clone());
        Ok(doc)
    }

    fn by_path(&mut self, path: &str) -> Result<Option<Arc<Document>>> {
        self.by_key(&keys::doc_key(path))
    }

    /// Symbol an edge points at: same range, preferring the same identifier.
    fn target_of(&mut self, relation: &Relation) -> Result<Option<Symbol>> {
        let (Some(path), Some(range)) = (&relation.file_path, relation.range) else {
            return Ok(None);
        };
        let Some(doc) = self.by_path(path)? else {
            return Ok(None);
        };
        let found = doc
            .symbols
            .iter()
            .find(|s| s.range == range && s.identifier == relation.identifier)
            .or_else(|| doc.symbol_at(&range));
        Ok(found.cloned())
    }
}

/// Tree node before children are assembled.
struct FlatNode {
    file_path: String,
    symbol_name: String,
    identifier: String,
    range: Range,
    node_type: NodeType,
    children: Vec<usize>,
}

impl FlatNode {
    fn from_symbol(symbol: &Symbol, node_type: NodeType) -> Self {
        Self {
            file_path: symbol.path.clone(),
            symbol_name: symbol.name.clone(),
            identifier: symbol.identifier.clone(),
            range: symbol.range,
            node_type,
            children: Vec::new(),
        }
    }
}

/// Read-only queries over one graph store.
pub struct QueryEngine<'a> {
    store: &'a dyn GraphStore,
    content: Option<&'a dyn ContentSource>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            content: None,
        }
    }

    pub fn with_content(mut self, content: &'a dyn ContentSource) -> Self {
        self.content = Some(content);
        self
    }

    /// Relation trees rooted at the symbols matching the query, expanded
    /// breadth-first up to `max_layer` edges. A `(path, range)` location
    /// appears at most once across all returned trees.
    pub fn relations(&self, query: &RelationQuery) -> Result<Vec<GraphNode>> {
        query
            .validate()
            .map_err(|e| ShenmaError::InvalidArgument(e.to_string()))?;

        let mut cache = DocumentCache::new(self.store);
        let roots = self.resolve_start_symbols(query, &mut cache)?;

        let mut visited: HashSet<(String, Range)> = HashSet::new();
        let mut arena: Vec<FlatNode> = Vec::new();
        let mut root_ids = Vec::new();
        let mut queue: VecDeque<(usize, Symbol, usize)> = VecDeque::new();

        for root in roots {
            if !visited.insert((root.path.clone(), root.range)) {
                continue;
            }
            arena.push(FlatNode::from_symbol(&root, NodeType::from(root.role)));
            let id = arena.len() - 1;
            root_ids.push(id);
            queue.push_back((id, root, 0));
        }

        while let Some((parent, symbol, depth)) = queue.pop_front() {
            if depth >= query.max_layer {
                continue;
            }
            for relation in &symbol.relations {
                let (Some(path), Some(range)) = (&relation.file_path, relation.range) else {
                    continue;
                };
                if !visited.insert((path.clone(), range)) {
                    continue;
                }
                let target = cache.target_of(relation)?;
                let node = FlatNode {
                    file_path: path.clone(),
                    symbol_name: target
                        .as_ref()
                        .map(|t| t.name.clone())
                        .unwrap_or_else(|| relation.name.clone()),
                    identifier: relation.identifier.clone(),
                    range,
                    node_type: NodeType::from(relation.relation_type),
                    children: Vec::new(),
                };
                arena.push(node);
                let id = arena.len() - 1;
                arena[parent].children.push(id);
                match target {
                    Some(t) => queue.push_back((id, t, depth + 1)),
                    None => debug!(path = %path, "edge target not stored, leaf node"),
                }
            }
        }

        let include_content = query.include_content;
        Ok(root_ids
            .into_iter()
            .map(|id| self.assemble(&arena, id, include_content))
            .collect())
    }

    fn assemble(&self, arena: &[FlatNode], id: usize, include_content: bool) -> GraphNode {
        let node = &arena[id];
        GraphNode {
            file_path: node.file_path.clone(),
            symbol_name: node.symbol_name.clone(),
            identifier: node.identifier.clone(),
            position: Position::from(node.range),
            content: if include_content {
                self.content_of(&node.file_path, &node.range)
            } else {
                None
            },
            node_type: node.node_type,
            children: node
                .children
                .iter()
                .map(|child| self.assemble(arena, *child, include_content))
                .collect(),
        }
    }

    fn content_of(&self, path: &str, range: &Range) -> Option<String> {
        self.content.and_then(|c| c.read_range(path, range))
    }

    /// Location match inside the named file first, then the name index.
    fn resolve_start_symbols(
        &self,
        query: &RelationQuery,
        cache: &mut DocumentCache<'_>,
    ) -> Result<Vec<Symbol>> {
        let name = query.symbol_name();

        if let Some(doc) = cache.by_path(&query.file_path)? {
            let hits: Vec<Symbol> = match query.start_position() {
                Some((line, col)) => doc
                    .symbols
                    .iter()
                    .filter(|s| {
                        if query.start_column == 0 {
                            s.range.start_line == line
                        } else {
                            s.range.contains(line, col)
                        }
                    })
                    .filter(|s| name.is_none_or(|n| s.name == n))
                    .cloned()
                    .collect(),
                None => doc
                    .symbols
                    .iter()
                    .filter(|s| name.is_some_and(|n| s.name == n))
                    .cloned()
                    .collect(),
            };
            if !hits.is_empty() {
                return Ok(hits);
            }
        }

        let mut roots = Vec::new();
        if let Some(name) = name {
            if let Some(set) = self.store.get_key_set(name)? {
                for key in set.keys {
                    let Some(doc) = cache.by_key(&key.doc_key)? else {
                        continue;
                    };
                    if let Some(symbol) = doc
                        .symbols
                        .iter()
                        .find(|s| s.range == key.range && s.is_definition())
                    {
                        roots.push(symbol.clone());
                    }
                }
            }
        }

        if roots.is_empty() {
            return Err(ShenmaError::NotFound(format!(
                "no symbol at {}:{}:{}{}",
                query.file_path,
                query.start_line,
                query.start_column,
                name.map(|n| format!(" named {n}")).unwrap_or_default()
            )));
        }
        Ok(roots)
    }

    /// Every symbol of one document as a flat outline.
    pub fn structure(&self, query: &StructureQuery) -> Result<Vec<StructureItem>> {
        query
            .validate()
            .map_err(|e| ShenmaError::InvalidArgument(e.to_string()))?;
        let doc = self
            .store
            .get_document(&query.file_path)?
            .ok_or_else(|| ShenmaError::NotFound(format!("no document for {}", query.file_path)))?;

        Ok(doc
            .symbols
            .iter()
            .map(|symbol| StructureItem {
                name: symbol.name.clone(),
                item_type: item_type(symbol).to_string(),
                position: Position::from(symbol.range),
                content: self.content_of(&symbol.path, &symbol.range),
            })
            .collect())
    }
}

impl QueryEngine<'_> {
    /// Definitions reached from the symbols of a line span (each reference
    /// contributes its definition edges, a definition itself), or the stored
    /// definitions of `symbol_names`. Locations are unique in the result.
    pub fn definitions(&self, query: &DefinitionQuery) -> Result<Vec<DefinitionNode>> {
        query
            .validate()
            .map_err(|e| ShenmaError::InvalidArgument(e.to_string()))?;

        let mut cache = DocumentCache::new(self.store);
        let span = query.line_span();
        let in_span =
            |line: usize| span.is_some_and(|(start, end)| line >= start && line <= end);

        let names: Vec<String> = query.names().map(str::to_string).collect();
        let found: Vec<Symbol> = if names.is_empty() {
            let doc = cache
                .by_path(&query.file_path)?
                .ok_or_else(|| ShenmaError::NotFound(format!("no document for {}", query.file_path)))?;
            doc.symbols
                .iter()
                .filter(|s| in_span(s.range.start_line))
                .cloned()
                .collect()
        } else {
            let by_name = self.store.search_symbol_names(&names)?;
            let mut found = Vec::new();
            for name in &names {
                for key in by_name.get(name).into_iter().flatten() {
                    let Some(doc) = cache.by_key(&key.doc_key)? else {
                        debug!(doc_key = %key.doc_key, "name index points at a missing document");
                        continue;
                    };
                    match doc.symbols.iter().find(|s| s.range == key.range && s.is_definition()) {
                        // definitions inside the queried span are not "used" there
                        Some(s) if s.path == query.file_path && in_span(s.range.start_line) => {}
                        Some(s) => found.push(s.clone()),
                        None => debug!(doc_key = %key.doc_key, "no definition at indexed range"),
                    }
                }
            }
            found
        };

        let mut seen: HashSet<(String, Range)> = HashSet::new();
        let mut out = Vec::new();
        for symbol in &found {
            match symbol.role {
                RelationType::Definition => {
                    if seen.insert((symbol.path.clone(), symbol.range)) {
                        out.push(self.definition_node(
                            &symbol.path,
                            &symbol.name,
                            &symbol.identifier,
                            symbol.range,
                            query.include_content,
                        ));
                    }
                }
                RelationType::Reference => {
                    for relation in symbol
                        .relations
                        .iter()
                        .filter(|r| r.relation_type == RelationType::Definition)
                    {
                        let (Some(path), Some(range)) = (&relation.file_path, relation.range) else {
                            continue;
                        };
                        if !seen.insert((path.clone(), range)) {
                            continue;
                        }
                        let name = match cache.target_of(relation)? {
                            Some(target) => target.name,
                            None => relation.name.clone(),
                        };
                        out.push(self.definition_node(
                            path,
                            &name,
                            &relation.identifier,
                            range,
                            query.include_content,
                        ));
                    }
                }
                other => debug!(symbol = %symbol.identifier, role = ?other, "not a definition source"),
            }
        }
        Ok(out)
    }

    fn definition_node(
        &self,
        path: &str,
        name: &str,
        identifier: &str,
        range: Range,
        include_content: bool,
    ) -> DefinitionNode {
        DefinitionNode {
            file_path: path.to_string(),
            name: name.to_string(),
            identifier: identifier.to_string(),
            position: Position::from(range),
            content: if include_content {
                self.content_of(path, &range)
            } else {
                None
            },
        }
    }
}

fn item_type(symbol: &Symbol) -> &'static str {
    match symbol.kind {
        SymbolKind::Unknown => symbol.role.as_str(),
        kind => kind.as_str(),
    }
}
