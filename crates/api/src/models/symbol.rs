use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Zero-based span inside a document, as stored in the graph.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
pub struct Range {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Range {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Decode a SCIP occurrence range: `[line, start_col, end_col]` for a
    /// single-line span or `[start_line, start_col, end_line, end_col]`.
    pub fn from_scip(raw: &[i32]) -> Option<Self> {
        let to_usize = |v: i32| usize::try_from(v).ok();
        match *raw {
            [line, start_col, end_col] => Some(Self::new(
                to_usize(line)?,
                to_usize(start_col)?,
                to_usize(line)?,
                to_usize(end_col)?,
            )),
            [start_line, start_col, end_line, end_col] => Some(Self::new(
                to_usize(start_line)?,
                to_usize(start_col)?,
                to_usize(end_line)?,
                to_usize(end_col)?,
            )),
            _ => None,
        }
    }

    /// End-exclusive, like SCIP ranges.
    pub fn contains(&self, line: usize, col: usize) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && col < self.start_col {
            return false;
        }
        if line == self.end_line && col >= self.end_col {
            return false;
        }
        true
    }
}

/// One-based span used at the API boundary.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl From<Range> for Position {
    fn from(range: Range) -> Self {
        Self {
            start_line: range.start_line + 1,
            start_column: range.start_col + 1,
            end_line: range.end_line + 1,
            end_column: range.end_col + 1,
        }
    }
}

/// Role of an occurrence, also used as the type of a relation edge.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Definition,
    Reference,
    Implementation,
    TypeDefinition,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Definition => "definition",
            RelationType::Reference => "reference",
            RelationType::Implementation => "implementation",
            RelationType::TypeDefinition => "type_definition",
        }
    }
}

/// Kind of entity, taken from the suffix of the identifier's last descriptor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Namespace,
    Type,
    Term,
    Method,
    TypeParameter,
    Parameter,
    Meta,
    Local,
    Macro,
    #[default]
    Unknown,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Type => "type",
            SymbolKind::Term => "term",
            SymbolKind::Method => "method",
            SymbolKind::TypeParameter => "type_parameter",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Meta => "meta",
            SymbolKind::Local => "local",
            SymbolKind::Macro => "macro",
            SymbolKind::Unknown => "unknown",
        }
    }
}

/// Outgoing edge of a symbol occurrence. Location fields are empty when the
/// target has no definition inside the indexed project.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct Relation {
    pub identifier: String,
    pub name: String,
    pub file_path: Option<String>,
    pub range: Option<Range>,
    pub relation_type: RelationType,
}

impl Relation {
    pub fn has_location(&self) -> bool {
        self.file_path.is_some() && self.range.is_some()
    }
}

/// One occurrence of a named program entity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct Symbol {
    pub identifier: String,
    pub name: String,
    pub namespace: String,
    pub kind: SymbolKind,
    pub path: String,
    pub range: Range,
    pub role: RelationType,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Symbol {
    pub fn is_definition(&self) -> bool {
        self.role == RelationType::Definition
    }

    /// Edge pointing at this occurrence.
    pub fn as_relation(&self, relation_type: RelationType) -> Relation {
        Relation {
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            file_path: Some(self.path.clone()),
            range: Some(self.range),
            relation_type,
        }
    }
}

/// Resolved symbol occurrences of one source file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct Document {
    pub path: String,
    pub symbols: Vec<Symbol>,
}

impl Document {
    pub fn symbol_at(&self, range: &Range) -> Option<&Symbol> {
        self.symbols.iter().find(|s| &s.range == range)
    }
}

/// Definition location recorded in the name index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct KeyRange {
    pub doc_key: String,
    pub range: Range,
}

/// All known definition locations of one short symbol name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct KeySet {
    pub keys: Vec<KeyRange>,
}

impl KeySet {
    /// Appends the ranges of `other` that are not already present.
    pub fn merge(&mut self, other: KeySet) {
        for key in other.keys {
            if !self.keys.contains(&key) {
                self.keys.push(key);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}
