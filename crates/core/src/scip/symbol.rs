use protobuf::Enum;
use scip::types::{Occurrence, Relationship, SymbolRole};
use shenma_api::models::{Range, RelationType, Symbol, SymbolKind};

/// Short name, namespace and kind decoded from a SCIP symbol identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDescriptor {
    pub name: String,
    pub namespace: String,
    pub kind: SymbolKind,
}

pub fn is_local(identifier: &str) -> bool {
    identifier.starts_with("local ")
}

/// Definition if the definition bit is set, reference otherwise.
pub fn occurrence_role(occ: &Occurrence) -> RelationType {
    if occ.symbol_roles & SymbolRole::Definition.value() != 0 {
        RelationType::Definition
    } else {
        RelationType::Reference
    }
}

/// First matching flag wins; `None` when the relationship sets none.
pub fn relationship_type(rel: &Relationship) -> Option<RelationType> {
    if rel.is_definition {
        Some(RelationType::Definition)
    } else if rel.is_reference {
        Some(RelationType::Reference)
    } else if rel.is_implementation {
        Some(RelationType::Implementation)
    } else if rel.is_type_definition {
        Some(RelationType::TypeDefinition)
    } else {
        None
    }
}

fn suffix_kind(suffix: i32) -> SymbolKind {
    match suffix {
        1 => SymbolKind::Namespace,
        2 => SymbolKind::Type,
        3 => SymbolKind::Term,
        4 => SymbolKind::Method,
        5 => SymbolKind::TypeParameter,
        6 => SymbolKind::Parameter,
        7 => SymbolKind::Meta,
        8 => SymbolKind::Local,
        9 => SymbolKind::Macro,
        _ => SymbolKind::Unknown,
    }
}

pub fn describe(identifier: &str) -> SymbolDescriptor {
    if is_local(identifier) {
        return SymbolDescriptor {
            name: identifier.trim_start_matches("local ").to_string(),
            namespace: String::new(),
            kind: SymbolKind::Local,
        };
    }
    match scip::symbol::parse_symbol(identifier) {
        Ok(parsed) if !parsed.descriptors.is_empty() => {
            let first = &parsed.descriptors[0];
            let last = &parsed.descriptors[parsed.descriptors.len() - 1];
            SymbolDescriptor {
                name: last.name.clone(),
                namespace: first.name.clone(),
                kind: suffix_kind(last.suffix.value()),
            }
        }
        _ => SymbolDescriptor {
            name: fallback_name(identifier),
            namespace: String::new(),
            kind: SymbolKind::Unknown,
        },
    }
}

/// Last descriptor-ish segment of an identifier the parser rejected.
fn fallback_name(identifier: &str) -> String {
    let descriptors = identifier.rsplit(' ').next().unwrap_or(identifier);
    descriptors
        .trim_end_matches(['.', '#', '/', ':', '!'])
        .trim_end_matches("()")
        .rsplit(['/', '#', '.'])
        .find(|s| !s.is_empty())
        .unwrap_or(identifier)
        .to_string()
}

/// Graph record for one occurrence in `path`. `None` when the range is malformed.
pub fn build_symbol(occ: &Occurrence, path: &str) -> Option<Symbol> {
    let range = Range::from_scip(&occ.range)?;
    let descriptor = describe(&occ.symbol);
    Some(Symbol {
        identifier: occ.symbol.clone(),
        name: descriptor.name,
        namespace: descriptor.namespace,
        kind: descriptor.kind,
        path: path.to_string(),
        range,
        role: occurrence_role(occ),
        relations: Vec::new(),
    })
}
