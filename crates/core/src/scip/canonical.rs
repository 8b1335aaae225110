//! Deterministic normal form for SCIP documents, and merging of documents
//! that were emitted more than once for the same path.

use std::collections::HashMap;

use indexmap::IndexMap;
use scip::types::{Document, Occurrence, Relationship, SymbolInformation};

/// Merges documents sharing a `relative_path` into one canonical document
/// per path, in order of first appearance.
pub fn flatten_documents(documents: Vec<Document>) -> Vec<Document> {
    let mut by_path: IndexMap<String, Document> = IndexMap::new();
    for doc in documents {
        match by_path.get_mut(&doc.relative_path) {
            Some(merged) => {
                if merged.language.is_empty() {
                    merged.language = doc.language;
                }
                if merged.text.is_empty() {
                    merged.text = doc.text;
                }
                merged.occurrences.extend(doc.occurrences);
                merged.symbols.extend(doc.symbols);
            }
            None => {
                by_path.insert(doc.relative_path.clone(), doc);
            }
        }
    }
    by_path
        .into_values()
        .map(|mut doc| {
            canonicalize_document(&mut doc);
            doc
        })
        .collect()
}

pub fn canonicalize_document(document: &mut Document) {
    let occurrences = std::mem::take(&mut document.occurrences);
    document.occurrences = canonicalize_occurrences(occurrences);
    let symbols = std::mem::take(&mut document.symbols);
    document.symbols = canonicalize_symbols(symbols);
}

/// Single-line ranges always use the three-element form.
fn normalize_range(range: &[i32]) -> Vec<i32> {
    match *range {
        [sl, sc, el, ec] if sl == el => vec![sl, sc, ec],
        _ => range.to_vec(),
    }
}

/// `(start_line, start_col, end_line, end_col)` of a normalized range.
fn range_key(range: &[i32]) -> (i32, i32, i32, i32) {
    match *range {
        [l, sc, ec] => (l, sc, l, ec),
        [sl, sc, el, ec] => (sl, sc, el, ec),
        _ => (i32::MAX, i32::MAX, i32::MAX, i32::MAX),
    }
}

/// Collapses occurrences with the same range and symbol (roles are OR-ed),
/// then sorts by range and symbol.
fn canonicalize_occurrences(occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
    let mut merged: IndexMap<(Vec<i32>, String), Occurrence> = IndexMap::new();
    for mut occ in occurrences {
        occ.range = normalize_range(&occ.range);
        if !occ.enclosing_range.is_empty() {
            occ.enclosing_range = normalize_range(&occ.enclosing_range);
        }
        let key = (occ.range.clone(), occ.symbol.clone());
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.symbol_roles |= occ.symbol_roles;
                for doc in occ.override_documentation {
                    if !existing.override_documentation.contains(&doc) {
                        existing.override_documentation.push(doc);
                    }
                }
            }
            None => {
                merged.insert(key, occ);
            }
        }
    }
    let mut out: Vec<Occurrence> = merged.into_values().collect();
    out.sort_by(|a, b| {
        range_key(&a.range)
            .cmp(&range_key(&b.range))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    out
}

/// Merges symbol information with the same identifier, then sorts by identifier.
fn canonicalize_symbols(symbols: Vec<SymbolInformation>) -> Vec<SymbolInformation> {
    let mut merged: HashMap<String, SymbolInformation> = HashMap::new();
    for info in symbols {
        match merged.get_mut(&info.symbol) {
            Some(existing) => merge_symbol(existing, info),
            None => {
                merged.insert(info.symbol.clone(), info);
            }
        }
    }
    let mut out: Vec<SymbolInformation> = merged
        .into_values()
        .map(|mut info| {
            info.relationships = canonicalize_relationships(std::mem::take(&mut info.relationships));
            info
        })
        .collect();
    out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    out
}

fn merge_symbol(existing: &mut SymbolInformation, other: SymbolInformation) {
    for doc in other.documentation {
        if !existing.documentation.contains(&doc) {
            existing.documentation.push(doc);
        }
    }
    existing.relationships.extend(other.relationships);
    if existing.display_name.is_empty() {
        existing.display_name = other.display_name;
    }
    if existing.enclosing_symbol.is_empty() {
        existing.enclosing_symbol = other.enclosing_symbol;
    }
}

/// One relationship per target symbol, with the flags of duplicates OR-ed.
fn canonicalize_relationships(relationships: Vec<Relationship>) -> Vec<Relationship> {
    let mut merged: IndexMap<String, Relationship> = IndexMap::new();
    for rel in relationships {
        match merged.get_mut(&rel.symbol) {
            Some(existing) => {
                existing.is_reference |= rel.is_reference;
                existing.is_implementation |= rel.is_implementation;
                existing.is_type_definition |= rel.is_type_definition;
                existing.is_definition |= rel.is_definition;
            }
            None => {
                merged.insert(rel.symbol.clone(), rel);
            }
        }
    }
    let mut out: Vec<Relationship> = merged.into_values().collect();
    out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(symbol: &str, range: &[i32], roles: i32) -> Occurrence {
        let mut o = Occurrence::new();
        o.symbol = symbol.into();
        o.range = range.to_vec();
        o.symbol_roles = roles;
        o
    }

    fn info(symbol: &str, docs: &[&str], rels: &[&str]) -> SymbolInformation {
        let mut s = SymbolInformation::new();
        s.symbol = symbol.into();
        s.documentation = docs.iter().map(|d| d.to_string()).collect();
        s.relationships = rels
            .iter()
            .map(|r| {
                let mut rel = Relationship::new();
                rel.symbol = r.to_string();
                rel.is_implementation = true;
                rel
            })
            .collect();
        s
    }

    fn doc(path: &str, occurrences: Vec<Occurrence>, symbols: Vec<SymbolInformation>) -> Document {
        let mut d = Document::new();
        d.relative_path = path.into();
        d.occurrences = occurrences;
        d.symbols = symbols;
        d
    }

    #[test]
    fn duplicate_paths_collapse_into_one_document() {
        let first = doc(
            "pkg/a.go",
            vec![occ("s Foo.", &[4, 5, 4, 8], 1), occ("s Bar.", &[1, 0, 3], 0)],
            vec![info("s Foo.", &["doc"], &["s I#"])],
        );
        let second = doc(
            "pkg/a.go",
            vec![occ("s Foo.", &[4, 5, 8], 0), occ("s Baz.", &[9, 0, 2], 0)],
            vec![info("s Foo.", &["doc", "more"], &["s I#", "s J#"])],
        );
        let other = doc("pkg/b.go", vec![], vec![]);

        let flattened = flatten_documents(vec![first, other, second]);
        assert_eq!(flattened.len(), 2);
        assert_eq!(flattened[0].relative_path, "pkg/a.go");
        assert_eq!(flattened[1].relative_path, "pkg/b.go");

        let merged = &flattened[0];
        let symbols: Vec<&str> = merged.occurrences.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["s Bar.", "s Foo.", "s Baz."]);
        assert_eq!(merged.occurrences[1].range, vec![4, 5, 8]);
        assert_eq!(merged.occurrences[1].symbol_roles, 1);

        assert_eq!(merged.symbols.len(), 1);
        assert_eq!(merged.symbols[0].documentation, vec!["doc", "more"]);
        let targets: Vec<&str> = merged.symbols[0]
            .relationships
            .iter()
            .map(|r| r.symbol.as_str())
            .collect();
        assert_eq!(targets, vec!["s I#", "s J#"]);
    }

    #[test]
    fn canonical_form_is_order_independent() {
        let mut a = doc(
            "x.go",
            vec![occ("s B.", &[2, 0, 1], 0), occ("s A.", &[1, 0, 1], 1)],
            vec![info("s B.", &[], &[]), info("s A.", &[], &[])],
        );
        let mut b = doc(
            "x.go",
            vec![occ("s A.", &[1, 0, 1], 1), occ("s B.", &[2, 0, 1], 0)],
            vec![info("s A.", &[], &[]), info("s B.", &[], &[])],
        );
        canonicalize_document(&mut a);
        canonicalize_document(&mut b);
        assert_eq!(a, b);
    }
}
