//! Identifier allocation and naming resolution.
//!
//! Generated scripts are a single flat namespace, so every referenced
//! cell needs one collision-free identifier. Three naming authorities
//! compete, in strict priority order:
//!
//! 1. a named range whose target is exactly this cell,
//! 2. the cell's first-row column header (prefixed with the sheet name),
//! 3. the raw cell address (`cell_<sheet>_<address>`).
//!
//! All three paths funnel through [`allocate_identifier`] and one shared
//! reserved set, so names never collide across sheets or authorities.

use std::collections::{BTreeMap, BTreeSet};

use super::location::{CellLocation, Reference};

/// Substituted when sanitization leaves nothing usable.
const EMPTY_PLACEHOLDER: &str = "unnamed_field";

/// Prepended when a candidate would start with a digit.
const DIGIT_PREFIX: &str = "col_";

/// Rhai keywords plus the builtin names registered for generated
/// scripts. An allocated identifier never collides with these.
const RESERVED_WORDS: &[&str] = &[
    // Rhai keywords
    "as", "break", "catch", "const", "continue", "do", "else", "export", "false", "fn", "for",
    "global", "if", "import", "in", "is_def_fn", "is_def_var", "is_shared", "let", "loop",
    "private", "return", "switch", "this", "throw", "true", "try", "type_of", "until", "while",
    // Rhai builtins commonly visible to scripts
    "call", "curry", "debug", "eval", "print",
    // cellscript builtins (registered ALLCAPS, reserved lowercase too)
    "abs", "and", "average", "eval_cell", "max", "min", "not", "or", "round", "sum",
];

/// Which naming authority produced an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamingAuthority {
    NamedRange,
    ColumnHeader,
    CellAddress,
}

/// The identifier chosen for one cell, and where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedName {
    pub location: CellLocation,
    pub identifier: String,
    pub authority: NamingAuthority,
}

/// A named range supplied by the parsing collaborator. Ranges defined by
/// a dynamic expression cannot participate in static naming.
#[derive(Clone, Debug)]
pub struct NamedRange {
    pub name: String,
    pub target: Reference,
    pub dynamic: bool,
}

/// First-row header texts, keyed by sheet (case-insensitive) and
/// 1-based column index. Blank headers are dropped at insertion.
#[derive(Clone, Debug, Default)]
pub struct HeaderTable {
    entries: BTreeMap<(String, usize), String>,
}

impl HeaderTable {
    pub fn insert(&mut self, sheet: &str, column: usize, text: &str) {
        let text = text.trim();
        if text.is_empty() || column == 0 {
            return;
        }
        self.entries
            .insert((sheet.to_lowercase(), column), text.to_string());
    }

    pub fn get(&self, sheet: &str, column: usize) -> Option<&str> {
        self.entries
            .get(&(sheet.to_lowercase(), column))
            .map(String::as_str)
    }
}

/// Produce a unique, Rhai-safe identifier from an arbitrary candidate,
/// inserting the result into `reserved` before returning.
///
/// Sanitization: lowercase, whitespace/hyphen runs become `_`, everything
/// outside `[a-z0-9_]` is dropped, leading/trailing `_` trimmed. An empty
/// result becomes `unnamed_field`; a leading digit gains a `col_` prefix;
/// reserved words and prior allocations gain `_1`, `_2`, ... suffixes.
pub fn allocate_identifier(candidate: &str, reserved: &mut BTreeSet<String>) -> String {
    let mut base = sanitize(candidate);
    if base.is_empty() {
        base = EMPTY_PLACEHOLDER.to_string();
    }
    if base.starts_with(|c: char| c.is_ascii_digit()) {
        base = format!("{}{}", DIGIT_PREFIX, base);
    }

    let mut name = base.clone();
    let mut counter = 0usize;
    while RESERVED_WORDS.contains(&name.as_str()) || reserved.contains(&name) {
        counter += 1;
        name = format!("{}_{}", base, counter);
    }

    reserved.insert(name.clone());
    name
}

fn sanitize(candidate: &str) -> String {
    let mut out = String::with_capacity(candidate.len());
    for c in candidate.to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
        }
        // anything else is dropped
    }
    out.trim_matches('_').to_string()
}

/// Resolve an identifier for every supplied location. Locations must be
/// supplied in the job's stable order; allocation order follows it, which
/// keeps suffix numbering deterministic across runs.
pub fn resolve_names(
    vertices: &[CellLocation],
    named_ranges: &[NamedRange],
    headers: &HeaderTable,
    reserved: &mut BTreeSet<String>,
) -> BTreeMap<CellLocation, ResolvedName> {
    let mut resolved = BTreeMap::new();

    for vertex in vertices {
        if resolved.contains_key(vertex) {
            continue;
        }
        let (candidate, authority) = naming_candidate(vertex, named_ranges, headers);
        let identifier = allocate_identifier(&candidate, reserved);
        log::debug!(
            "named {} as `{}` ({:?})",
            vertex,
            identifier,
            authority
        );
        resolved.insert(
            vertex.clone(),
            ResolvedName {
                location: vertex.clone(),
                identifier,
                authority,
            },
        );
    }

    resolved
}

/// The ordered-authority decision for one cell. Returns the raw naming
/// candidate; sanitization happens in the allocator.
fn naming_candidate(
    vertex: &CellLocation,
    named_ranges: &[NamedRange],
    headers: &HeaderTable,
) -> (String, NamingAuthority) {
    for nr in named_ranges {
        if nr.dynamic {
            continue;
        }
        if let Reference::Cell(target) = &nr.target {
            if target.address == vertex.address
                && target.sheet.eq_ignore_ascii_case(&vertex.sheet)
            {
                return (nr.name.clone(), NamingAuthority::NamedRange);
            }
        }
    }

    if let Some(col) = vertex.column_index() {
        if let Some(header) = headers.get(&vertex.sheet, col) {
            return (
                format!("{}_{}", vertex.sheet, header),
                NamingAuthority::ColumnHeader,
            );
        }
    }

    (
        format!("cell_{}_{}", vertex.sheet, vertex.address),
        NamingAuthority::CellAddress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(sheet: &str, address: &str) -> CellLocation {
        CellLocation::new(sheet, address)
    }

    #[test]
    fn test_allocate_sanitizes_candidate() {
        let mut reserved = BTreeSet::new();
        assert_eq!(
            allocate_identifier("Total Cost (USD)", &mut reserved),
            "total_cost_usd"
        );
    }

    #[test]
    fn test_allocate_never_duplicates() {
        let mut reserved = BTreeSet::new();
        let first = allocate_identifier("net", &mut reserved);
        let second = allocate_identifier("net", &mut reserved);
        assert_eq!(first, "net");
        assert_eq!(second, "net_1");
        assert!(reserved.contains("net"));
        assert!(reserved.contains("net_1"));
    }

    #[test]
    fn test_allocate_empty_candidate() {
        let mut reserved = BTreeSet::new();
        assert_eq!(allocate_identifier("!!!", &mut reserved), "unnamed_field");
    }

    #[test]
    fn test_allocate_leading_digit() {
        let mut reserved = BTreeSet::new();
        assert_eq!(allocate_identifier("2024 totals", &mut reserved), "col_2024_totals");
    }

    #[test]
    fn test_allocate_avoids_keywords_and_builtins() {
        let mut reserved = BTreeSet::new();
        assert_eq!(allocate_identifier("let", &mut reserved), "let_1");
        assert_eq!(allocate_identifier("SUM", &mut reserved), "sum_1");
    }

    #[test]
    fn test_named_range_beats_header() {
        let mut headers = HeaderTable::default();
        headers.insert("Sheet1", 1, "Revenue");
        let ranges = vec![NamedRange {
            name: "GrandTotal".to_string(),
            target: Reference::Cell(loc("sheet1", "$A$5")),
            dynamic: false,
        }];
        let vertices = vec![loc("Sheet1", "A5")];
        let mut reserved = BTreeSet::new();
        let resolved = resolve_names(&vertices, &ranges, &headers, &mut reserved);
        let name = &resolved[&vertices[0]];
        assert_eq!(name.identifier, "grandtotal");
        assert_eq!(name.authority, NamingAuthority::NamedRange);
    }

    #[test]
    fn test_dynamic_named_range_falls_through() {
        let mut headers = HeaderTable::default();
        headers.insert("Sheet1", 1, "Revenue");
        let ranges = vec![NamedRange {
            name: "Spill".to_string(),
            target: Reference::Cell(loc("Sheet1", "A5")),
            dynamic: true,
        }];
        let vertices = vec![loc("Sheet1", "A5")];
        let mut reserved = BTreeSet::new();
        let resolved = resolve_names(&vertices, &ranges, &headers, &mut reserved);
        let name = &resolved[&vertices[0]];
        assert_eq!(name.identifier, "sheet1_revenue");
        assert_eq!(name.authority, NamingAuthority::ColumnHeader);
    }

    #[test]
    fn test_address_fallback_identifier() {
        let vertices = vec![loc("Sheet1", "B2")];
        let mut reserved = BTreeSet::new();
        let resolved = resolve_names(&vertices, &[], &HeaderTable::default(), &mut reserved);
        let name = &resolved[&vertices[0]];
        assert_eq!(name.identifier, "cell_sheet1_b2");
        assert_eq!(name.authority, NamingAuthority::CellAddress);
    }

    #[test]
    fn test_duplicate_header_text_gets_suffixed() {
        let mut headers = HeaderTable::default();
        headers.insert("Sheet1", 1, "Total");
        headers.insert("Sheet1", 2, "Total");
        let vertices = vec![loc("Sheet1", "A2"), loc("Sheet1", "B2")];
        let mut reserved = BTreeSet::new();
        let resolved = resolve_names(&vertices, &[], &headers, &mut reserved);
        assert_eq!(resolved[&vertices[0]].identifier, "sheet1_total");
        assert_eq!(resolved[&vertices[1]].identifier, "sheet1_total_1");
    }
}
