//! Precedent extraction from formula text.
//!
//! When the parsing collaborator supplies no dependency graph, precedent
//! lists are derived here by lexing each formula and collecting its
//! references. References inside string literals never surface (the
//! tokenizer types them as string tokens), ranges expand cell by cell up
//! to a fixed cap, and named ranges resolve through their static targets.

use std::collections::BTreeSet;

use super::location::{CellLocation, Reference, parse_reference};
use super::naming::NamedRange;
use super::tokenizer::{Token, tokenize};

/// Ranges covering more cells than this are skipped during dependency
/// extraction rather than flooding the graph.
pub const MAX_DEPENDENCY_RANGE_CELLS: usize = 1_000_000;

/// Extract every cell location a formula reads: direct references, range
/// members, and the targets of statically-defined named ranges.
/// Duplicates are removed; discovery order is preserved.
pub fn extract_references(
    formula: &str,
    own_sheet: &str,
    named_ranges: &[NamedRange],
) -> Vec<CellLocation> {
    let mut scratch = Vec::new();
    let tokens = tokenize(formula, &mut scratch);

    let mut seen = BTreeSet::new();
    let mut deps = Vec::new();

    for token in &tokens {
        match token {
            Token::Reference(text) => {
                if let Some(reference) = parse_reference(text, own_sheet) {
                    collect(&reference, &mut seen, &mut deps);
                }
            }
            Token::Identifier(id) => {
                if let Some(nr) = named_ranges
                    .iter()
                    .find(|nr| !nr.dynamic && nr.name.eq_ignore_ascii_case(id))
                {
                    collect(&nr.target, &mut seen, &mut deps);
                }
            }
            _ => {}
        }
    }

    deps
}

fn collect(
    reference: &Reference,
    seen: &mut BTreeSet<CellLocation>,
    deps: &mut Vec<CellLocation>,
) {
    match reference {
        Reference::Cell(loc) => {
            if seen.insert(loc.clone()) {
                deps.push(loc.clone());
            }
        }
        Reference::Range(range) => {
            // Oversized ranges are skipped entirely; translation will
            // degrade the containing formula on its own terms.
            let Some(cells) = range.cells(MAX_DEPENDENCY_RANGE_CELLS) else {
                return;
            };
            for cell in cells {
                if seen.insert(cell.clone()) {
                    deps.push(cell);
                }
            }
        }
    }
}
