//! Static formula translation.
//!
//! Maps a tokenized formula into an equivalent Rhai expression, or
//! decides that the formula must be handed to the runtime evaluator.
//! Translation is a text-level transliteration: translated tokens are
//! emitted in the original token order, with no re-parse into an
//! expression tree. If Rhai's operator precedence ever disagrees with
//! the source language's for some construct, that construct will
//! transliterate with the source's textual shape, not the source's
//! parse; this is a known limitation of the approach.

use std::collections::BTreeMap;

use super::location::{CellLocation, Reference, parse_reference};
use super::naming::{NamedRange, ResolvedName};
use super::tokenizer::{Token, tokenize};

/// Upper bound on the number of cells a range reference may expand to in
/// a static expression. Larger ranges degrade to runtime fallback.
pub const MAX_STATIC_RANGE_CELLS: usize = 10_000;

/// Spreadsheet function names with a registered Rhai builtin of the same
/// shape. Everything here translates statically.
pub const FUNCTION_MAP: &[(&str, &str)] = &[
    ("SUM", "SUM"),
    ("AVERAGE", "AVERAGE"),
    ("IF", "IF"),
    ("AND", "AND"),
    ("OR", "OR"),
    ("NOT", "NOT"),
    ("ABS", "ABS"),
    ("ROUND", "ROUND"),
    ("MAX", "MAX"),
    ("MIN", "MIN"),
];

/// Functions that cannot be statically translated: indirection by name,
/// offset by geometry, volatile time/metadata functions. Any occurrence
/// forces the whole formula to runtime fallback.
pub const VOLATILE_FUNCTIONS: &[&str] = &[
    "INDIRECT", "OFFSET", "RAND", "NOW", "TODAY", "CELL", "N", "T", "INFO",
];

/// The translation decision for one formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// A complete Rhai expression, ready to assign.
    StaticExpression(String),
    /// The formula must go to the runtime evaluator; the reason is
    /// emitted as a comment next to the fallback statement.
    RuntimeFallback(String),
    /// The formula could not be translated because its inputs were
    /// inconsistent (e.g. a reference with no allocated identifier).
    /// The generator degrades this to a fallback statement too.
    TranslationError(String),
}

/// Translate one operator. `^` and `=` have different spellings in Rhai;
/// everything else maps to itself.
pub fn translate_operator(op: &str) -> &str {
    match op {
        "^" => "**",
        "=" => "==",
        "<>" => "!=",
        other => other,
    }
}

/// Translate a formula into a [`TranslationOutcome`].
///
/// Reference tokens are substituted with identifiers from `names`; range
/// references expand to array literals of per-cell identifiers. Unknown
/// identifiers pass through unchanged with a warning (best-effort: they
/// are assumed callable under the same name).
pub fn translate_formula(
    formula: &str,
    own_sheet: &str,
    names: &BTreeMap<CellLocation, ResolvedName>,
    named_ranges: &[NamedRange],
    force_fallback: bool,
    warnings: &mut Vec<String>,
) -> TranslationOutcome {
    if force_fallback {
        return TranslationOutcome::RuntimeFallback(
            "runtime evaluation forced by caller".to_string(),
        );
    }

    let tokens = tokenize(formula, warnings);
    if tokens.is_empty() {
        return TranslationOutcome::TranslationError(format!(
            "formula `{}` produced no recognizable tokens",
            formula
        ));
    }

    // Whole-formula fallback decisions come before any emission.
    for token in &tokens {
        if let Token::Identifier(id) = token {
            let upper = id.to_uppercase();
            if VOLATILE_FUNCTIONS.contains(&upper.as_str()) {
                return TranslationOutcome::RuntimeFallback(format!(
                    "function {} cannot be statically translated",
                    upper
                ));
            }
            if let Some(nr) = lookup_named_range(named_ranges, id) {
                if nr.dynamic {
                    return TranslationOutcome::RuntimeFallback(format!(
                        "named range {} is defined by a dynamic expression",
                        nr.name
                    ));
                }
            }
        }
    }

    let mut out = String::new();
    for token in &tokens {
        match token {
            Token::Str(s) => out.push_str(s),
            Token::Number(n) => push_number(&mut out, n),
            Token::Paren(c) => out.push(*c),
            Token::Separator => out.push_str(", "),
            Token::Operator(op) => out.push_str(translate_operator(op)),
            Token::Identifier(id) => {
                if let Some(mapped) = lookup_function(id) {
                    out.push_str(mapped);
                } else if let Some(nr) = lookup_named_range(named_ranges, id) {
                    match substitute_reference(&nr.target, names) {
                        Ok(text) => out.push_str(&text),
                        Err(outcome) => return outcome,
                    }
                } else {
                    warnings.push(format!(
                        "unknown function `{}` in formula `{}`; passed through unchanged",
                        id, formula
                    ));
                    out.push_str(id);
                }
            }
            Token::Reference(text) => {
                let Some(reference) = parse_reference(text, own_sheet) else {
                    return TranslationOutcome::TranslationError(format!(
                        "malformed reference `{}` in formula `{}`",
                        text, formula
                    ));
                };
                match substitute_reference(&reference, names) {
                    Ok(text) => out.push_str(&text),
                    Err(outcome) => return outcome,
                }
            }
        }
    }

    TranslationOutcome::StaticExpression(out)
}

/// Replace a parsed reference with resolved identifiers: a cell becomes
/// its identifier, a range becomes an array literal of identifiers.
fn substitute_reference(
    reference: &Reference,
    names: &BTreeMap<CellLocation, ResolvedName>,
) -> Result<String, TranslationOutcome> {
    match reference {
        Reference::Cell(loc) => match names.get(loc) {
            Some(resolved) => Ok(resolved.identifier.clone()),
            None => Err(TranslationOutcome::TranslationError(format!(
                "reference {} has no allocated identifier",
                loc
            ))),
        },
        Reference::Range(range) => {
            let Some(cells) = range.cells(MAX_STATIC_RANGE_CELLS) else {
                return Err(TranslationOutcome::RuntimeFallback(format!(
                    "range {} covers too many cells for static expansion",
                    range
                )));
            };
            let mut idents = Vec::with_capacity(cells.len());
            for cell in &cells {
                match names.get(cell) {
                    Some(resolved) => idents.push(resolved.identifier.clone()),
                    None => {
                        return Err(TranslationOutcome::TranslationError(format!(
                            "range {} includes {} which has no allocated identifier",
                            range, cell
                        )));
                    }
                }
            }
            Ok(format!("[{}]", idents.join(", ")))
        }
    }
}

fn lookup_function(id: &str) -> Option<&'static str> {
    let upper = id.to_uppercase();
    FUNCTION_MAP
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, mapped)| *mapped)
}

fn lookup_named_range<'a>(named_ranges: &'a [NamedRange], id: &str) -> Option<&'a NamedRange> {
    named_ranges
        .iter()
        .find(|nr| nr.name.eq_ignore_ascii_case(id))
}

/// Numeric literals are emitted as floats so generated arithmetic stays
/// in the float domain, matching spreadsheet number semantics.
fn push_number(out: &mut String, literal: &str) {
    out.push_str(literal);
    if !literal.contains('.') {
        out.push_str(".0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn names_for(locations: &[(&str, &str)]) -> BTreeMap<CellLocation, ResolvedName> {
        let mut reserved = BTreeSet::new();
        let vertices: Vec<CellLocation> = locations
            .iter()
            .map(|(s, a)| CellLocation::new(*s, a))
            .collect();
        super::super::naming::resolve_names(
            &vertices,
            &[],
            &super::super::naming::HeaderTable::default(),
            &mut reserved,
        )
    }

    #[test]
    fn test_translates_addition() {
        let names = names_for(&[("Sheet1", "A1"), ("Sheet1", "B1")]);
        let mut warnings = Vec::new();
        let outcome = translate_formula("=A1+B1", "Sheet1", &names, &[], false, &mut warnings);
        assert_eq!(
            outcome,
            TranslationOutcome::StaticExpression("cell_sheet1_a1+cell_sheet1_b1".to_string())
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_translates_power_and_comparison() {
        let names = names_for(&[("Sheet1", "A1")]);
        let mut warnings = Vec::new();
        let outcome = translate_formula("=A1^2>=10", "Sheet1", &names, &[], false, &mut warnings);
        assert_eq!(
            outcome,
            TranslationOutcome::StaticExpression("cell_sheet1_a1**2.0>=10.0".to_string())
        );
    }

    #[test]
    fn test_range_expands_to_array_literal() {
        let names = names_for(&[("Sheet1", "A1"), ("Sheet1", "A2"), ("Sheet1", "A3")]);
        let mut warnings = Vec::new();
        let outcome =
            translate_formula("=SUM(A1:A3)", "Sheet1", &names, &[], false, &mut warnings);
        assert_eq!(
            outcome,
            TranslationOutcome::StaticExpression(
                "SUM([cell_sheet1_a1, cell_sheet1_a2, cell_sheet1_a3])".to_string()
            )
        );
    }

    #[test]
    fn test_indirect_always_falls_back() {
        let names = names_for(&[("Sheet1", "A1")]);
        let mut warnings = Vec::new();
        let outcome = translate_formula(
            "=A1+INDIRECT(\"B\"&1)",
            "Sheet1",
            &names,
            &[],
            false,
            &mut warnings,
        );
        assert!(matches!(outcome, TranslationOutcome::RuntimeFallback(_)));
    }

    #[test]
    fn test_force_fallback_overrides_everything() {
        let names = names_for(&[("Sheet1", "A1")]);
        let mut warnings = Vec::new();
        let outcome = translate_formula("=A1", "Sheet1", &names, &[], true, &mut warnings);
        assert!(matches!(outcome, TranslationOutcome::RuntimeFallback(_)));
    }

    #[test]
    fn test_unknown_function_passes_through_with_warning() {
        let names = names_for(&[("Sheet1", "A1")]);
        let mut warnings = Vec::new();
        let outcome =
            translate_formula("=SQRT(A1)", "Sheet1", &names, &[], false, &mut warnings);
        assert_eq!(
            outcome,
            TranslationOutcome::StaticExpression("SQRT(cell_sheet1_a1)".to_string())
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("SQRT"));
    }

    #[test]
    fn test_unresolved_reference_is_translation_error() {
        let names = names_for(&[("Sheet1", "A1")]);
        let mut warnings = Vec::new();
        let outcome = translate_formula("=Z9*2", "Sheet1", &names, &[], false, &mut warnings);
        assert!(matches!(outcome, TranslationOutcome::TranslationError(_)));
    }

    #[test]
    fn test_multi_argument_call_keeps_separators() {
        let names = names_for(&[("Sheet1", "A1")]);
        let mut warnings = Vec::new();
        let outcome =
            translate_formula("=ROUND(A1, 2)", "Sheet1", &names, &[], false, &mut warnings);
        assert_eq!(
            outcome,
            TranslationOutcome::StaticExpression("ROUND(cell_sheet1_a1, 2.0)".to_string())
        );
    }

    #[test]
    fn test_named_range_identifier_substitutes() {
        let names = names_for(&[("Sheet1", "A5")]);
        let ranges = vec![NamedRange {
            name: "Total".to_string(),
            target: Reference::Cell(CellLocation::new("Sheet1", "A5")),
            dynamic: false,
        }];
        let mut warnings = Vec::new();
        let outcome =
            translate_formula("=Total*2", "Sheet1", &names, &ranges, false, &mut warnings);
        assert_eq!(
            outcome,
            TranslationOutcome::StaticExpression("cell_sheet1_a5*2.0".to_string())
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_dynamic_named_range_forces_fallback() {
        let names = names_for(&[("Sheet1", "A1")]);
        let ranges = vec![NamedRange {
            name: "Window".to_string(),
            target: Reference::Cell(CellLocation::new("Sheet1", "A1")),
            dynamic: true,
        }];
        let mut warnings = Vec::new();
        let outcome =
            translate_formula("=SUM(Window)", "Sheet1", &names, &ranges, false, &mut warnings);
        assert!(matches!(outcome, TranslationOutcome::RuntimeFallback(_)));
    }

    #[test]
    fn test_equality_becomes_double_equals() {
        let names = names_for(&[("Sheet1", "A1"), ("Sheet1", "B1")]);
        let mut warnings = Vec::new();
        let outcome = translate_formula(
            "=IF(A1=B1, 1, 0)",
            "Sheet1",
            &names,
            &[],
            false,
            &mut warnings,
        );
        assert_eq!(
            outcome,
            TranslationOutcome::StaticExpression(
                "IF(cell_sheet1_a1==cell_sheet1_b1, 1.0, 0.0)".to_string()
            )
        );
    }
}
