//! Script assembly.
//!
//! Turns the evaluation order, the naming table, and the per-formula
//! translation outcomes into one Rhai script body. Every identifier is
//! bound to a neutral placeholder before any formula statement runs, so
//! later statements can reference any cell, including pure inputs that
//! carry no formula. Output is byte-identical for identical inputs.

use std::collections::BTreeMap;

use cellscript_engine::engine::{CellLocation, ResolvedName, TranslationOutcome};

/// The generated script: ordered statement lines plus every warning the
/// pipeline collected along the way. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedScript {
    lines: Vec<String>,
    warnings: Vec<String>,
}

impl GeneratedScript {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn body(&self) -> String {
        self.lines.join("\n")
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Assemble the script body.
///
/// `order` is the full emission order: the topological order followed by
/// any cycle remainder. Formula-bearing cells appear in `outcomes`;
/// cells without an outcome are pure inputs and only get an
/// initialization statement.
pub fn generate(
    order: &[CellLocation],
    names: &BTreeMap<CellLocation, ResolvedName>,
    outcomes: &BTreeMap<CellLocation, TranslationOutcome>,
    mut warnings: Vec<String>,
) -> GeneratedScript {
    let mut lines = Vec::new();

    lines.push("// cell bindings, in evaluation order".to_string());
    for location in order {
        let Some(name) = names.get(location) else {
            warnings.push(format!(
                "no identifier allocated for {}; statement skipped",
                location
            ));
            continue;
        };
        lines.push(format!("let {} = 0.0; // {}", name.identifier, location));
    }

    lines.push(String::new());
    lines.push("// translated formulas".to_string());
    for location in order {
        let Some(outcome) = outcomes.get(location) else {
            continue;
        };
        let Some(name) = names.get(location) else {
            continue;
        };
        match outcome {
            TranslationOutcome::StaticExpression(expr) => {
                lines.push(format!("{} = {};", name.identifier, expr));
            }
            TranslationOutcome::RuntimeFallback(reason) => {
                lines.push(format!("// {} is evaluated at runtime: {}", location, reason));
                lines.push(format!(
                    "{} = EVAL_CELL(\"{}\");",
                    name.identifier, location
                ));
            }
            TranslationOutcome::TranslationError(detail) => {
                lines.push(format!(
                    "// {} could not be translated ({}); evaluated at runtime",
                    location, detail
                ));
                lines.push(format!(
                    "{} = EVAL_CELL(\"{}\");",
                    name.identifier, location
                ));
            }
        }
    }

    GeneratedScript { lines, warnings }
}

/// Wrap a script body into a standalone runnable script: a header
/// comment block, the body, and a postamble printing each formula cell's
/// computed value so sandboxed runs produce observable output.
pub fn wrap_runnable(script: &GeneratedScript, results: &[(CellLocation, String)]) -> String {
    let mut out = String::new();
    out.push_str("// generated by cellscript; do not edit\n");
    out.push_str("// EVAL_CELL(location) defers a cell to the runtime-evaluator\n");
    out.push_str("// collaborator; the bundled interpreter binds it to a placeholder.\n\n");
    out.push_str(&script.body());
    if !results.is_empty() {
        out.push_str("\n\n// computed results\n");
        for (location, identifier) in results {
            out.push_str(&format!(
                "print(\"{} = \" + {});\n",
                location, identifier
            ));
        }
    } else {
        out.push('\n');
    }
    out
}
