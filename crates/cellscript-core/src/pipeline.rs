//! Conversion pipeline.
//!
//! Drives a job through the engine stages in order: precedent discovery,
//! naming resolution, dependency scheduling, per-formula translation,
//! and script assembly. The pipeline is synchronous and deterministic;
//! every recoverable problem becomes a warning on the generated script,
//! and every job that gets this far produces a script.

use std::collections::{BTreeMap, BTreeSet};

use cellscript_engine::engine::{
    CellLocation, ResolvedName, TranslationOutcome, build_order, extract_references,
    resolve_names, translate_formula,
};

use crate::codegen::{self, GeneratedScript};
use crate::error::Result;
use crate::job::ConversionJob;

/// The finished conversion: the script plus the tables a caller needs to
/// relate script identifiers back to spreadsheet locations.
#[derive(Debug)]
pub struct Conversion {
    pub script: GeneratedScript,
    /// Full emission order: topological order, then any cycle remainder.
    pub order: Vec<CellLocation>,
    pub names: BTreeMap<CellLocation, ResolvedName>,
    pub has_cycle: bool,
    formula_cells: Vec<CellLocation>,
}

impl Conversion {
    pub fn warnings(&self) -> &[String] {
        self.script.warnings()
    }

    /// The script wrapped as a standalone runnable: header preamble plus
    /// a postamble printing each formula cell's computed value.
    pub fn runnable_script(&self) -> String {
        let results: Vec<(CellLocation, String)> = self
            .formula_cells
            .iter()
            .filter_map(|loc| {
                self.names
                    .get(loc)
                    .map(|n| (loc.clone(), n.identifier.clone()))
            })
            .collect();
        codegen::wrap_runnable(&self.script, &results)
    }
}

/// Run the full conversion for one job.
pub fn convert(job: &ConversionJob) -> Result<Conversion> {
    let mut warnings = Vec::new();

    let records = job.formula_records();
    let named_ranges = job.named_range_table(&mut warnings);
    let headers = job.header_table();

    // Precedents: the supplied map is authoritative when present;
    // otherwise derive them from formula text.
    let mut precedents = job.precedent_map().unwrap_or_default();
    if job.precedents.is_none() {
        for record in &records {
            precedents.insert(
                record.location.clone(),
                extract_references(&record.formula, &record.location.sheet, &named_ranges),
            );
        }
    } else {
        for record in &records {
            precedents.entry(record.location.clone()).or_default();
        }
    }

    let mut vertices: BTreeSet<CellLocation> =
        records.iter().map(|r| r.location.clone()).collect();
    for (dependent, precs) in &precedents {
        vertices.insert(dependent.clone());
        for p in precs {
            vertices.insert(p.clone());
        }
    }

    let vertex_list: Vec<CellLocation> = vertices.iter().cloned().collect();
    let mut reserved = BTreeSet::new();
    let names = resolve_names(&vertex_list, &named_ranges, &headers, &mut reserved);

    let schedule = build_order(&vertices, &precedents);
    if schedule.has_cycle {
        warnings.push(format!(
            "circular dependency among {} cells; they fall back to the runtime evaluator",
            schedule.unordered.len()
        ));
    }
    let unordered: BTreeSet<&CellLocation> = schedule.unordered.iter().collect();

    let mut outcomes = BTreeMap::new();
    for record in &records {
        let outcome = if unordered.contains(&record.location) {
            TranslationOutcome::RuntimeFallback("part of a circular dependency".to_string())
        } else {
            translate_formula(
                &record.formula,
                &record.location.sheet,
                &names,
                &named_ranges,
                job.force_runtime_fallback,
                &mut warnings,
            )
        };
        outcomes.insert(record.location.clone(), outcome);
    }

    let order: Vec<CellLocation> = schedule
        .order
        .iter()
        .chain(schedule.unordered.iter())
        .cloned()
        .collect();

    let formula_cells: Vec<CellLocation> = order
        .iter()
        .filter(|loc| outcomes.contains_key(loc))
        .cloned()
        .collect();

    let script = codegen::generate(&order, &names, &outcomes, warnings);
    for warning in script.warnings() {
        log::warn!("{}", warning);
    }

    Ok(Conversion {
        script,
        order,
        names,
        has_cycle: schedule.has_cycle,
        formula_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ConversionJob;

    fn job(text: &str) -> ConversionJob {
        ConversionJob::from_json(text).unwrap()
    }

    #[test]
    fn test_chain_is_ordered_and_named() {
        let conversion = convert(&job(
            r#"{"records": [
                {"sheet": "Sheet1", "address": "C1", "formula": "=B1+1"},
                {"sheet": "Sheet1", "address": "B1", "formula": "=A1*2"}
            ]}"#,
        ))
        .unwrap();
        let body = conversion.script.body();
        let a = body.find("let cell_sheet1_a1 = 0.0;").unwrap();
        let b = body.find("let cell_sheet1_b1 = 0.0;").unwrap();
        let c = body.find("let cell_sheet1_c1 = 0.0;").unwrap();
        assert!(a < b && b < c);
        let b_assign = body.find("cell_sheet1_b1 = cell_sheet1_a1*2.0;").unwrap();
        let c_assign = body.find("cell_sheet1_c1 = cell_sheet1_b1+1.0;").unwrap();
        assert!(b_assign < c_assign);
        assert!(!conversion.has_cycle);
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let text = r#"{"records": [
            {"sheet": "Sheet1", "address": "B2", "formula": "=SUM(A1:A3)"},
            {"sheet": "Sheet1", "address": "B3", "formula": "=B2*2"}
        ]}"#;
        let first = convert(&job(text)).unwrap();
        let second = convert(&job(text)).unwrap();
        assert_eq!(first.script.body(), second.script.body());
        assert_eq!(first.runnable_script(), second.runnable_script());
    }

    #[test]
    fn test_cycle_degrades_to_fallback() {
        let conversion = convert(&job(
            r#"{"records": [
                {"sheet": "Sheet1", "address": "A1", "formula": "=B1"},
                {"sheet": "Sheet1", "address": "B1", "formula": "=A1"},
                {"sheet": "Sheet1", "address": "C1", "formula": "=1+1"}
            ]}"#,
        ))
        .unwrap();
        assert!(conversion.has_cycle);
        let body = conversion.script.body();
        assert!(body.contains(r#"cell_sheet1_a1 = EVAL_CELL("Sheet1!A1");"#));
        assert!(body.contains(r#"cell_sheet1_b1 = EVAL_CELL("Sheet1!B1");"#));
        assert!(body.contains("cell_sheet1_c1 = 1.0+1.0;"));
        assert!(
            conversion
                .warnings()
                .iter()
                .any(|w| w.contains("circular dependency"))
        );
    }

    #[test]
    fn test_force_runtime_fallback_flag() {
        let conversion = convert(&job(
            r#"{"records": [
                {"sheet": "Sheet1", "address": "B1", "formula": "=A1*2"}
            ], "force_runtime_fallback": true}"#,
        ))
        .unwrap();
        let body = conversion.script.body();
        assert!(body.contains(r#"cell_sheet1_b1 = EVAL_CELL("Sheet1!B1");"#));
        assert!(!body.contains("cell_sheet1_b1 = cell_sheet1_a1"));
    }

    #[test]
    fn test_supplied_precedents_are_authoritative() {
        // The formula references A1, but the collaborator says B1 only
        // depends on D4; the graph follows the collaborator.
        let conversion = convert(&job(
            r#"{"records": [
                {"sheet": "Sheet1", "address": "B1", "formula": "=A1*2"}
            ], "precedents": {"Sheet1!B1": ["Sheet1!D4"]}}"#,
        ))
        .unwrap();
        let body = conversion.script.body();
        assert!(body.contains("let cell_sheet1_d4 = 0.0;"));
        // A1 was never declared, so translation degrades to fallback.
        assert!(body.contains(r#"cell_sheet1_b1 = EVAL_CELL("Sheet1!B1");"#));
    }

    #[test]
    fn test_headers_and_named_ranges_name_cells() {
        let conversion = convert(&job(
            r#"{"records": [
                {"sheet": "Sheet1", "address": "B2", "formula": "=A2*2"}
            ],
            "headers": [
                {"sheet": "Sheet1", "column": 1, "text": "Price"},
                {"sheet": "Sheet1", "column": 2, "text": "Total"}
            ],
            "named_ranges": [
                {"name": "FinalTotal", "sheet": "Sheet1", "address": "$B$2"}
            ]}"#,
        ))
        .unwrap();
        let body = conversion.script.body();
        assert!(body.contains("finaltotal = sheet1_price*2.0;"));
    }

    #[test]
    fn test_runnable_script_prints_formula_cells() {
        let conversion = convert(&job(
            r#"{"records": [
                {"sheet": "Sheet1", "address": "B1", "formula": "=A1*2"}
            ]}"#,
        ))
        .unwrap();
        let runnable = conversion.runnable_script();
        assert!(runnable.contains(r#"print("Sheet1!B1 = " + cell_sheet1_b1);"#));
        assert!(!runnable.contains(r#"print("Sheet1!A1"#));
    }
}
