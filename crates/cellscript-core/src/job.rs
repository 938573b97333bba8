//! Conversion job input model.
//!
//! A job is the JSON document handed over by the spreadsheet-parsing
//! collaborator: formula records, an optional precedent map, named
//! ranges, first-row headers, and the force-fallback override. Parsing
//! container formats is out of scope here; this module only validates
//! and normalizes what the collaborator produced.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use cellscript_engine::engine::{
    CellLocation, HeaderTable, NamedRange, Reference, parse_reference,
};

use crate::error::{CellscriptError, Result};

/// One formula cell as supplied by the collaborator.
#[derive(Clone, Debug, Deserialize)]
pub struct RawRecord {
    pub sheet: String,
    pub address: String,
    #[serde(default)]
    pub file: Option<String>,
    pub formula: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawNamedRange {
    pub name: String,
    pub sheet: String,
    pub address: String,
    /// True when the range is defined by a runtime-computed expression;
    /// such ranges cannot participate in static naming.
    #[serde(default)]
    pub dynamic: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawHeader {
    pub sheet: String,
    /// 1-based column index.
    pub column: usize,
    pub text: String,
}

/// The full conversion request.
#[derive(Clone, Debug, Deserialize)]
pub struct ConversionJob {
    pub records: Vec<RawRecord>,
    /// Qualified-location precedent lists (`"Sheet1!A1": ["Sheet1!B2"]`).
    /// When absent, precedents are extracted from formula text.
    #[serde(default)]
    pub precedents: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub named_ranges: Vec<RawNamedRange>,
    #[serde(default)]
    pub headers: Vec<RawHeader>,
    /// When true, every formula defers to the runtime evaluator.
    #[serde(default)]
    pub force_runtime_fallback: bool,
}

/// A validated formula record with its normalized location.
#[derive(Clone, Debug)]
pub struct FormulaRecord {
    pub location: CellLocation,
    pub source_file: Option<String>,
    pub formula: String,
}

impl ConversionJob {
    pub fn from_json(text: &str) -> Result<Self> {
        let job: ConversionJob = serde_json::from_str(text)?;
        job.validate()?;
        Ok(job)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(CellscriptError::InvalidJob(
                "job contains no formula records".to_string(),
            ));
        }

        let mut seen = BTreeMap::new();
        for (index, record) in self.records.iter().enumerate() {
            if record.sheet.trim().is_empty() {
                return Err(CellscriptError::InvalidJob(format!(
                    "record {} has a blank sheet name",
                    index
                )));
            }
            if record.formula.trim().is_empty() {
                return Err(CellscriptError::InvalidJob(format!(
                    "record {} ({}!{}) has an empty formula",
                    index, record.sheet, record.address
                )));
            }
            let location = CellLocation::new(record.sheet.clone(), &record.address);
            if !location.is_valid() {
                return Err(CellscriptError::InvalidJob(format!(
                    "record {} has an invalid address `{}`",
                    index, record.address
                )));
            }
            if let Some(previous) = seen.insert(location.clone(), index) {
                return Err(CellscriptError::InvalidJob(format!(
                    "records {} and {} both target {}",
                    previous, index, location
                )));
            }
        }

        for header in &self.headers {
            if header.column == 0 {
                return Err(CellscriptError::InvalidJob(format!(
                    "header on sheet `{}` uses column 0; columns are 1-based",
                    header.sheet
                )));
            }
        }

        if let Some(map) = &self.precedents {
            for (key, values) in map {
                parse_qualified_cell(key).ok_or_else(|| {
                    CellscriptError::InvalidJob(format!("invalid precedent key `{}`", key))
                })?;
                for value in values {
                    parse_qualified_cell(value).ok_or_else(|| {
                        CellscriptError::InvalidJob(format!(
                            "invalid precedent `{}` for `{}`",
                            value, key
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Records with normalized locations. Call after validation.
    pub fn formula_records(&self) -> Vec<FormulaRecord> {
        self.records
            .iter()
            .map(|r| FormulaRecord {
                location: CellLocation::new(r.sheet.clone(), &r.address),
                source_file: r.file.clone(),
                formula: r.formula.clone(),
            })
            .collect()
    }

    /// Named ranges with parsed targets. A range whose address does not
    /// parse is recorded as dynamic (unresolved-to-static) with a warning,
    /// so the cells it would have covered fall through to header/address
    /// naming.
    pub fn named_range_table(&self, warnings: &mut Vec<String>) -> Vec<NamedRange> {
        self.named_ranges
            .iter()
            .map(|raw| {
                let target = parse_reference(&raw.address, &raw.sheet);
                match target {
                    Some(target) => NamedRange {
                        name: raw.name.clone(),
                        target,
                        dynamic: raw.dynamic,
                    },
                    None => {
                        warnings.push(format!(
                            "named range `{}` has unresolvable target `{}`; excluded from static naming",
                            raw.name, raw.address
                        ));
                        NamedRange {
                            name: raw.name.clone(),
                            // Placeholder target; dynamic ranges never resolve.
                            target: Reference::Cell(CellLocation::new(
                                raw.sheet.clone(),
                                "A1",
                            )),
                            dynamic: true,
                        }
                    }
                }
            })
            .collect()
    }

    pub fn header_table(&self) -> HeaderTable {
        let mut table = HeaderTable::default();
        for header in &self.headers {
            table.insert(&header.sheet, header.column, &header.text);
        }
        table
    }

    /// The supplied precedent map with parsed locations, or None when the
    /// job carries no dependency metadata. Call after validation.
    pub fn precedent_map(&self) -> Option<BTreeMap<CellLocation, Vec<CellLocation>>> {
        self.precedents.as_ref().map(|map| {
            map.iter()
                .filter_map(|(key, values)| {
                    let dependent = parse_qualified_cell(key)?;
                    let precs = values
                        .iter()
                        .filter_map(|v| parse_qualified_cell(v))
                        .collect();
                    Some((dependent, precs))
                })
                .collect()
        })
    }
}

/// Parse a `Sheet!A1` string; the sheet qualifier is required here.
fn parse_qualified_cell(text: &str) -> Option<CellLocation> {
    match parse_reference(text, "") {
        Some(Reference::Cell(loc)) if !loc.sheet.is_empty() => Some(loc),
        _ => None,
    }
}
