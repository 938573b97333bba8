//! Formula engine API.
//!
//! This module provides the computation core of the converter:
//!
//! - [`CellLocation`], [`RangeRef`] - locations in A1 notation, normalized
//! - [`allocate_identifier`], [`resolve_names`] - collision-free naming
//! - [`build_order`] - dependency scheduling (topological order)
//! - [`tokenize`] - formula lexing into typed tokens
//! - [`translate_formula`] - static translation or runtime fallback
//! - [`extract_references`] - precedent discovery from formula text
//! - [`create_engine`], [`eval_script`] - Rhai evaluation for generated scripts

mod deps;
mod eval;
mod graph;
mod location;
mod naming;
mod tokenizer;
mod translate;

pub use deps::{MAX_DEPENDENCY_RANGE_CELLS, extract_references};
pub use eval::{create_engine, eval_script};
pub use graph::{ExecutionOrder, build_order};
pub use location::{CellLocation, RangeRef, Reference, parse_reference};
pub use naming::{
    HeaderTable, NamedRange, NamingAuthority, ResolvedName, allocate_identifier, resolve_names,
};
pub use tokenizer::{Token, tokenize};
pub use translate::{
    FUNCTION_MAP, MAX_STATIC_RANGE_CELLS, TranslationOutcome, VOLATILE_FUNCTIONS,
    translate_formula, translate_operator,
};

pub use rhai::Dynamic;
