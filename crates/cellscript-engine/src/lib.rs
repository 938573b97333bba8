//! cellscript-engine - formula resolution and translation engine.
//!
//! Everything here is pure, synchronous computation: cell locations and
//! ranges, identifier allocation and naming, dependency scheduling, the
//! formula tokenizer/translator, and the Rhai builtin registry used by
//! generated scripts.

pub mod builtins;
pub mod engine;

pub use engine::{CellLocation, Reference, ResolvedName, TranslationOutcome};
