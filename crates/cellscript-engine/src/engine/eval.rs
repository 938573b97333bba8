//! Rhai engine creation and script evaluation.
//!
//! Generated scripts are self-contained statement sequences; the engine
//! they run under only needs the spreadsheet builtins (SUM, AVERAGE,
//! IF, ...) and the EVAL_CELL runtime-evaluator hook registered by
//! [`crate::builtins::register_builtins`].

use rhai::{Dynamic, Engine, EvalAltResult};

/// Create a Rhai engine with the generated-script builtins registered.
pub fn create_engine() -> Engine {
    let mut engine = Engine::new();
    crate::builtins::register_builtins(&mut engine);
    engine
}

/// Evaluate a generated script, returning the value of its final
/// expression (unit for pure statement sequences).
pub fn eval_script(script: &str) -> Result<Dynamic, Box<EvalAltResult>> {
    create_engine().eval(script)
}
