//! Built-in functions for generated scripts.
//!
//! Conventions:
//! - Script-facing builtin names are ALL CAPS (e.g. `SUM`, `AVERAGE`),
//!   matching the spreadsheet function names they translate from.
//! - Aggregates accept either an array (the expansion of a range
//!   reference) or up to four scalar arguments.
//! - `EVAL_CELL` is the runtime-evaluator collaborator hook. The default
//!   registration binds it to a neutral placeholder so generated scripts
//!   run standalone; hosts with a real evaluator re-register it.

use rhai::{Array, Dynamic, Engine, ImmutableString};

/// Register all builtins used by generated scripts.
pub fn register_builtins(engine: &mut Engine) {
    engine.register_fn("SUM", |values: Array| sum(&values));
    engine.register_fn("SUM", |a: f64| a);
    engine.register_fn("SUM", |a: f64, b: f64| a + b);
    engine.register_fn("SUM", |a: f64, b: f64, c: f64| a + b + c);
    engine.register_fn("SUM", |a: f64, b: f64, c: f64, d: f64| a + b + c + d);

    engine.register_fn("AVERAGE", |values: Array| average(&values));
    engine.register_fn("AVERAGE", |a: f64| a);
    engine.register_fn("AVERAGE", |a: f64, b: f64| (a + b) / 2.0);
    engine.register_fn("AVERAGE", |a: f64, b: f64, c: f64| (a + b + c) / 3.0);
    engine.register_fn("AVERAGE", |a: f64, b: f64, c: f64, d: f64| {
        (a + b + c + d) / 4.0
    });

    engine.register_fn("MIN", |values: Array| fold(&values, f64::min));
    engine.register_fn("MIN", |a: f64, b: f64| a.min(b));
    engine.register_fn("MIN", |a: f64, b: f64, c: f64| a.min(b).min(c));
    engine.register_fn("MIN", |a: f64, b: f64, c: f64, d: f64| a.min(b).min(c).min(d));

    engine.register_fn("MAX", |values: Array| fold(&values, f64::max));
    engine.register_fn("MAX", |a: f64, b: f64| a.max(b));
    engine.register_fn("MAX", |a: f64, b: f64, c: f64| a.max(b).max(c));
    engine.register_fn("MAX", |a: f64, b: f64, c: f64, d: f64| a.max(b).max(c).max(d));

    engine.register_fn("ABS", |a: f64| a.abs());
    engine.register_fn("ROUND", |a: f64| a.round());
    engine.register_fn("ROUND", |a: f64, digits: f64| {
        let factor = 10f64.powi(digits as i32);
        (a * factor).round() / factor
    });

    engine.register_fn("IF", |cond: bool, then_val: Dynamic, else_val: Dynamic| {
        if cond { then_val } else { else_val }
    });

    engine.register_fn("AND", |a: bool, b: bool| a && b);
    engine.register_fn("AND", |a: bool, b: bool, c: bool| a && b && c);
    engine.register_fn("AND", |a: bool, b: bool, c: bool, d: bool| a && b && c && d);
    engine.register_fn("OR", |a: bool, b: bool| a || b);
    engine.register_fn("OR", |a: bool, b: bool, c: bool| a || b || c);
    engine.register_fn("OR", |a: bool, b: bool, c: bool, d: bool| a || b || c || d);
    engine.register_fn("NOT", |a: bool| !a);

    engine.register_fn("EVAL_CELL", |location: ImmutableString| -> f64 {
        log::warn!(
            "EVAL_CELL({}) called with the placeholder evaluator; returning 0.0",
            location
        );
        0.0
    });
}

/// Numeric values of an array, skipping non-numeric entries the way
/// spreadsheet aggregates skip text cells.
fn numbers(values: &Array) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| {
            v.as_float()
                .ok()
                .or_else(|| v.as_int().ok().map(|n| n as f64))
        })
        .collect()
}

fn sum(values: &Array) -> f64 {
    numbers(values).iter().sum()
}

fn average(values: &Array) -> f64 {
    let nums = numbers(values);
    if nums.is_empty() {
        return 0.0;
    }
    nums.iter().sum::<f64>() / nums.len() as f64
}

fn fold(values: &Array, op: fn(f64, f64) -> f64) -> f64 {
    let nums = numbers(values);
    let mut iter = nums.into_iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    iter.fold(first, op)
}
