//! Formula tokenization.
//!
//! Lexes a spreadsheet formula into typed tokens: string literals, cell
//! and range references (optionally sheet-qualified, `$` markers
//! allowed), operators, bare identifiers (function names or named
//! ranges), number literals, parentheses, and argument separators.
//!
//! Alternatives match longest-first: string literals, then references,
//! then multi-character operators, then identifiers, numbers, and
//! punctuation. Whitespace is discarded. Anything else produces an
//! unrecognized-token warning and is skipped; one bad fragment never
//! aborts tokenization of the rest.

use regex::Regex;
use std::sync::OnceLock;

/// One lexed formula fragment. Reference text is kept raw here; it is
/// resolved against the naming table during translation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// A double-quoted string literal, quotes included.
    Str(String),
    /// A cell or range reference, e.g. `A1`, `$B$2`, `Sheet1!C3:D9`.
    Reference(String),
    /// An operator: `+ - * / = < > <= >= <> ^ &`.
    Operator(String),
    /// A bare identifier: function name or named range.
    Identifier(String),
    /// A numeric literal.
    Number(String),
    /// `(` or `)`.
    Paren(char),
    /// The argument separator `,`.
    Separator,
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?x)
            ("(?:\\"|[^"])*")                                                                   # 1: string literal
            | ((?:[A-Za-z_][A-Za-z0-9_]*!)?\$?[A-Za-z]{1,3}\$?[0-9]+(?::\$?[A-Za-z]{1,3}\$?[0-9]+)?)  # 2: cell/range reference
            | (<=|>=|<>|[-+*/=<>&^])                                                            # 3: operator, longest first
            | ([A-Za-z_][A-Za-z0-9_]*)                                                          # 4: identifier
            | ([0-9]+(?:\.[0-9]+)?)                                                             # 5: number
            | ([()])                                                                            # 6: parenthesis
            | (,)                                                                               # 7: separator
            "#,
        )
        .expect("formula token regex must compile")
    })
}

/// Tokenize a formula. A single leading `=` is discarded. Unrecognized
/// fragments are reported into `warnings` and skipped.
pub fn tokenize(formula: &str, warnings: &mut Vec<String>) -> Vec<Token> {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);

    let mut tokens = Vec::new();
    let mut last_end = 0usize;

    for caps in token_re().captures_iter(formula) {
        let whole = caps.get(0).expect("capture 0 always present");
        report_gap(formula, last_end, whole.start(), warnings);
        last_end = whole.end();

        let token = if let Some(m) = caps.get(1) {
            Token::Str(m.as_str().to_string())
        } else if let Some(m) = caps.get(2) {
            Token::Reference(m.as_str().to_string())
        } else if let Some(m) = caps.get(3) {
            Token::Operator(m.as_str().to_string())
        } else if let Some(m) = caps.get(4) {
            Token::Identifier(m.as_str().to_string())
        } else if let Some(m) = caps.get(5) {
            Token::Number(m.as_str().to_string())
        } else if let Some(m) = caps.get(6) {
            Token::Paren(m.as_str().chars().next().expect("paren is one char"))
        } else {
            Token::Separator
        };
        tokens.push(token);
    }

    report_gap(formula, last_end, formula.len(), warnings);
    tokens
}

/// Warn about non-whitespace text the token pattern skipped over.
fn report_gap(formula: &str, start: usize, end: usize, warnings: &mut Vec<String>) {
    if start >= end {
        return;
    }
    let gap = formula[start..end].trim();
    if !gap.is_empty() {
        warnings.push(format!(
            "unrecognized token `{}` in formula `{}`; skipped",
            gap, formula
        ));
    }
}
