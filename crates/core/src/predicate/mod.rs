//! Notification predicate language.
//!
//! A predicate is a short program over the merged record and input fields.
//! The grammar is closed: literals, field references, attribute and index
//! access, list literals, comparisons (`== != < <= > >=`), membership
//! (`in`, `not in`), boolean connectives (`and`, `or`, `not`) and
//! assignments. Statements are separated by `;` or newlines; the value of
//! the last statement is the result.
//!
//! There are no function calls and no access to anything outside the
//! bindings passed in. Expressions nest at most 64 levels deep; deeper
//! input is rejected as a syntax error.

mod eval;
mod lexer;
mod parser;

pub use eval::is_truthy;
pub use parser::{CompareOp, Expr, Program, Stmt};

use crate::Fields;

/// Errors raised while parsing or evaluating a predicate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("name '{name}' is not defined (line {line})")]
    UnknownName { name: String, line: u32 },

    #[error("type error on line {line}: {message}")]
    Type { line: u32, message: String },
}

impl PredicateError {
    pub(crate) fn syntax(line: u32, message: impl Into<String>) -> Self {
        PredicateError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(line: u32, message: impl Into<String>) -> Self {
        PredicateError::Type {
            line,
            message: message.into(),
        }
    }
}

/// Parse predicate source without evaluating it.
pub fn parse(source: &str) -> Result<Program, PredicateError> {
    let tokens = lexer::lex(source)?;
    parser::parse(&tokens)
}

/// Parse and evaluate `source` against `bindings`.
///
/// Returns the value of the last statement; `null` when there is none.
/// Callers decide truthiness with [`is_truthy`].
pub fn evaluate(source: &str, bindings: &Fields) -> Result<serde_json::Value, PredicateError> {
    let program = parse(source)?;
    eval::eval_program(&program, bindings)
}
