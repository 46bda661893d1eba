//! Error types for the field model.
//!
//! Expression failures are normally swallowed by [`crate::Variable`]; these
//! types only surface through the explicit `try_*` entry points.

use thiserror::Error;

/// Failure to tokenize, parse, or evaluate an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token '{found}' at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),

    #[error("expression evaluated to NaN")]
    NotANumber,

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("expression has more than {0} tokens")]
    TooLong(usize),
}

/// Failure to decode a configuration string.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("configuration string is empty")]
    Empty,

    #[error("malformed URI escape at byte {0}")]
    MalformedEscape(usize),

    #[error("escaped bytes are not valid UTF-8")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} entry '{entry}' has {found} fields, expected {expected}")]
    FieldCount {
        kind: &'static str,
        entry: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Failure to apply an editor request to a universe.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("no {kind} named '{name}'")]
    UnknownItem { kind: &'static str, name: String },

    #[error("{kind} has no field '{field}'")]
    UnknownField { kind: &'static str, field: String },

    #[error("invalid expression for '{field}': {source}")]
    InvalidExpression {
        field: String,
        #[source]
        source: ExpressionError,
    },

    #[error("'{field}' may not contain '_', which separates serialized fields")]
    ReservedSeparator { field: String },
}
