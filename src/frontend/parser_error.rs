use thiserror::Error;

use crate::frontend::token::Span;

/// A statement-level syntax error with source location.
///
/// `line` and `col` are 1-based positions coming from the lexer spans.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{col}: {message}")]
pub struct ParserError {
    pub message: String,
    pub line: u32,
    pub col: u32,
}

impl ParserError {
    pub fn at(span: Span, message: impl Into<String>) -> Self {
        ParserError {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }
}
