use thiserror::Error;

use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Span;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("{0}")]
    Syntax(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("no overload of '{name}' accepts ({args})")]
    NoMatchingOverload { name: String, args: String },
    #[error("conflicting overloads of '{name}' match ({args})")]
    ConflictingOverloads { name: String, args: String },
    #[error("undeclared symbol '{0}'")]
    UndeclaredSymbol(String),
    #[error("block opened here is never closed with 'end'")]
    UnterminatedBlock,
    #[error("'else' outside of an 'if' block")]
    UnexpectedElse,
    #[error("'end' outside of an 'if' block")]
    UnexpectedEnd,
    #[error("block already has an unconditional 'else'")]
    DuplicateElse,
    #[error("invalid condition: {0}")]
    InvalidCondition(String),
    #[error("label '{0}' is already defined")]
    LabelRedefined(String),
    #[error("label '{0}' referenced but never declared")]
    LabelNotDeclared(String),
    #[error("variable '{0}' is already defined")]
    VariableRedefined(String),
    #[error("variable '{0}' declared inside a block")]
    VariableInBlock(String),
    #[error("no free register for variable '{0}'")]
    TooManyRegisters(String),
    #[error("invalid variable declaration: {0}")]
    InvalidVar(String),
    #[error("script is too large")]
    CodeTooLarge,
    #[error("internal compiler error: {0}")]
    Internal(String),
}

/// A rejected script, located at the offending statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{col}: {kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub line: u32,
    pub col: u32,
    /// Source text of the statement, empty when the error concerns the
    /// script as a whole.
    pub statement: String,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, span: Span, statement: impl Into<String>) -> Self {
        CompileError {
            kind,
            line: span.line,
            col: span.col,
            statement: statement.into(),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match &self.kind {
            CompileErrorKind::UnknownOperation(name) if name.contains('.') => {
                Some("methods are called on pointer variables, e.g. 'unit.getHealth unit x;'")
            }
            CompileErrorKind::UnknownOperation(_) => {
                Some("run 'modscript ops' to list every available operation")
            }
            CompileErrorKind::NoMatchingOverload { .. } => {
                Some("the first argument of most operations must be a writable variable")
            }
            CompileErrorKind::ConflictingOverloads { .. } => {
                Some("two host functions accept the same argument types")
            }
            CompileErrorKind::UnterminatedBlock => Some("add 'end;' after the last branch"),
            CompileErrorKind::VariableInBlock(_) => {
                Some("declare variables at the top of the script, before any 'if'")
            }
            CompileErrorKind::InvalidCondition(_) => {
                Some("conditions look like 'if le a b;' or 'if a le b;'")
            }
            CompileErrorKind::InvalidVar(_) => Some("e.g. 'var int x 5;' or 'var ptr Unit u;'"),
            _ => None,
        }
    }
}

impl From<ParserError> for CompileError {
    fn from(err: ParserError) -> Self {
        CompileError {
            kind: CompileErrorKind::Syntax(err.message),
            line: err.line,
            col: err.col,
            statement: String::new(),
        }
    }
}
