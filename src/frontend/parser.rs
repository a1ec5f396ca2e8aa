use crate::frontend::lexer::Lexer;
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::{Expect, Span, Token, TokenKind};

/// One source line of a script: `[label:] name arg0 arg1 ... ;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement<'s> {
    pub label: Option<Token<'s>>,
    pub name: Token<'s>,
    pub args: Vec<Token<'s>>,
    /// Covers the statement from its first token up to and including `;`.
    pub span: Span,
}

impl<'s> Statement<'s> {
    /// Statement source text, used for error context.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.span.start..self.span.end).unwrap_or("")
    }
}

/// Splits a script into statements.
///
/// The parser pulls tokens from the lexer and tells it which terminator is
/// legal next: `:` only right after the first word of a statement, `;`
/// everywhere after the operation name.
pub struct Parser<'s> {
    lexer: Lexer<'s>,
    max_args: usize,
}

impl<'s> Parser<'s> {
    pub fn new(source: &'s str, max_args: usize) -> Self {
        Parser {
            lexer: Lexer::new(source),
            max_args,
        }
    }

    /// Returns the next statement, or `None` at end of input.
    pub fn next_statement(&mut self) -> Result<Option<Statement<'s>>, ParserError> {
        let first = self.lexer.next_token(Expect::NOTHING);
        match first.kind {
            TokenKind::None => return Ok(None),
            TokenKind::Symbol => {}
            _ => return Err(unexpected(&first, "an operation name or label")),
        }

        let mut label = None;
        let mut name = first;
        let mut args = Vec::new();

        let second = self.lexer.next_token(Expect::COLON_OR_SEMICOLON);
        let mut pending = match second.kind {
            TokenKind::Colon => {
                label = Some(first);
                name = self.lexer.next_token(Expect::NOTHING);
                if name.kind != TokenKind::Symbol {
                    return Err(unexpected(&name, "an operation name after label"));
                }
                self.lexer.next_token(Expect::SEMICOLON)
            }
            _ => second,
        };

        loop {
            match pending.kind {
                TokenKind::Semicolon => break,
                TokenKind::Symbol | TokenKind::Number => {
                    if args.len() >= self.max_args {
                        return Err(ParserError::at(
                            pending.span,
                            format!(
                                "too many arguments for '{}' (at most {})",
                                name.text, self.max_args
                            ),
                        ));
                    }
                    args.push(pending);
                }
                TokenKind::None => {
                    return Err(ParserError::at(
                        pending.span,
                        format!("missing ';' after '{}'", name.text),
                    ));
                }
                _ => return Err(unexpected(&pending, "an argument or ';'")),
            }
            pending = self.lexer.next_token(Expect::SEMICOLON);
        }

        let start = label.map(|l| l.span).unwrap_or(name.span);
        let span = Span {
            line: start.line,
            col: start.col,
            start: start.start,
            end: pending.span.end,
        };

        Ok(Some(Statement {
            label,
            name,
            args,
            span,
        }))
    }

    /// Parses every statement of the script.
    pub fn parse_all(mut self) -> Result<Vec<Statement<'s>>, ParserError> {
        let mut statements = Vec::new();
        while let Some(statement) = self.next_statement()? {
            statements.push(statement);
        }
        Ok(statements)
    }
}

fn unexpected(token: &Token<'_>, wanted: &str) -> ParserError {
    let found = match token.kind {
        TokenKind::None => "end of input".to_string(),
        TokenKind::Invalid => format!("invalid token '{}'", token.text),
        _ => format!("'{}'", token.text),
    };
    ParserError::at(token.span, format!("expected {}, found {}", wanted, found))
}
