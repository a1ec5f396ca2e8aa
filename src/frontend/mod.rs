//! Script text front end: tokens, the lexer and the statement parser.

pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;

pub use lexer::Lexer;
pub use parser::{Parser, Statement};
pub use parser_error::ParserError;
pub use token::{Expect, Span, Token, TokenKind};
pub use token_dumper::TokenDumper;
