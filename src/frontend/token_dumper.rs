use std::fmt::Write;

use crate::frontend::token::{Token, TokenKind};

pub struct TokenDumper {
    pub color: bool,
    pub show_spans: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_spans: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const RED: &'static str = "\x1b[31m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn no_spans(mut self) -> Self {
        self.show_spans = false;
        self
    }

    pub fn dump(&self, tokens: &[Token<'_>]) -> String {
        let mut out = String::new();
        for token in tokens {
            self.write_one(&mut out, token);
        }
        out
    }

    fn write_one(&self, out: &mut String, token: &Token<'_>) {
        let colr = if self.color { self.color(token.kind) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        if self.show_spans {
            let _ = write!(out, "[{:02}:{:02}] ", token.span.line, token.span.col);
        }
        let _ = writeln!(
            out,
            "{}{:<8} {}{}",
            colr,
            self.kind(token.kind),
            token,
            reset
        );
    }

    fn kind(&self, kind: TokenKind) -> &'static str {
        match kind {
            TokenKind::None => "EOF",
            TokenKind::Invalid => "INVALID",
            TokenKind::Colon => "COLON",
            TokenKind::Semicolon => "SEMI",
            TokenKind::Symbol => "SYMBOL",
            TokenKind::Number => "NUMBER",
        }
    }

    fn color(&self, kind: TokenKind) -> &'static str {
        match kind {
            TokenKind::None | TokenKind::Semicolon | TokenKind::Colon => Self::DIM,
            TokenKind::Invalid => Self::RED,
            TokenKind::Number => Self::CYN,
            TokenKind::Symbol => Self::YEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    #[test]
    fn test_plain_dump() {
        let tokens = Lexer::new("add r0 0x10;").tokenize();
        let out = TokenDumper::new().no_color().dump(&tokens);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "[01:01] SYMBOL   add");
        assert_eq!(lines[2], "[01:08] NUMBER   0x10");
        assert_eq!(lines[3], "[01:12] SEMI     ;");
        assert_eq!(lines[4], "[01:13] EOF      EOF");
    }

    #[test]
    fn test_label_is_a_symbol_then_colon() {
        let tokens = Lexer::new("top: goto top;").tokenize();
        let out = TokenDumper::new().no_color().no_spans().dump(&tokens);
        let kinds: Vec<&str> = out.lines().filter_map(|l| l.split_whitespace().next()).collect();
        assert_eq!(kinds, ["SYMBOL", "COLON", "SYMBOL", "SYMBOL", "SEMI", "EOF"]);
    }

    #[test]
    fn test_dump_without_spans() {
        let tokens = Lexer::new("x").tokenize();
        let out = TokenDumper::new().no_color().no_spans().dump(&tokens);
        assert_eq!(out, "SYMBOL   x\nEOF      EOF\n");
    }
}
