use crate::frontend::token::{Expect, Span, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    /// Not allowed anywhere in a token.
    None,
    /// Whitespace and `#` (comment start).
    Space,
    /// `:` and `;`.
    Terminator,
    Digit,
    /// `a-f` and `A-F`; valid in symbols and after `0x`.
    HexDigit,
    /// Any other identifier character, including `.` for member access.
    Rest,
    /// `+` and `-`, only valid in front of a number.
    Sign,
}

const fn build_classes() -> [CharClass; 256] {
    let mut table = [CharClass::None; 256];
    let mut i = 0;
    while i < 256 {
        let c = i as u8;
        table[i] = match c {
            b' ' | b'\t' | b'\r' | b'\n' | b'#' => CharClass::Space,
            b':' | b';' => CharClass::Terminator,
            b'0'..=b'9' => CharClass::Digit,
            b'a'..=b'f' | b'A'..=b'F' => CharClass::HexDigit,
            b'g'..=b'z' | b'G'..=b'Z' => CharClass::Rest,
            b'_' | b'.' | b'=' | b'!' | b'<' | b'>' | b'@' | b'$' | b'%' | b'&' | b'*' | b'/'
            | b'?' | b'~' | b'^' | b'|' => CharClass::Rest,
            b'+' | b'-' => CharClass::Sign,
            _ => CharClass::None,
        };
        i += 1;
    }
    table
}

static CHAR_CLASSES: [CharClass; 256] = build_classes();

fn class_of(byte: u8) -> CharClass {
    CHAR_CLASSES[byte as usize]
}

/// Single-pass tokenizer over script text.
///
/// Tokens are produced one at a time with [`Lexer::next_token`]; the cursor
/// only moves forward.
pub struct Lexer<'s> {
    source: &'s str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Lexer {
            source,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn advance(&mut self) {
        if let Some(byte) = self.current() {
            if byte == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn span_from(&self, start: usize, line: u32, col: u32) -> Span {
        Span {
            line,
            col,
            start,
            end: self.pos,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(byte) = self.current() {
            if byte == b'#' {
                while let Some(c) = self.current() {
                    if c == b'\n' {
                        break;
                    }
                    self.advance();
                }
            } else if class_of(byte) == CharClass::Space {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Returns the next token.
    ///
    /// `expect` tells which of `:` / `;` the caller can accept at this point.
    /// Words always stop at `:`, `;`, whitespace and comments; a terminator
    /// met on its own is returned as `Colon`/`Semicolon` only when expected.
    pub fn next_token(&mut self, expect: Expect) -> Token<'s> {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let (line, col) = (self.line, self.col);

        let Some(first) = self.current() else {
            return Token::new(TokenKind::None, "", self.span_from(start, line, col));
        };

        if class_of(first) == CharClass::Terminator {
            self.advance();
            let kind = match first {
                b':' if expect.colon => TokenKind::Colon,
                b';' if expect.semicolon => TokenKind::Semicolon,
                _ => TokenKind::Invalid,
            };
            return Token::new(kind, &self.source[start..self.pos], self.span_from(start, line, col));
        }

        while let Some(byte) = self.current() {
            match class_of(byte) {
                CharClass::Space | CharClass::Terminator => break,
                _ => self.advance(),
            }
        }

        let text = &self.source[start..self.pos];
        Token::new(classify_word(text), text, self.span_from(start, line, col))
    }

    /// Collects every token until end of input, accepting both terminators.
    ///
    /// Used by diagnostics (`modscript tokens`); the compiler pulls tokens
    /// lazily instead.
    pub fn tokenize(&mut self) -> Vec<Token<'s>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(Expect::COLON_OR_SEMICOLON);
            let end = token.is_end();
            tokens.push(token);
            if end {
                break;
            }
        }
        tokens
    }
}

fn classify_word(text: &str) -> TokenKind {
    let bytes = text.as_bytes();
    let Some(&first) = bytes.first() else {
        return TokenKind::Invalid;
    };

    match class_of(first) {
        CharClass::Digit => classify_number(bytes),
        CharClass::Sign => match bytes.get(1) {
            Some(&next) if class_of(next) == CharClass::Digit => classify_number(&bytes[1..]),
            _ => TokenKind::Invalid,
        },
        CharClass::HexDigit | CharClass::Rest => {
            let valid = bytes.iter().all(|&b| {
                matches!(
                    class_of(b),
                    CharClass::Digit | CharClass::HexDigit | CharClass::Rest
                )
            });
            if valid {
                TokenKind::Symbol
            } else {
                TokenKind::Invalid
            }
        }
        _ => TokenKind::Invalid,
    }
}

fn classify_number(bytes: &[u8]) -> TokenKind {
    if let [b'0', b'x' | b'X', hex @ ..] = bytes {
        if !hex.is_empty()
            && hex
                .iter()
                .all(|&b| matches!(class_of(b), CharClass::Digit | CharClass::HexDigit))
        {
            return TokenKind::Number;
        }
        return TokenKind::Invalid;
    }

    if bytes.iter().all(|&b| class_of(b) == CharClass::Digit) {
        TokenKind::Number
    } else {
        TokenKind::Invalid
    }
}
