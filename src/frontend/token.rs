/// Source location of a token.
///
/// `line` and `col` are 1-based, `start`/`end` are byte offsets into the
/// script text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input.
    None,
    /// Malformed input, e.g. `0x1g` or a stray `;`.
    Invalid,
    Colon,
    Semicolon,
    Symbol,
    Number,
}

/// Terminators the caller is prepared to accept as the next token.
///
/// A `:` or `;` that shows up while it is not expected comes back as
/// [`TokenKind::Invalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expect {
    pub colon: bool,
    pub semicolon: bool,
}

impl Expect {
    pub const NOTHING: Expect = Expect {
        colon: false,
        semicolon: false,
    };
    pub const COLON: Expect = Expect {
        colon: true,
        semicolon: false,
    };
    pub const SEMICOLON: Expect = Expect {
        colon: false,
        semicolon: true,
    };
    pub const COLON_OR_SEMICOLON: Expect = Expect {
        colon: true,
        semicolon: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    pub span: Span,
}

impl<'s> Token<'s> {
    pub fn new(kind: TokenKind, text: &'s str, span: Span) -> Self {
        Self { kind, text, span }
    }

    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::None
    }

    /// Parses a `Number` token into a 32-bit value.
    ///
    /// Hex literals cover the full unsigned range (`0xFFFFFFFF` is `-1`),
    /// decimal literals must fit `i32`.
    pub fn number(&self) -> Option<i32> {
        if self.kind != TokenKind::Number {
            return None;
        }
        parse_number(self.text)
    }
}

pub(crate) fn parse_number(text: &str) -> Option<i32> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let magnitude: i64 = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return None;
        }
        let raw = u32::from_str_radix(hex, 16).ok()?;
        if negative {
            -(i64::from(raw))
        } else {
            return Some(raw as i32);
        }
    } else {
        let value: i64 = digits.parse().ok()?;
        if negative { -value } else { value }
    };

    i32::try_from(magnitude).ok()
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::None => "end of input",
            TokenKind::Invalid => "invalid token",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Symbol => "symbol",
            TokenKind::Number => "number",
        };
        write!(f, "{}", name)
    }
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::None => write!(f, "EOF"),
            _ => write!(f, "{}", self.text),
        }
    }
}
