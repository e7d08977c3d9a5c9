//! Byte-level lexical state machine for C/C++ source.
//!
//! The scanner walks the text as a sequence of units. A unit is a single
//! byte, or one of the two-byte pairs that must be consumed atomically:
//! `//`, `/*`, `*/` and a backslash escape inside a literal.

/// Lexical context of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    Normal,
    LineComment,
    BlockComment,
    StringLiteral,
    CharLiteral,
}

impl LexState {
    pub fn is_comment(self) -> bool {
        matches!(self, LexState::LineComment | LexState::BlockComment)
    }
}

/// One lexical unit and the state it belongs to.
///
/// Opening and closing delimiters carry the state of the construct they
/// delimit, so `/*` and `*/` are both `BlockComment` and both quotes of a
/// string are `StringLiteral`. The newline that ends a line comment is
/// `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexUnit {
    pub offset: usize,
    pub len: usize,
    pub state: LexState,
}

impl LexUnit {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Iterator over the lexical units of a text.
pub struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    state: LexState,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::starting_at(text, 0)
    }

    /// Start scanning at `offset`, which must be a position in Normal state.
    pub fn starting_at(text: &'a str, offset: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: offset.min(text.len()),
            state: LexState::Normal,
        }
    }

    /// State the scanner is in after the last yielded unit.
    pub fn state(&self) -> LexState {
        self.state
    }

    fn unit(&mut self, len: usize, state: LexState) -> LexUnit {
        let len = len.min(self.bytes.len() - self.pos);
        let unit = LexUnit {
            offset: self.pos,
            len,
            state,
        };
        self.pos += len;
        unit
    }
}

impl Iterator for Scanner<'_> {
    type Item = LexUnit;

    fn next(&mut self) -> Option<LexUnit> {
        let b = *self.bytes.get(self.pos)?;
        let next = self.bytes.get(self.pos + 1).copied();

        let unit = match self.state {
            LexState::Normal => match (b, next) {
                (b'/', Some(b'/')) => {
                    self.state = LexState::LineComment;
                    self.unit(2, LexState::LineComment)
                }
                (b'/', Some(b'*')) => {
                    self.state = LexState::BlockComment;
                    self.unit(2, LexState::BlockComment)
                }
                (b'"', _) => {
                    self.state = LexState::StringLiteral;
                    self.unit(1, LexState::StringLiteral)
                }
                (b'\'', _) => {
                    self.state = LexState::CharLiteral;
                    self.unit(1, LexState::CharLiteral)
                }
                _ => self.unit(1, LexState::Normal),
            },
            LexState::LineComment => {
                if b == b'\n' {
                    self.state = LexState::Normal;
                    self.unit(1, LexState::Normal)
                } else {
                    self.unit(1, LexState::LineComment)
                }
            }
            LexState::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    self.state = LexState::Normal;
                    self.unit(2, LexState::BlockComment)
                } else {
                    self.unit(1, LexState::BlockComment)
                }
            }
            state @ (LexState::StringLiteral | LexState::CharLiteral) => {
                let quote = if state == LexState::StringLiteral {
                    b'"'
                } else {
                    b'\''
                };
                if b == b'\\' {
                    self.unit(2, state)
                } else {
                    if b == quote {
                        self.state = LexState::Normal;
                    }
                    self.unit(1, state)
                }
            }
        };
        Some(unit)
    }
}

/// State at the end of the text. Anything other than `Normal` means an
/// unterminated comment or literal.
pub fn final_state(text: &str) -> LexState {
    let mut scanner = Scanner::new(text);
    for _ in scanner.by_ref() {}
    scanner.state()
}

/// Kind of comment that starts at an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

/// Offsets of every real comment opener (`//` or `/*`) in the text.
pub fn comment_starts(text: &str) -> Vec<(usize, CommentKind)> {
    let bytes = text.as_bytes();
    Scanner::new(text)
        .filter(|u| u.len == 2 && u.state.is_comment() && bytes[u.offset] == b'/')
        .map(|u| {
            let kind = if bytes[u.offset + 1] == b'/' {
                CommentKind::Line
            } else {
                CommentKind::Block
            };
            (u.offset, kind)
        })
        .collect()
}

/// Comment-free and literal-masked views of a text.
///
/// Both views have exactly the byte length of the input and keep every
/// newline, so offsets and line numbers carry over unchanged.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Comments replaced by spaces, literals intact.
    pub code: String,
    /// Comments and literal interiors replaced by spaces. Quote
    /// delimiters are kept.
    pub masked: String,
}

impl Normalized {
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut code = bytes.to_vec();
        let mut masked = bytes.to_vec();

        for unit in Scanner::new(text) {
            let range = unit.offset..unit.end();
            match unit.state {
                LexState::Normal => {}
                LexState::LineComment | LexState::BlockComment => {
                    blank(&mut code, range.clone());
                    blank(&mut masked, range);
                }
                LexState::StringLiteral | LexState::CharLiteral => {
                    let quote = if unit.state == LexState::StringLiteral {
                        b'"'
                    } else {
                        b'\''
                    };
                    let delimiter = unit.len == 1 && bytes[unit.offset] == quote;
                    if !delimiter {
                        blank(&mut masked, range);
                    }
                }
            }
        }

        Self {
            code: into_string(code, text),
            masked: into_string(masked, text),
        }
    }
}

fn blank(buf: &mut [u8], range: std::ops::Range<usize>) {
    for b in &mut buf[range] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

fn into_string(bytes: Vec<u8>, original: &str) -> String {
    // Every replaced byte belongs to a fully replaced character, so this only
    // fails on inputs the scanner never produces. Fall back to the original
    // text to keep offsets aligned.
    String::from_utf8(bytes).unwrap_or_else(|_| original.to_string())
}
