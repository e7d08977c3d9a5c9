//! Function definition discovery.
//!
//! Walks top-level braces in Normal lexical state. The text between the
//! previous statement boundary and a `{` is the header candidate; if a line
//! of it matches the signature shape the brace opens a function body.
//! Namespaces, `extern "C"` blocks and class/struct/union definitions are
//! descended into so member functions are found too. Every other brace
//! (enums, initializers) is skipped whole.

use regex::Regex;

use crate::scan::{at_line_start, find_matching_brace, line_of, logical_line_end, LexState, Normalized, Scanner};

lazy_static::lazy_static! {
    static ref SIGNATURE: Regex = Regex::new(
        r"(?s)^(?P<ret>[A-Za-z_][\w\s\*&:<>,]*?[\s\*&])(?P<name>~?[A-Za-z_][\w:~]*)\s*\((?P<params>.*)\)(?P<quals>(?:\s*(?:const|noexcept|override|final|volatile))*)\s*$"
    ).unwrap();
    static ref ATTRIBUTE: Regex = Regex::new(r"__attribute__\s*\(\([^)]*\)\)").unwrap();
    static ref CONTAINER: Regex = Regex::new(
        r#"(?s)^(?:namespace(?:\s+[\w:]+)?|extern\s*"C(?:\+\+)?"|(?:template\s*<[^{};]*>\s*)?(?:class|struct|union)\s+[A-Za-z_][\w:]*(?:\s+final)?(?:\s*:[^{};()]*)?)\s*$"#
    ).unwrap();
}

/// Names that can never be a defined function.
const NOT_FUNCTIONS: &[&str] = &[
    "if", "while", "for", "switch", "return", "sizeof", "else", "do", "case", "defined",
];

/// First words that rule out a header as a function definition.
const NOT_RETURN_TYPES: &[&str] = &["return", "else", "typedef", "enum", "goto", "case"];

/// Byte range into the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// A function definition with a matched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    /// Raw text between the parameter parentheses.
    pub params: String,
    /// From the first byte of the signature up to the opening brace.
    pub header: SourceSpan,
    /// Offset of the opening brace.
    pub open_brace: usize,
    /// Offset of the closing brace.
    pub close_brace: usize,
    /// Leading whitespace of the signature line.
    pub header_indent: String,
    /// 1-based line of the signature.
    pub line: usize,
}

impl FunctionRecord {
    /// Text strictly between the braces.
    pub fn body(&self) -> SourceSpan {
        SourceSpan::new(self.open_brace + 1, self.close_brace)
    }
}

/// Result of matching one function header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionMatch {
    Complete(FunctionRecord),
    /// The header matched but its body brace never closes.
    Unterminated {
        name: String,
        line: usize,
        open_brace: usize,
    },
}

struct Signature {
    name: String,
    params: String,
    start: usize,
}

enum Header {
    Function(Signature),
    Container,
    Other,
}

/// Find every function definition in `source`, in order.
///
/// Scanning stops at the first function whose body is never closed; the
/// rest of the buffer is left to the caller untouched.
pub fn find_functions(source: &str) -> Vec<FunctionMatch> {
    let bytes = source.as_bytes();
    let mut matches = Vec::new();
    let mut header_start = 0;
    let mut pos = 0;

    'restart: while pos < source.len() {
        let mut scanner = Scanner::starting_at(source, pos);
        while let Some(unit) = scanner.next() {
            if unit.state != LexState::Normal || unit.len != 1 {
                continue;
            }
            let offset = unit.offset;
            match bytes[offset] {
                b';' | b'}' => header_start = offset + 1,
                b'#' if at_line_start(source, offset) => {
                    let end = logical_line_end(source, offset);
                    header_start = end;
                    pos = end;
                    continue 'restart;
                }
                b'{' => match classify_header(source, header_start, offset) {
                    Header::Function(sig) => {
                        let line = line_of(source, sig.start);
                        let Some(close) = find_matching_brace(source, offset) else {
                            matches.push(FunctionMatch::Unterminated {
                                name: sig.name,
                                line,
                                open_brace: offset,
                            });
                            return matches;
                        };
                        matches.push(FunctionMatch::Complete(FunctionRecord {
                            name: sig.name,
                            params: sig.params,
                            header: SourceSpan::new(sig.start, offset),
                            open_brace: offset,
                            close_brace: close,
                            header_indent: indent_at(source, sig.start).to_string(),
                            line,
                        }));
                        pos = close + 1;
                        header_start = pos;
                        continue 'restart;
                    }
                    Header::Container => header_start = offset + 1,
                    Header::Other => match find_matching_brace(source, offset) {
                        Some(close) => {
                            pos = close + 1;
                            header_start = pos;
                            continue 'restart;
                        }
                        None => return matches,
                    },
                },
                _ => {}
            }
        }
        break;
    }
    matches
}

fn classify_header(source: &str, start: usize, brace: usize) -> Header {
    let raw = &source[start..brace];
    let code = Normalized::new(raw).code;
    let code = ATTRIBUTE.replace_all(&code, |caps: &regex::Captures| " ".repeat(caps[0].len()));

    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Header::Other;
    }
    if CONTAINER.is_match(trimmed) {
        return Header::Container;
    }

    let line_starts = std::iter::once(0).chain(
        code.match_indices('\n')
            .map(|(i, _)| i + 1)
            .filter(|&i| i < code.len()),
    );
    // The innermost matching line wins, so `public:` or a template line
    // above the signature does not become part of the return type.
    let mut found = None;
    for line_start in line_starts {
        let candidate = &code[line_start..];
        let lead = candidate.len() - candidate.trim_start().len();
        if let Some(sig) = match_signature(candidate.trim()) {
            found = Some(Signature {
                start: start + line_start + lead,
                ..sig
            });
        }
    }
    found.map_or(Header::Other, Header::Function)
}

fn match_signature(candidate: &str) -> Option<Signature> {
    let caps = SIGNATURE.captures(candidate)?;
    let name = caps["name"].to_string();
    let params = caps["params"].to_string();

    let base_name = name.rsplit("::").next().unwrap_or(&name);
    if NOT_FUNCTIONS.contains(&base_name) {
        return None;
    }
    let first_word = caps["ret"].split_whitespace().next().unwrap_or("");
    if NOT_RETURN_TYPES.contains(&first_word) {
        return None;
    }
    if !balanced(&params) {
        return None;
    }
    Some(Signature {
        name,
        params: params.trim().to_string(),
        start: 0,
    })
}

fn balanced(params: &str) -> bool {
    let mut depth = 0i32;
    for c in params.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn indent_at(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..offset];
    let end = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..end]
}

/// Only the complete matches.
pub fn complete_functions(source: &str) -> Vec<FunctionRecord> {
    find_functions(source)
        .into_iter()
        .filter_map(|m| match m {
            FunctionMatch::Complete(record) => Some(record),
            FunctionMatch::Unterminated { .. } => None,
        })
        .collect()
}
