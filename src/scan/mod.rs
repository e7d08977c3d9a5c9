//! Lexical scanning of C/C++ text.
//!
//! Everything above this layer asks "is this byte real code?" through the
//! scanner instead of looking at raw characters, so braces, keywords and
//! markers inside comments or string/char literals never count.

mod braces;
mod lexer;

pub use braces::{brace_balance, find_matching_brace};
pub use lexer::{
    comment_starts, final_state, CommentKind, LexState, LexUnit, Normalized, Scanner,
};

/// Whether `offset` is the first non-blank byte of its line.
pub fn at_line_start(text: &str, offset: usize) -> bool {
    text[..offset]
        .bytes()
        .rev()
        .take_while(|&b| b != b'\n')
        .all(|b| b == b' ' || b == b'\t')
}

/// Offset just past the line that contains `offset`, following backslash
/// continuations.
pub fn logical_line_end(text: &str, offset: usize) -> usize {
    let mut pos = offset;
    loop {
        let Some(rel) = text[pos..].find('\n') else {
            return text.len();
        };
        let nl = pos + rel;
        if !text[..nl].trim_end_matches([' ', '\t', '\r']).ends_with('\\') {
            return nl + 1;
        }
        pos = nl + 1;
    }
}

/// 1-based line number of a byte offset.
pub fn line_of(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}
