//! Line-level facts about a function body.
//!
//! Every line of the body carries its raw text, the comment-free and
//! literal-masked views, and the nesting facts the classifiers need:
//! parenthesis depth, whether the line sits inside an aggregate initializer
//! and whether it begins a new statement.

use crate::scan::Normalized;

/// How many lines a single statement may span before we give up joining.
const MAX_STATEMENT_LINES: usize = 64;

/// Kind of an open brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BraceKind {
    Block,
    Aggregate,
}

/// One line of a function body.
#[derive(Debug, Clone)]
pub struct BodyLine {
    pub raw: String,
    pub code: String,
    pub masked: String,
    /// Preprocessor line, including backslash continuations.
    pub directive: bool,
    /// Parenthesis depth at the start of the line.
    pub depth_before: i32,
    pub depth_after: i32,
    /// The line starts inside an aggregate initializer, a statement
    /// expression or a lambda body.
    pub in_aggregate: bool,
    /// The line begins a statement at block level.
    pub stmt_start: bool,
}

impl BodyLine {
    pub fn indent(&self) -> &str {
        let end = self.raw.len() - self.raw.trim_start_matches([' ', '\t']).len();
        &self.raw[..end]
    }

    /// Masked text without surrounding whitespace.
    pub fn trimmed(&self) -> &str {
        self.masked.trim()
    }

    /// Not blank, not comment-only and not a preprocessor line.
    pub fn is_significant(&self) -> bool {
        !self.directive && !self.trimmed().is_empty()
    }
}

/// `case X:`, `default:` and goto labels.
pub fn is_label(trimmed: &str) -> bool {
    let Some(head) = trimmed.strip_suffix(':') else {
        return false;
    };
    if head.ends_with(':') {
        return false;
    }
    let head = head.trim();
    if head == "default" || head.starts_with("case ") || head.starts_with("case(") {
        return true;
    }
    if head == "public" || head == "private" || head == "protected" {
        return true;
    }
    !head.is_empty()
        && head
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && !head.as_bytes()[0].is_ascii_digit()
}

/// Whether `text` starts with `word` followed by a non-identifier byte.
pub fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word).is_some_and(|rest| {
        rest.bytes()
            .next()
            .map_or(true, |b| !(b.is_ascii_alphanumeric() || b == b'_'))
    })
}

/// Split a body into lines and compute the nesting facts of each.
pub fn analyze_lines(body: &str) -> Vec<BodyLine> {
    let norm = Normalized::new(body);
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in body.split('\n') {
        let end = offset + raw.len();
        lines.push(BodyLine {
            raw: raw.to_string(),
            code: norm.code[offset..end].to_string(),
            masked: norm.masked[offset..end].to_string(),
            directive: false,
            depth_before: 0,
            depth_after: 0,
            in_aggregate: false,
            stmt_start: false,
        });
        offset = end + 1;
    }

    mark_directives(&mut lines);
    track_nesting(&mut lines);
    mark_statement_starts(&mut lines);
    lines
}

fn mark_directives(lines: &mut [BodyLine]) {
    let mut continued = false;
    for line in lines.iter_mut() {
        let is_directive = continued || line.trimmed().starts_with('#');
        line.directive = is_directive;
        continued = is_directive && line.raw.trim_end().ends_with('\\');
    }
}

fn track_nesting(lines: &mut [BodyLine]) {
    let mut stack: Vec<BraceKind> = Vec::new();
    let mut depth = 0i32;
    let mut last_sig: Option<u8> = None;
    let mut word = String::new();
    let mut last_word = String::new();
    let mut prev_word = String::new();
    // One entry per open `(`: whether it directly follows `]`.
    let mut parens: Vec<bool> = Vec::new();
    // The last `)` closed a lambda parameter list.
    let mut lambda_head = false;

    for line in lines.iter_mut() {
        line.depth_before = depth;
        line.in_aggregate = stack.contains(&BraceKind::Aggregate);
        if line.directive {
            line.depth_after = depth;
            continue;
        }

        for b in line.masked.bytes().chain(std::iter::once(b'\n')) {
            if b.is_ascii_alphanumeric() || b == b'_' {
                word.push(b as char);
                continue;
            }
            if !word.is_empty() {
                prev_word = std::mem::take(&mut last_word);
                last_word = std::mem::take(&mut word);
                last_sig = Some(b'a');
            }
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => {}
                b'(' => {
                    parens.push(last_sig == Some(b']'));
                    depth += 1;
                    last_sig = Some(b);
                }
                b')' => {
                    lambda_head = parens.pop().unwrap_or(false);
                    depth = (depth - 1).max(0);
                    last_sig = Some(b);
                }
                b'{' => {
                    let kind = if lambda_head
                        || opens_aggregate(&stack, depth, last_sig, &last_word, &prev_word)
                    {
                        BraceKind::Aggregate
                    } else {
                        BraceKind::Block
                    };
                    stack.push(kind);
                    lambda_head = false;
                    last_sig = Some(b);
                    last_word.clear();
                    prev_word.clear();
                }
                b'}' | b';' => {
                    if b == b'}' {
                        stack.pop();
                    }
                    lambda_head = false;
                    last_sig = Some(b);
                    last_word.clear();
                    prev_word.clear();
                }
                _ => {
                    last_sig = Some(b);
                    last_word.clear();
                    prev_word.clear();
                }
            }
        }
        line.depth_after = depth;
    }
}

fn opens_aggregate(
    stack: &[BraceKind],
    depth: i32,
    last_sig: Option<u8>,
    last_word: &str,
    prev_word: &str,
) -> bool {
    const TAGS: &[&str] = &["struct", "union", "enum", "class"];
    if stack.last() == Some(&BraceKind::Aggregate) || depth > 0 {
        return true;
    }
    match last_sig {
        Some(b'=' | b',' | b'(' | b'[' | b'?' | b']') => true,
        Some(b'a') => {
            last_word == "return"
                || TAGS.contains(&last_word)
                || TAGS.contains(&prev_word)
        }
        _ => false,
    }
}

fn mark_statement_starts(lines: &mut [BodyLine]) {
    let mut prev: Option<usize> = None;
    for i in 0..lines.len() {
        if !lines[i].is_significant() {
            continue;
        }
        let line = &lines[i];
        let trimmed = line.trimmed();
        let mut start = line.depth_before == 0
            && !line.in_aggregate
            && !starts_with_word(trimmed, "else");

        if start {
            if let Some(p) = prev {
                let p_line = &lines[p];
                let p_trim = p_line.trimmed();
                let ends_statement = p_trim.ends_with(';')
                    || p_trim.ends_with('{')
                    || p_trim.ends_with('}')
                    || is_label(p_trim);
                start = p_line.depth_after == 0 && ends_statement;
                if p_trim == "}" && starts_with_word(trimmed, "while") {
                    start = false;
                }
            }
        }
        lines[i].stmt_start = start;
        prev = Some(i);
    }
}

/// Index of the last line of the statement that begins at `start`.
///
/// A statement ends on a line that closes all parentheses and aggregates
/// and ends with `;`, `{`, `}` or a label colon.
pub fn statement_end(lines: &[BodyLine], start: usize) -> usize {
    let limit = (start + MAX_STATEMENT_LINES).min(lines.len());
    for j in start..limit {
        let line = &lines[j];
        if line.directive {
            continue;
        }
        let next_in_aggregate = lines.get(j + 1).is_some_and(|n| n.in_aggregate);
        let t = line.trimmed();
        let closes = t.ends_with(';') || t.ends_with('{') || t.ends_with('}') || is_label(t);
        if line.depth_after == 0 && !next_in_aggregate && closes {
            return j;
        }
    }
    start
}

/// Masked text of lines `start..=end` joined by single spaces, skipping
/// preprocessor lines.
pub fn statement_text(lines: &[BodyLine], start: usize, end: usize) -> String {
    lines[start..=end]
        .iter()
        .filter(|l| !l.directive)
        .map(|l| l.trimmed())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
