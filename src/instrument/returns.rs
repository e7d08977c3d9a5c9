//! Guard analysis for `return` statements.
//!
//! A `return` that is the whole body of a brace-less `if`/`else`/loop must
//! not get an exit log spliced in front of it: the log would run whether or
//! not the guard holds.

use regex::Regex;

use crate::analysis::{control_kind, is_label, BodyLine, FormatSpec, KnownTypes};

lazy_static::lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_]\w*$").unwrap();
    static ref MEMBER_CHAIN: Regex = Regex::new(r"^[A-Za-z_]\w*(?:\s*(?:\.|->)\s*[A-Za-z_]\w*)+$").unwrap();
    static ref INTEGER: Regex = Regex::new(r"^-?(?:0[xX][0-9a-fA-F]+|\d+)[uUlL]*$").unwrap();
    static ref FLOAT: Regex = Regex::new(r"^-?\d+\.\d*(?:[eE][-+]?\d+)?[fF]?$").unwrap();
}

/// Number of significant lines searched above a `return` for its guard.
pub const LOOKBACK_LINES: usize = 5;

/// Whether a statement is the body of a brace-less control header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlContext {
    /// Runs whenever the statement before it runs.
    Unguarded,
    /// Sole statement of a brace-less `if`, `else`, loop or `do`.
    Guarded,
    /// Preceded by an unknown open head such as an iterator macro, or the
    /// search did not settle within [`LOOKBACK_LINES`].
    Ambiguous,
}

/// Classify the statement that begins at column `col` of line `idx`.
pub fn control_context(lines: &[BodyLine], idx: usize, col: usize) -> ControlContext {
    let line = &lines[idx];
    let seg = &line.masked[..col.min(line.masked.len())];

    let mut depth = line.depth_before;
    let mut boundary = None;
    for (i, b) in seg.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b';' | b'{' | b'}' if depth <= 0 => boundary = Some(i),
            _ => {}
        }
    }

    let head = seg[boundary.map_or(0, |b| b + 1)..].trim();
    if !head.is_empty() {
        return classify_head(head);
    }
    if boundary.is_some() {
        return ControlContext::Unguarded;
    }
    if line.depth_before > 0 {
        return ControlContext::Ambiguous;
    }

    let mut looked = 0;
    for prev in lines[..idx].iter().rev() {
        if !prev.is_significant() {
            continue;
        }
        looked += 1;
        if looked > LOOKBACK_LINES {
            return ControlContext::Ambiguous;
        }
        let t = prev.trimmed();
        let ends_statement = t.ends_with(';') || t.ends_with('{') || t.ends_with('}') || is_label(t);
        if prev.depth_after == 0 && ends_statement {
            return ControlContext::Unguarded;
        }
        if control_kind(strip_labels(t)).is_some_and(|k| !k.is_label()) {
            return ControlContext::Guarded;
        }
        // An open statement that is no control header, such as an
        // iterator macro: its body is whatever follows.
        if prev.depth_before == 0 {
            return ControlContext::Ambiguous;
        }
    }
    ControlContext::Unguarded
}

fn classify_head(head: &str) -> ControlContext {
    let head = strip_labels(head);
    if head.is_empty() {
        return ControlContext::Unguarded;
    }
    match control_kind(head) {
        Some(kind) if kind.is_label() => ControlContext::Unguarded,
        Some(_) => ControlContext::Guarded,
        None => ControlContext::Ambiguous,
    }
}

/// `text` without its leading `case X:`, `default:` and goto labels.
fn strip_labels(text: &str) -> &str {
    let mut rest = text.trim_start();
    while let Some(colon) = label_colon(rest) {
        rest = rest[colon + 1..].trim_start();
    }
    rest
}

/// Offset of the colon ending a leading label, skipping `::`.
fn label_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let colon = (0..bytes.len()).find(|&i| {
        bytes[i] == b':'
            && bytes.get(i + 1) != Some(&b':')
            && (i == 0 || bytes[i - 1] != b':')
    })?;
    is_label(text[..=colon].trim()).then_some(colon)
}

/// Parenthesis depth at column `col` of a line.
pub fn depth_at(line: &BodyLine, col: usize) -> i32 {
    let mut depth = line.depth_before;
    for b in line.masked[..col.min(line.masked.len())].bytes() {
        match b {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Expression of the `return` at `col`, when it ends on the same line.
pub fn return_expression(line: &BodyLine, col: usize) -> Option<String> {
    let start = col + "return".len();
    let masked = line.masked.get(start..)?;
    let mut depth = 0i32;
    let mut end = None;
    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b';' if depth == 0 => {
                end = Some(i);
                break;
            }
            _ => {}
        }
    }
    let expr = line.code.get(start..start + end?)?.trim();
    Some(expr.to_string())
}

/// Conversion for a return expression that can be evaluated a second time
/// without side effects: an identifier, a member chain or a numeric literal.
pub fn return_value_format(expr: &str, known: &KnownTypes) -> Option<FormatSpec> {
    let expr = strip_parens(expr.trim());
    if expr.is_empty() {
        return None;
    }
    if IDENTIFIER.is_match(expr) {
        return match expr {
            "NULL" | "nullptr" => None,
            "true" | "false" => Some(FormatSpec::I32),
            _ => known.format_of(expr),
        };
    }
    if INTEGER.is_match(expr) {
        return Some(integer_format(expr));
    }
    if MEMBER_CHAIN.is_match(expr) {
        return Some(FormatSpec::I32);
    }
    if FLOAT.is_match(expr) {
        return Some(FormatSpec::Float);
    }
    None
}

/// Conversion for an integer literal from its `u`/`l`/`ll` suffix.
fn integer_format(literal: &str) -> FormatSpec {
    let digits = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    let suffix = &literal[digits.len()..];
    let unsigned = suffix.contains(['u', 'U']);
    let longs = suffix.chars().filter(|c| matches!(c, 'l' | 'L')).count();
    match (longs, unsigned) {
        (0, false) => FormatSpec::I32,
        (0, true) => FormatSpec::U32,
        (1, false) => FormatSpec::Long,
        (1, true) => FormatSpec::ULong,
        (_, false) => FormatSpec::I64,
        (_, true) => FormatSpec::U64,
    }
}

fn strip_parens(mut expr: &str) -> &str {
    while let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        if inner.contains(['(', ')']) {
            break;
        }
        expr = inner.trim();
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_lines, return_offsets};

    fn context_of_first_return(body: &str) -> Vec<ControlContext> {
        let lines = analyze_lines(body);
        let mut out = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            for col in return_offsets(&line.masked) {
                out.push(control_context(&lines, i, col));
            }
        }
        out
    }

    #[test]
    fn test_same_line_guards() {
        assert_eq!(
            context_of_first_return("\n    if (x) return 1; else return 2;\n"),
            vec![ControlContext::Guarded, ControlContext::Guarded]
        );
        assert_eq!(
            context_of_first_return("\n    if (x) { return 1; } else { return 2; }\n"),
            vec![ControlContext::Unguarded, ControlContext::Unguarded]
        );
        assert_eq!(
            context_of_first_return("\n    for (;;) return 1;\n"),
            vec![ControlContext::Guarded]
        );
        assert_eq!(
            context_of_first_return("\n    case 1: return 0;\n"),
            vec![ControlContext::Unguarded]
        );
        assert_eq!(
            context_of_first_return("\n    if (x) foo(); return 1;\n"),
            vec![ControlContext::Unguarded]
        );
    }

    #[test]
    fn test_previous_line_guards() {
        assert_eq!(
            context_of_first_return("\n    if (x)\n        return 1;\n    else\n        return 2;\n    return 3;\n"),
            vec![ControlContext::Guarded, ControlContext::Guarded, ControlContext::Unguarded]
        );
        assert_eq!(
            context_of_first_return("\n    if (a &&\n        b)\n        return 1;\n"),
            vec![ControlContext::Guarded]
        );
        assert_eq!(
            context_of_first_return("\n    if (x)\n#ifdef DEBUG\n        return 1;\n#endif\n"),
            vec![ControlContext::Guarded]
        );
    }

    #[test]
    fn test_guard_after_label() {
        assert_eq!(
            context_of_first_return("\n    switch (v) {\n    case 1: if (x) return 0;\n    }\n"),
            vec![ControlContext::Guarded]
        );
        assert_eq!(
            context_of_first_return("\n    switch (v) {\n    default: if (x)\n        return 0;\n    }\n"),
            vec![ControlContext::Guarded]
        );
        assert_eq!(
            context_of_first_return("\n    switch (v) {\n    case A::B: return 0;\n    }\n"),
            vec![ControlContext::Unguarded]
        );
        assert_eq!(
            context_of_first_return("\n    out: while (x) return 0;\n"),
            vec![ControlContext::Guarded]
        );
    }

    #[test]
    fn test_iterator_macro_is_ambiguous() {
        assert_eq!(
            context_of_first_return("\n    list_for_each_entry(p, h, node)\n        return 1;\n"),
            vec![ControlContext::Ambiguous]
        );
        assert_eq!(
            context_of_first_return("\n    list_for_each_entry(p,\n            h, node)\n        return 1;\n"),
            vec![ControlContext::Ambiguous]
        );
    }

    #[test]
    fn test_body_start_is_unguarded() {
        assert_eq!(
            context_of_first_return("\n    return 0;\n"),
            vec![ControlContext::Unguarded]
        );
    }

    #[test]
    fn test_inconclusive_search_is_ambiguous() {
        let body = "\n    x = f(a,\n        b,\n        c,\n        d,\n        e,\n        g) +\n        return_code_of\n        ;\n    y = 1 +\n        2 +\n        3 +\n        4 +\n        5 +\n        6 +\n        7\n        ? 0 :\n        8;\n";
        let lines = analyze_lines(body);
        let idx = lines.len() - 2;
        assert_eq!(control_context(&lines, idx, 8), ControlContext::Ambiguous);
    }

    #[test]
    fn test_unknown_macro_head_is_ambiguous() {
        assert_eq!(
            context_of_first_return("\n    WHEN(x) return 1;\n"),
            vec![ControlContext::Ambiguous]
        );
    }

    #[test]
    fn test_return_expression() {
        let lines = analyze_lines("\n    return foo(a; b) + \"x;\";\n    return;\n");
        assert_eq!(return_expression(&lines[1], 4).as_deref(), Some("foo(a; b) + \"x;\""));
        assert_eq!(return_expression(&lines[2], 4).as_deref(), Some(""));
    }

    #[test]
    fn test_return_value_format() {
        let mut known = KnownTypes::new();
        known.record("name", "const char *");
        known.record("pt", "struct point");
        assert_eq!(return_value_format("name", &known), Some(FormatSpec::Str));
        assert_eq!(return_value_format("pt", &known), None);
        assert_eq!(return_value_format("(rc)", &known), Some(FormatSpec::I32));
        assert_eq!(return_value_format("dev->status", &known), Some(FormatSpec::I32));
        assert_eq!(return_value_format("-22", &known), Some(FormatSpec::I32));
        assert_eq!(return_value_format("0x1fUL", &known), Some(FormatSpec::ULong));
        assert_eq!(return_value_format("-1L", &known), Some(FormatSpec::Long));
        assert_eq!(return_value_format("1LL", &known), Some(FormatSpec::I64));
        assert_eq!(return_value_format("0xffULL", &known), Some(FormatSpec::U64));
        assert_eq!(return_value_format("7u", &known), Some(FormatSpec::U32));
        assert_eq!(return_value_format("1.5f", &known), Some(FormatSpec::Float));
        assert_eq!(return_value_format("NULL", &known), None);
        assert_eq!(return_value_format("next()", &known), None);
        assert_eq!(return_value_format("a + b", &known), None);
        assert_eq!(return_value_format("i++", &known), None);
    }
}
