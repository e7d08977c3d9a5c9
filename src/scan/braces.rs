//! Brace matching that ignores braces inside comments and literals.

use super::lexer::{LexState, Scanner};

/// Find the `}` that closes the `{` at `open`.
///
/// `open` must be a Normal-state `{`. Returns `None` when the brace is never
/// closed before the end of the text.
pub fn find_matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    for unit in Scanner::starting_at(text, open) {
        if unit.state != LexState::Normal || unit.len != 1 {
            continue;
        }
        match bytes[unit.offset] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(unit.offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Net count of Normal-state `{` minus `}` in a text.
pub fn brace_balance(text: &str) -> i64 {
    let bytes = text.as_bytes();
    Scanner::new(text)
        .filter(|u| u.state == LexState::Normal && u.len == 1)
        .map(|u| match bytes[u.offset] {
            b'{' => 1,
            b'}' => -1,
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_braces() {
        let text = "{ if (x) { y(); } }";
        assert_eq!(find_matching_brace(text, 0), Some(text.len() - 1));
        assert_eq!(find_matching_brace(text, 9), Some(16));
    }

    #[test]
    fn test_braces_in_literals_and_comments_ignored() {
        let text = "{ s = \"}\"; c = '}'; /* } */ // }\n}";
        assert_eq!(find_matching_brace(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn test_unterminated() {
        assert_eq!(find_matching_brace("{ { }", 0), None);
        assert_eq!(find_matching_brace("x", 0), None);
    }

    #[test]
    fn test_brace_balance() {
        assert_eq!(brace_balance("{ \"{\" }"), 0);
        assert_eq!(brace_balance("{ { }"), 1);
    }
}
