//! Single-declarator declarations and the leading declaration region.

use regex::Regex;

use super::context::KnownTypes;
use super::lines::{analyze_lines, statement_end, statement_text, BodyLine};

lazy_static::lazy_static! {
    static ref ARRAY_SUFFIX: Regex = Regex::new(r"(?:\s*\[[^\]]*\])+\s*$").unwrap();
    static ref DECLARATOR: Regex = Regex::new(
        r"^(?P<ty>[A-Za-z_][\w\s\*&:<>]*?[\s\*&>])(?P<name>[A-Za-z_]\w*)$"
    ).unwrap();
    static ref IDENT: Regex = Regex::new(r"[A-Za-z_]\w*").unwrap();
}

/// Keywords that start statements that look like `type name;`.
const STATEMENT_KEYWORDS: &[&str] = &[
    "return", "goto", "break", "continue", "case", "default", "else", "do", "if", "while",
    "for", "switch", "sizeof", "typedef", "throw", "delete", "new", "using", "namespace",
];

/// Words that qualify a type without naming it.
const QUALIFIERS: &[&str] = &[
    "const", "volatile", "static", "register", "extern", "auto", "inline", "restrict",
    "__restrict", "unsigned", "signed", "long", "short", "__user", "__iomem", "struct", "union",
    "enum", "class", "mutable", "thread_local", "__thread",
];

/// A variable declared by a single-declarator statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationInfo {
    pub name: String,
    pub type_text: String,
    pub has_init: bool,
    pub is_array: bool,
}

/// Recognize `type name;` / `type name = expr;` in masked statement text.
///
/// Parentheses and commas are accepted inside the initializer only at
/// nested depth. A top-level comma (several declarators) or parentheses in
/// the declarator part reject the statement, as does a type word that is
/// a known variable.
pub fn detect_declaration(stmt: &str, known: &KnownTypes) -> Option<DeclarationInfo> {
    let stmt = stmt.trim();
    let body = stmt.strip_suffix(';')?.trim_end();
    if body.is_empty() || body.starts_with('#') {
        return None;
    }

    let (decl, init) = match initializer_split(body) {
        Some(eq) => (body[..eq].trim(), Some(body[eq + 1..].trim())),
        None => (body, None),
    };
    if decl.contains(['(', ')', ',', '{', '}', '"', '\'', '=', ';']) {
        return None;
    }
    if let Some(init) = init {
        if init.is_empty() || has_top_level_comma(init) {
            return None;
        }
    }

    let (decl, is_array) = match ARRAY_SUFFIX.find(decl) {
        Some(m) => (decl[..m.start()].trim_end(), true),
        None => (decl, false),
    };

    let caps = DECLARATOR.captures(decl)?;
    let name = caps["name"].to_string();
    let type_text = caps["ty"].trim().to_string();
    if type_text.replace("::", "").contains(':') {
        return None;
    }

    let first = IDENT.find(&type_text)?.as_str();
    if STATEMENT_KEYWORDS.contains(&first) {
        return None;
    }
    if STATEMENT_KEYWORDS.contains(&name.as_str()) || QUALIFIERS.contains(&name.as_str()) {
        return None;
    }

    // The first identifier that is not a qualifier names the type. A bare
    // tag keyword (`struct x;`) has none.
    let type_word = IDENT
        .find_iter(&type_text)
        .map(|m| m.as_str())
        .find(|w| !QUALIFIERS.contains(w));
    match type_word {
        Some(word) if known.contains(word) => return None,
        Some(_) => {}
        None => {
            let only_tags = IDENT
                .find_iter(&type_text)
                .all(|m| matches!(m.as_str(), "struct" | "union" | "enum" | "class"));
            if only_tags {
                return None;
            }
        }
    }

    let type_text = if is_array {
        format!("{} *", type_text)
    } else {
        type_text
    };

    Some(DeclarationInfo {
        name,
        type_text,
        has_init: init.is_some(),
        is_array,
    })
}

/// Offset of the `=` that starts an initializer, skipping `==`, `!=`, `<=`
/// and `>=`.
fn initializer_split(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                if next == Some(b'=') || matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) {
                    continue;
                }
                return Some(i);
            }
            _ => {}
        }
    }
    None
}

fn has_top_level_comma(text: &str) -> bool {
    let mut depth = 0i32;
    for b in text.bytes() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// The leading run of declarations in a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationRegion {
    /// Byte offset just past the last declaration line; 0 when the body
    /// does not start with a declaration.
    pub end: usize,
    /// Index of the last declaration line.
    pub last_line: Option<usize>,
}

impl DeclarationRegion {
    pub fn is_empty(&self) -> bool {
        self.last_line.is_none()
    }
}

/// Find the end of the declaration region of a body, recording each
/// declared variable into `known`.
pub fn find_declaration_region(body: &str, known: &mut KnownTypes) -> DeclarationRegion {
    let lines = analyze_lines(body);
    let last_line = declaration_region_lines(&lines, known);
    let end = match last_line {
        Some(last) => lines[..=last]
            .iter()
            .map(|l| l.raw.len() + 1)
            .sum::<usize>()
            .min(body.len()),
        None => 0,
    };
    DeclarationRegion { end, last_line }
}

/// Index of the last line of the leading declaration region.
pub(crate) fn declaration_region_lines(lines: &[BodyLine], known: &mut KnownTypes) -> Option<usize> {
    let mut last = None;
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if !line.is_significant() {
            i += 1;
            continue;
        }
        if !line.stmt_start {
            break;
        }
        let end = statement_end(lines, i);
        let text = statement_text(lines, i, end);
        match detect_declaration(&text, known) {
            Some(info) => {
                known.record(&info.name, &info.type_text);
                last = Some(end);
                i = end + 1;
            }
            None => break,
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(line: &str) -> Option<DeclarationInfo> {
        detect_declaration(line, &KnownTypes::new())
    }

    #[test]
    fn test_simple_declarations() {
        let d = decl("int c = a + b;").unwrap();
        assert_eq!(d.name, "c");
        assert_eq!(d.type_text, "int");
        assert!(d.has_init);

        let d = decl("struct device *dev;").unwrap();
        assert_eq!(d.type_text, "struct device *");
        assert!(!d.has_init);

        let d = decl("static const unsigned long flags = 0;").unwrap();
        assert_eq!(d.name, "flags");

        let d = decl("my_handle_t h;").unwrap();
        assert_eq!(d.type_text, "my_handle_t");
    }

    #[test]
    fn test_initializer_with_calls() {
        let d = decl("size_t n = strlen(s);").unwrap();
        assert_eq!(d.name, "n");
        let d = decl("int m = max(a, b);").unwrap();
        assert_eq!(d.name, "m");
        assert!(decl("int a = 1, b = 2;").is_none());
    }

    #[test]
    fn test_arrays() {
        let d = decl("char buf[64];").unwrap();
        assert!(d.is_array);
        assert_eq!(d.type_text, "char *");
        assert!(decl("int t[] = { 1, 2, };").unwrap().is_array);
    }

    #[test]
    fn test_rejects_statements() {
        assert!(decl("x = 5;").is_none());
        assert!(decl("return x;").is_none());
        assert!(decl("goto out;").is_none());
        assert!(decl("foo(bar);").is_none());
        assert!(decl("int a, b;").is_none());
        assert!(decl("*p = 3;").is_none());
        assert!(decl("i++;").is_none());
        assert!(decl("struct s;").is_none());
        assert!(decl("int (*fp)(int);").is_none());
        assert!(decl("if (x == y) z;").is_none());
        assert!(decl("x == y;").is_none());
        assert!(decl("int x").is_none());
    }

    #[test]
    fn test_known_variable_is_not_a_type() {
        let mut known = KnownTypes::new();
        known.record("a", "int");
        assert!(detect_declaration("a * b;", &known).is_none());
        assert!(detect_declaration("int * b;", &known).is_some());
    }

    #[test]
    fn test_region_stops_at_first_statement() {
        let body = "\n    int a;\n    /* note */\n    char *p = \"x;\";\n\n    a = 1;\n    int late;\n";
        let mut known = KnownTypes::new();
        let region = find_declaration_region(body, &mut known);
        assert_eq!(region.last_line, Some(3));
        assert_eq!(&body[region.end..], "\n    a = 1;\n    int late;\n");
        assert!(known.contains("a"));
        assert!(known.contains("p"));
        assert!(!known.contains("late"));
    }

    #[test]
    fn test_empty_region() {
        let mut known = KnownTypes::new();
        let region = find_declaration_region("\n    return 0;\n", &mut known);
        assert!(region.is_empty());
        assert_eq!(region.end, 0);
    }

    #[test]
    fn test_region_with_multiline_initializer() {
        let body = "\n    static const int t[] = {\n        1, 2,\n    };\n    int n = 2;\n    go(t, n);\n";
        let mut known = KnownTypes::new();
        let region = find_declaration_region(body, &mut known);
        assert_eq!(region.last_line, Some(4));
    }
}
