//! Parameter list parsing.
//!
//! The name of a parameter is the identifier at the end of its declarator.
//! Function pointers and arrays get a pointer type so their values print
//! with `%p`. Parameters we cannot name (unnamed, `void`, `...`) are dropped.

use regex::Regex;

lazy_static::lazy_static! {
    static ref ATTRIBUTE: Regex = Regex::new(r"__attribute__\s*\(\([^)]*\)\)").unwrap();
    static ref FUNC_POINTER: Regex = Regex::new(r"\(\s*\*\s*(?:const\s+)?([A-Za-z_]\w*)\s*\)\s*\(").unwrap();
    static ref ARRAY_SUFFIX: Regex = Regex::new(r"(?:\s*\[[^\]]*\])+\s*$").unwrap();
    static ref TRAILING_NAME: Regex = Regex::new(r"^(?P<ty>.*?[\s\*&])(?P<name>[A-Za-z_]\w*)$").unwrap();
}

/// Words that can end a type but are never parameter names.
const TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "const", "volatile", "restrict", "__restrict", "__user", "__iomem", "struct",
    "union", "enum", "class", "auto", "register",
];

/// A named function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub type_text: String,
}

/// Split a raw parameter list on top-level commas.
pub fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = params[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

/// Parse one parameter declaration.
pub fn parse_param(text: &str) -> Option<Param> {
    let text = ATTRIBUTE.replace_all(text, " ");
    let mut text = text.trim();
    if text.is_empty() || text == "void" || text == "..." {
        return None;
    }
    if let Some(eq) = top_level_eq(text) {
        text = text[..eq].trim();
    }

    if let Some(caps) = FUNC_POINTER.captures(text) {
        return Some(Param {
            name: caps[1].to_string(),
            type_text: "void *".to_string(),
        });
    }

    let (decl, is_array) = match ARRAY_SUFFIX.find(text) {
        Some(m) => (text[..m.start()].trim_end(), true),
        None => (text, false),
    };

    let caps = TRAILING_NAME.captures(decl)?;
    let name = caps["name"].to_string();
    let ty = caps["ty"].trim();
    if ty.is_empty() || TYPE_WORDS.contains(&name.as_str()) {
        return None;
    }
    if matches!(ty, "struct" | "union" | "enum" | "class") {
        return None;
    }

    let type_text = if is_array {
        format!("{} *", ty)
    } else {
        ty.to_string()
    };
    Some(Param { name, type_text })
}

/// Parse a whole parameter list, dropping parameters without a usable name.
pub fn parse_params(params: &str) -> Vec<Param> {
    split_params(params)
        .into_iter()
        .filter_map(parse_param)
        .collect()
}

fn top_level_eq(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth -= 1,
            '=' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(params: &str) -> Vec<String> {
        parse_params(params).into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_simple_params() {
        let params = parse_params("int a, const char *name, struct dev *d");
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], Param { name: "a".into(), type_text: "int".into() });
        assert_eq!(params[1].name, "name");
        assert_eq!(params[1].type_text, "const char *");
        assert_eq!(params[2].type_text, "struct dev *");
    }

    #[test]
    fn test_void_and_variadic() {
        assert!(parse_params("void").is_empty());
        assert!(parse_params("").is_empty());
        assert_eq!(names("const char *fmt, ..."), vec!["fmt"]);
    }

    #[test]
    fn test_function_pointer() {
        let params = parse_params("int (*cb)(int, int), void *ctx");
        assert_eq!(params[0].name, "cb");
        assert_eq!(params[0].type_text, "void *");
        assert_eq!(params[1].name, "ctx");
    }

    #[test]
    fn test_array_param() {
        let params = parse_params("int values[], char buf[16][4]");
        assert_eq!(params[0].type_text, "int *");
        assert_eq!(params[1].name, "buf");
    }

    #[test]
    fn test_unnamed_params_dropped() {
        assert!(parse_params("int, char *, size_t, struct dev *").is_empty());
    }

    #[test]
    fn test_default_and_attribute() {
        assert_eq!(names("int retries = 3"), vec!["retries"]);
        assert_eq!(names("int x __attribute__((unused))"), vec!["x"]);
        assert_eq!(names("std::map<int, int> m"), vec!["m"]);
    }

    #[test]
    fn test_reference_param() {
        let params = parse_params("const std::string &s");
        assert_eq!(params[0].name, "s");
        assert_eq!(params[0].type_text, "const std::string &");
    }
}
