//! Statement predicates over comment-free, literal-masked text.

use regex::Regex;

use super::context::KnownTypes;
use super::declarations::detect_declaration;
use super::lines::starts_with_word;

lazy_static::lazy_static! {
    static ref ASSIGNMENT: Regex = Regex::new(
        r"^\s*(?P<name>[A-Za-z_]\w*)\s*(?P<op><<|>>|[-+*/%|&^])?=\s*(?P<rhs>[^=\s].*?)\s*;\s*$"
    ).unwrap();
    static ref CALL: Regex = Regex::new(r"\b([A-Za-z_]\w*)\s*\(").unwrap();
    static ref JUMP: Regex = Regex::new(r"\b(return|break|continue|goto)\b").unwrap();
    static ref RETURN: Regex = Regex::new(r"\breturn\b").unwrap();
}

/// Identifiers followed by `(` that are never calls.
const NON_CALLS: &[&str] = &[
    "if", "for", "while", "switch", "return", "sizeof", "typeof", "__typeof__", "alignof",
    "_Alignof", "__alignof__", "defined", "__attribute__", "catch", "do", "else", "case",
    "static_assert", "_Static_assert", "decltype", "noexcept", "void", "char", "short", "int",
    "long", "float", "double", "signed", "unsigned", "bool", "_Bool", "const", "volatile",
    "struct", "union", "enum", "auto",
];

/// Leading keyword of a control-flow line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    If,
    ElseIf,
    Else,
    For,
    While,
    Do,
    Switch,
    Case,
    Default,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::If => "if",
            ControlKind::ElseIf => "else if",
            ControlKind::Else => "else",
            ControlKind::For => "for",
            ControlKind::While => "while",
            ControlKind::Do => "do",
            ControlKind::Switch => "switch",
            ControlKind::Case => "case",
            ControlKind::Default => "default",
        }
    }

    /// Labels rather than headers: nothing they introduce is guarded.
    pub fn is_label(&self) -> bool {
        matches!(self, ControlKind::Case | ControlKind::Default)
    }
}

/// Classify the leading keyword of a line. A leading `}` is skipped so
/// `} else {` is recognised.
pub fn control_kind(line: &str) -> Option<ControlKind> {
    let t = line.trim_start().trim_start_matches('}').trim_start();
    if starts_with_word(t, "else") {
        let rest = t["else".len()..].trim_start();
        if starts_with_word(rest, "if") {
            return Some(ControlKind::ElseIf);
        }
        return Some(ControlKind::Else);
    }
    let kinds = [
        ("if", ControlKind::If),
        ("for", ControlKind::For),
        ("while", ControlKind::While),
        ("do", ControlKind::Do),
        ("switch", ControlKind::Switch),
        ("case", ControlKind::Case),
        ("default", ControlKind::Default),
    ];
    kinds
        .into_iter()
        .find(|(word, _)| starts_with_word(t, word))
        .map(|(_, kind)| kind)
}

/// Leading `if`, `else if`, `else`, `for`, `while`, `switch`, `case` or
/// `default`.
pub fn is_control_header(line: &str) -> bool {
    control_kind(line).is_some_and(|k| k != ControlKind::Do)
}

/// A simple `name op= expr;` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    /// The full operator, `=` or a compound form like `+=`.
    pub op: String,
}

pub fn detect_assignment(stmt: &str, known: &KnownTypes) -> Option<Assignment> {
    if is_control_header(stmt) || detect_declaration(stmt, known).is_some() {
        return None;
    }
    let caps = ASSIGNMENT.captures(stmt)?;
    let op = caps.name("op").map_or("", |m| m.as_str());
    Some(Assignment {
        name: caps["name"].to_string(),
        op: format!("{}=", op),
    })
}

/// Names of the functions called on a line, in order of appearance and
/// without duplicates. `exclude` is the logging function itself.
pub fn call_sites(line: &str, exclude: &str) -> Vec<String> {
    let mut calls: Vec<String> = Vec::new();
    for caps in CALL.captures_iter(line) {
        let name = &caps[1];
        if NON_CALLS.contains(&name) || name == exclude {
            continue;
        }
        if !calls.iter().any(|c| c == name) {
            calls.push(name.to_string());
        }
    }
    calls
}

/// Whether the line contains `return`, `break`, `continue` or `goto`.
pub fn has_jump(line: &str) -> bool {
    JUMP.is_match(line)
}

/// Byte offsets of every `return` keyword in a line.
pub fn return_offsets(line: &str) -> Vec<usize> {
    RETURN.find_iter(line).map(|m| m.start()).collect()
}
