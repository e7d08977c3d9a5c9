//! Inline skip directives.
//!
//! Supports comments like:
//! - `// debugweave:ignore-file - <reason>`
//! - `// debugweave:ignore-next-function - <reason>`
//!
//! Only real comments count; directive text inside a string literal is
//! ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::scan::{comment_starts, line_of};

lazy_static::lazy_static! {
    static ref DIRECTIVE: Regex = Regex::new(
        r"^\s*debugweave:(ignore-file|ignore-next-function)\b\s*(?:-\s*(.*?))?\s*(?:\*/.*)?$"
    ).unwrap();
}

/// File-level directives must appear within this many lines of the top,
/// unless only comments and blank lines precede them.
const FILE_DIRECTIVE_LINES: usize = 10;

/// How a directive applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveKind {
    IgnoreFile,
    IgnoreNextFunction,
}

/// One parsed directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// 1-based line of the comment.
    pub line: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// All directives of one buffer.
#[derive(Debug, Clone, Default)]
pub struct Directives {
    pub directives: Vec<Directive>,
}

impl Directives {
    /// Parse directives from file content.
    pub fn parse(source: &str) -> Self {
        let header_end = header_block_end(source);
        let mut directives = Vec::new();

        for (offset, _) in comment_starts(source) {
            let line_end = source[offset..]
                .find('\n')
                .map_or(source.len(), |i| offset + i);
            let text = &source[offset + 2..line_end];
            let Some(caps) = DIRECTIVE.captures(text) else {
                continue;
            };
            let line = line_of(source, offset);
            let kind = match &caps[1] {
                "ignore-file" => {
                    // File-level directives must be at the top of the file
                    if line > FILE_DIRECTIVE_LINES && line > header_end {
                        continue;
                    }
                    DirectiveKind::IgnoreFile
                }
                _ => DirectiveKind::IgnoreNextFunction,
            };
            directives.push(Directive {
                kind,
                line,
                reason: caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            });
        }

        Self { directives }
    }

    pub fn ignores_file(&self) -> bool {
        self.directives
            .iter()
            .any(|d| d.kind == DirectiveKind::IgnoreFile)
    }

    /// Whether an ignore-next-function directive sits between the end of
    /// the previous function (`after_line`) and this function's header.
    pub fn ignores_function(&self, after_line: usize, header_line: usize) -> bool {
        self.directives.iter().any(|d| {
            d.kind == DirectiveKind::IgnoreNextFunction && d.line > after_line && d.line < header_line
        })
    }
}

/// Last line of the leading run of blank and comment lines.
fn header_block_end(source: &str) -> usize {
    let mut in_block_comment = false;
    let mut last = 0;
    for (i, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        let is_comment = in_block_comment
            || trimmed.is_empty()
            || trimmed.starts_with("//")
            || trimmed.starts_with("/*");
        if !is_comment {
            break;
        }
        if trimmed.starts_with("/*") || in_block_comment {
            in_block_comment = !trimmed.contains("*/");
        }
        last = i + 1;
    }
    last
}
