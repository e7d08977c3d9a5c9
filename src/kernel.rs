//! Kernel header injection.

use regex::Regex;

lazy_static::lazy_static! {
    static ref INCLUDE: Regex = Regex::new(r#"^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).unwrap();
}

/// Headers that declare `printk` and friends.
pub const KERNEL_HEADERS: &[&str] = &["linux/kernel.h", "linux/module.h", "linux/kthread.h"];

/// Insert the kernel headers that `text` does not include yet.
///
/// Headers go after the last `#include` of the leading preprocessor block,
/// or at the very top when there is none. Returns the new text and the
/// headers added; applying it twice adds nothing the second time.
pub fn inject_kernel_includes(text: &str) -> (String, Vec<String>) {
    let present: Vec<String> = text
        .lines()
        .filter_map(|line| INCLUDE.captures(line).map(|c| c[1].trim().to_string()))
        .collect();
    let missing: Vec<String> = KERNEL_HEADERS
        .iter()
        .filter(|h| !present.iter().any(|p| p == *h))
        .map(|h| h.to_string())
        .collect();
    if missing.is_empty() {
        return (text.to_string(), missing);
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let insert_at = leading_include_end(&lines);

    let mut out = String::with_capacity(text.len() + missing.len() * 32);
    for line in &lines[..insert_at] {
        out.push_str(line);
    }
    if insert_at > 0 && !out.ends_with('\n') {
        out.push('\n');
    }
    for header in &missing {
        out.push_str(&format!("#include <{}>\n", header));
    }
    for line in &lines[insert_at..] {
        out.push_str(line);
    }
    (out, missing)
}

/// Index of the line after the last `#include` of the leading block of
/// blank, comment and preprocessor lines; 0 when there is none.
fn leading_include_end(lines: &[&str]) -> usize {
    let mut in_block_comment = false;
    let mut end = 0;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if in_block_comment {
            in_block_comment = !trimmed.contains("*/");
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if trimmed.starts_with("/*") {
            in_block_comment = !trimmed.contains("*/");
            continue;
        }
        if !trimmed.starts_with('#') {
            break;
        }
        if INCLUDE.is_match(line) {
            end = i + 1;
        }
    }
    end
}
