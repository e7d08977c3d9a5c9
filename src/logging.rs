//! Logging statement text.
//!
//! Pure formatting: a backend, a message and an optional value expression
//! become one C statement. Every inserted statement is preceded by a marker
//! comment naming the function, which is how already instrumented functions
//! are recognised.

use serde::{Deserialize, Serialize};

use crate::analysis::FormatSpec;
use crate::scan::{comment_starts, CommentKind};

/// Marker text that opens the comment above every inserted statement.
pub const MARKER: &str = "#EXTRA_DEBUG_PRINTS";

/// Prefix of every logged message.
pub const MESSAGE_PREFIX: &str = "Extra Debug Info: ";

/// Device expression used by `dev_dbg` when none is configured.
pub const DEFAULT_DEVICE: &str = "dev";

/// Logging function family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogBackend {
    Printf,
    Printk,
    PrInfo,
    PrDebug,
    DevDbg,
}

impl LogBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogBackend::Printf => "printf",
            LogBackend::Printk => "printk",
            LogBackend::PrInfo => "pr_info",
            LogBackend::PrDebug => "pr_debug",
            LogBackend::DevDbg => "dev_dbg",
        }
    }

    /// The backend actually emitted in a given context: user-space code has
    /// no `printk`/`pr_info`, kernel code has no `printf`.
    pub fn resolve(self, kernel: bool) -> LogBackend {
        match (self, kernel) {
            (LogBackend::Printf, true) => LogBackend::Printk,
            (LogBackend::Printk | LogBackend::PrInfo, false) => LogBackend::Printf,
            (backend, _) => backend,
        }
    }

    pub fn all() -> &'static [LogBackend] {
        &[
            LogBackend::Printf,
            LogBackend::Printk,
            LogBackend::PrInfo,
            LogBackend::PrDebug,
            LogBackend::DevDbg,
        ]
    }
}

impl std::fmt::Display for LogBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "printf" => Ok(LogBackend::Printf),
            "printk" => Ok(LogBackend::Printk),
            "pr_info" => Ok(LogBackend::PrInfo),
            "pr_debug" => Ok(LogBackend::PrDebug),
            "dev_dbg" => Ok(LogBackend::DevDbg),
            _ => Err(format!(
                "unknown backend: {} (expected printf, printk, pr_info, pr_debug or dev_dbg)",
                s
            )),
        }
    }
}

/// Build one logging statement.
///
/// `message` is inserted verbatim into a C string literal after
/// [`MESSAGE_PREFIX`] and must already be escaped. `value` is passed as the
/// single vararg.
pub fn build_statement(
    backend: LogBackend,
    kernel: bool,
    message: &str,
    value: Option<&str>,
    device: &str,
) -> String {
    let format = format!("\"{}{}\\n\"", MESSAGE_PREFIX, message);
    let args = match value {
        Some(value) => format!("{}, {}", format, value),
        None => format,
    };
    match backend.resolve(kernel) {
        LogBackend::Printf => format!("printf({});", args),
        LogBackend::Printk => format!("printk(KERN_INFO {});", args),
        LogBackend::PrInfo => format!("pr_info({});", args),
        LogBackend::PrDebug => format!("pr_debug({});", args),
        LogBackend::DevDbg => {
            let device = device.trim();
            let device = if device.is_empty() { DEFAULT_DEVICE } else { device };
            format!("dev_dbg({}, {});", device, args)
        }
    }
}

/// Escape text for a C string literal. Format directives are doubled so the
/// text prints as written.
pub fn escape_c(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '%' => out.push_str("%%"),
            '\n' | '\r' | '\t' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// Statement builder bound to one function and configuration.
#[derive(Debug, Clone)]
pub struct LogBuilder {
    backend: LogBackend,
    device: String,
    function: String,
}

impl LogBuilder {
    pub fn new(backend: LogBackend, kernel: bool, device: &str, function: &str) -> Self {
        Self {
            backend: backend.resolve(kernel),
            device: device.to_string(),
            function: function.to_string(),
        }
    }

    /// The backend emitted for this function after context resolution.
    pub fn backend(&self) -> LogBackend {
        self.backend
    }

    fn statement(&self, message: &str, value: Option<&str>) -> String {
        // Already resolved, so the kernel flag no longer matters.
        let kernel = matches!(self.backend, LogBackend::Printk | LogBackend::PrInfo);
        build_statement(self.backend, kernel, message, value, &self.device)
    }

    pub fn entry(&self) -> String {
        self.statement(&format!("entered function {}", escape_c(&self.function)), None)
    }

    pub fn exit(&self) -> String {
        self.statement(&format!("exiting function {}", escape_c(&self.function)), None)
    }

    /// `label=<conversion>` with `expr` as the value.
    pub fn value(&self, label: &str, spec: FormatSpec, expr: &str) -> String {
        self.statement(
            &format!("{}={}", escape_c(label), spec.conversion()),
            Some(expr),
        )
    }

    pub fn return_value(&self, spec: FormatSpec, expr: &str) -> String {
        self.value("return value", spec, expr)
    }

    /// A fixed note, such as `calling foo`.
    pub fn note(&self, text: &str) -> String {
        self.statement(&escape_c(text), None)
    }

    /// A control-flow note. The source text travels as a `%s` argument so
    /// it never has to survive being a format string.
    pub fn control(&self, kind: &str, header: &str) -> String {
        let literal = format!("\"{}\"", escape_literal(header));
        self.statement(&format!("{}=%s", escape_c(kind)), Some(&literal))
    }

    pub fn marker(&self) -> String {
        format!("// {} {}", MARKER, self.function)
    }

    /// The marker line and the statement, both at `indent`.
    pub fn render(&self, statement: &str, indent: &str) -> [String; 2] {
        [
            format!("{}{}", indent, self.marker()),
            format!("{}{}", indent, statement),
        ]
    }
}

fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' | '\r' | '\t' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// Whether `text` holds a marker comment for `function` in real comment
/// context. Marker text inside a string literal does not count.
pub fn has_marker(text: &str, function: &str) -> bool {
    comment_starts(text)
        .into_iter()
        .filter(|(_, kind)| *kind == CommentKind::Line)
        .any(|(offset, _)| {
            let line_end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
            let comment = text[offset + 2..line_end].trim_start();
            let Some(rest) = comment.strip_prefix(MARKER) else {
                return false;
            };
            let Some(rest) = rest.strip_prefix([' ', '\t']) else {
                return false;
            };
            let Some(after) = rest.trim_start().strip_prefix(function) else {
                return false;
            };
            after.is_empty() || after.starts_with(char::is_whitespace)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_statements() {
        assert_eq!(
            build_statement(LogBackend::Printf, false, "entered function f", None, "dev"),
            "printf(\"Extra Debug Info: entered function f\\n\");"
        );
        assert_eq!(
            build_statement(LogBackend::Printk, true, "x=%d", Some("x"), "dev"),
            "printk(KERN_INFO \"Extra Debug Info: x=%d\\n\", x);"
        );
        assert_eq!(
            build_statement(LogBackend::PrDebug, true, "m", None, "dev"),
            "pr_debug(\"Extra Debug Info: m\\n\");"
        );
        assert_eq!(
            build_statement(LogBackend::DevDbg, true, "m", None, "&pdev->dev"),
            "dev_dbg(&pdev->dev, \"Extra Debug Info: m\\n\");"
        );
        assert_eq!(
            build_statement(LogBackend::DevDbg, true, "m", None, " "),
            "dev_dbg(dev, \"Extra Debug Info: m\\n\");"
        );
    }

    #[test]
    fn test_backend_resolution() {
        assert_eq!(LogBackend::Printf.resolve(true), LogBackend::Printk);
        assert_eq!(LogBackend::Printk.resolve(false), LogBackend::Printf);
        assert_eq!(LogBackend::PrInfo.resolve(false), LogBackend::Printf);
        assert_eq!(LogBackend::PrInfo.resolve(true), LogBackend::PrInfo);
        assert_eq!(LogBackend::PrDebug.resolve(false), LogBackend::PrDebug);
        assert_eq!(LogBackend::DevDbg.resolve(false), LogBackend::DevDbg);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("pr_info".parse::<LogBackend>().unwrap(), LogBackend::PrInfo);
        assert_eq!("DEV-DBG".parse::<LogBackend>().unwrap(), LogBackend::DevDbg);
        assert!("syslog".parse::<LogBackend>().is_err());
        for backend in LogBackend::all() {
            assert_eq!(backend.as_str().parse::<LogBackend>().unwrap(), *backend);
        }
    }

    #[test]
    fn test_builder_messages() {
        let log = LogBuilder::new(LogBackend::Printf, false, "dev", "add");
        assert_eq!(log.entry(), "printf(\"Extra Debug Info: entered function add\\n\");");
        assert_eq!(log.exit(), "printf(\"Extra Debug Info: exiting function add\\n\");");
        assert_eq!(
            log.value("c", FormatSpec::I32, "c"),
            "printf(\"Extra Debug Info: c=%d\\n\", c);"
        );
        assert_eq!(
            log.note("calling foo"),
            "printf(\"Extra Debug Info: calling foo\\n\");"
        );
        assert_eq!(log.marker(), "// #EXTRA_DEBUG_PRINTS add");
    }

    #[test]
    fn test_kernel_builder_keeps_printk() {
        let log = LogBuilder::new(LogBackend::Printf, true, "dev", "probe");
        assert_eq!(log.backend(), LogBackend::Printk);
        assert!(log.entry().starts_with("printk(KERN_INFO "));
        let log = LogBuilder::new(LogBackend::PrInfo, true, "dev", "probe");
        assert!(log.entry().starts_with("pr_info("));
    }

    #[test]
    fn test_control_note_escapes_source() {
        let log = LogBuilder::new(LogBackend::Printf, false, "dev", "f");
        assert_eq!(
            log.control("branch", "if (s == \"a\\n\" && pct % 2)"),
            "printf(\"Extra Debug Info: branch=%s\\n\", \"if (s == \\\"a\\\\n\\\" && pct % 2)\");"
        );
    }

    #[test]
    fn test_render_with_marker() {
        let log = LogBuilder::new(LogBackend::Printf, false, "dev", "f");
        let lines = log.render("x;", "\t");
        assert_eq!(lines[0], "\t// #EXTRA_DEBUG_PRINTS f");
        assert_eq!(lines[1], "\tx;");
    }

    #[test]
    fn test_has_marker() {
        assert!(has_marker("\n    // #EXTRA_DEBUG_PRINTS add\n", "add"));
        assert!(!has_marker("\n    // #EXTRA_DEBUG_PRINTS add2\n", "add"));
        assert!(!has_marker("\n    s = \"// #EXTRA_DEBUG_PRINTS add\";\n", "add"));
        assert!(!has_marker("\n    /* #EXTRA_DEBUG_PRINTS add */\n", "add"));
        assert!(has_marker("// #EXTRA_DEBUG_PRINTS Foo::bar", "Foo::bar"));
    }
}
