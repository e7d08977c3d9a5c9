//! Whole-buffer instrumentation.
//!
//! [`instrument_source`] is a pure function of the source text and the
//! [`Config`]: it finds every function, rewrites the bodies it can handle
//! and copies everything else through byte for byte.

mod returns;
mod transform;
mod types;

pub use returns::{control_context, ControlContext, LOOKBACK_LINES};
pub use types::{
    Diagnostic, DiagnosticKind, FunctionOutcome, FunctionStatus, InstrumentReport, Severity,
};

use tracing::{debug, trace};

use crate::analysis::{find_functions, FunctionMatch};
use crate::config::Config;
use crate::directives::Directives;
use crate::kernel::inject_kernel_includes;
use crate::logging::has_marker;
use crate::scan::{final_state, line_of, LexState};

/// Output of one invocation.
#[derive(Debug, Clone)]
pub struct Instrumented {
    pub text: String,
    pub report: InstrumentReport,
}

/// Instrument every function of one translation unit.
pub fn instrument_source(source: &str, config: &Config) -> Instrumented {
    let mut report = InstrumentReport::new();

    if matches!(
        final_state(source),
        LexState::BlockComment | LexState::StringLiteral | LexState::CharLiteral
    ) {
        report.add_diagnostic(Diagnostic::new(
            DiagnosticKind::UnterminatedLiteralOrComment,
            None,
            line_of(source, source.len()),
            "input ends inside a comment or literal; the rest is treated as literal text",
        ));
    }

    let directives = Directives::parse(source);
    if directives.ignores_file() {
        debug!("ignore-file directive, leaving buffer untouched");
        report.ignored_file = true;
        return Instrumented {
            text: source.to_string(),
            report,
        };
    }

    let mut out = String::with_capacity(source.len() + source.len() / 2);
    let mut cursor = 0;
    let mut previous_end_line = 0;

    for found in find_functions(source) {
        let record = match found {
            FunctionMatch::Complete(record) => record,
            FunctionMatch::Unterminated { name, line, .. } => {
                debug!(function = %name, line, "no matching brace, function skipped");
                report.add_diagnostic(Diagnostic::new(
                    DiagnosticKind::NoMatchingBrace,
                    Some(&name),
                    line,
                    "function body never closes; left untouched",
                ));
                report.functions.push(FunctionOutcome {
                    name,
                    line,
                    status: FunctionStatus::Unterminated,
                    inserted: 0,
                });
                continue;
            }
        };

        let body = record.body().slice(source);
        let ignored = config.is_function_skipped(&record.name)
            || directives.ignores_function(previous_end_line, record.line);
        previous_end_line = line_of(source, record.close_brace);

        let (status, inserted) = if ignored {
            debug!(function = %record.name, "function ignored");
            (FunctionStatus::Ignored, 0)
        } else if has_marker(body, &record.name) {
            trace!(function = %record.name, "already instrumented");
            (FunctionStatus::AlreadyInstrumented, 0)
        } else {
            let rewrite = transform::rewrite_function(source, &record, config);
            report.diagnostics.extend(rewrite.diagnostics);
            match rewrite.body {
                Some(new_body) => {
                    out.push_str(&source[cursor..=record.open_brace]);
                    out.push_str(&new_body);
                    cursor = record.close_brace;
                    trace!(function = %record.name, inserted = rewrite.inserted, "instrumented");
                    (FunctionStatus::Instrumented, rewrite.inserted)
                }
                None => (FunctionStatus::Unchanged, 0),
            }
        };

        report.functions.push(FunctionOutcome {
            name: record.name,
            line: record.line,
            status,
            inserted,
        });
    }
    out.push_str(&source[cursor..]);

    if config.kernel && config.kernel_includes && report.count(FunctionStatus::Instrumented) > 0 {
        let (text, added) = inject_kernel_includes(&out);
        out = text;
        report.includes_added = added;
    }

    Instrumented { text: out, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::brace_balance;

    #[test]
    fn test_untouched_text_between_functions() {
        let src = "#include <stdio.h>\n\nstatic int g = 1; /* { */\n\nint a(void) {\n    return g;\n}\n\n// tail }\n";
        let result = instrument_source(src, &Config::default());
        assert!(result.text.starts_with("#include <stdio.h>\n\nstatic int g = 1; /* { */\n\nint a(void) {\n"));
        assert!(result.text.ends_with("}\n\n// tail }\n"));
        assert_eq!(result.report.count(FunctionStatus::Instrumented), 1);
        assert_eq!(brace_balance(&result.text), brace_balance(src));
    }

    #[test]
    fn test_idempotent() {
        let src = "int add(int a, int b) {\n    int c = a + b;\n    return c;\n}\n";
        let config = Config::default();
        let once = instrument_source(src, &config);
        let twice = instrument_source(&once.text, &config);
        assert_eq!(once.text, twice.text);
        assert_eq!(twice.report.count(FunctionStatus::AlreadyInstrumented), 1);
    }

    #[test]
    fn test_marker_in_literal_does_not_suppress() {
        let src = "void f(void) {\n    puts(\"// #EXTRA_DEBUG_PRINTS f\");\n}\n";
        let result = instrument_source(src, &Config::default());
        assert_eq!(result.report.count(FunctionStatus::Instrumented), 1);
        assert!(result.text.contains("entered function f"));
    }

    #[test]
    fn test_unterminated_function_kept() {
        let src = "int ok(void) {\n    return 0;\n}\nint bad(void) {\n    if (x) {\n";
        let result = instrument_source(src, &Config::default());
        assert!(result.text.ends_with("int bad(void) {\n    if (x) {\n"));
        assert_eq!(result.report.count(FunctionStatus::Unterminated), 1);
        assert!(result
            .report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::NoMatchingBrace));
    }

    #[test]
    fn test_unterminated_comment_diagnostic() {
        let result = instrument_source("int x; /* open", &Config::default());
        assert_eq!(result.text, "int x; /* open");
        assert!(result
            .report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnterminatedLiteralOrComment));
    }

    #[test]
    fn test_skip_functions_and_directives() {
        let src = "void a(void) {\n    f();\n}\n// debugweave:ignore-next-function - hot\nvoid b(void) {\n    f();\n}\nvoid c(void) {\n    f();\n}\n";
        let mut config = Config::default();
        config.skip_functions = vec!["c".to_string()];
        let result = instrument_source(src, &config);
        let statuses: Vec<_> = result.report.functions.iter().map(|f| f.status).collect();
        assert_eq!(
            statuses,
            vec![FunctionStatus::Instrumented, FunctionStatus::Ignored, FunctionStatus::Ignored]
        );
        assert!(result.text.ends_with("void b(void) {\n    f();\n}\nvoid c(void) {\n    f();\n}\n"));
    }

    #[test]
    fn test_ignore_file() {
        let src = "// debugweave:ignore-file\nvoid a(void) {\n    f();\n}\n";
        let result = instrument_source(src, &Config::default());
        assert_eq!(result.text, src);
        assert!(result.report.ignored_file);
        assert!(result.report.functions.is_empty());
    }

    #[test]
    fn test_kernel_mode() {
        let src = "#include <linux/init.h>\n\nstatic int probe(int id) {\n    return 0;\n}\n";
        let mut config = Config::default();
        config.kernel = true;
        let result = instrument_source(src, &config);
        assert!(result.text.contains("printk(KERN_INFO \"Extra Debug Info: entered function probe\\n\");"));
        assert!(result.text.contains("#include <linux/init.h>\n#include <linux/kernel.h>\n"));
        assert_eq!(result.report.includes_added.len(), 3);

        let again = instrument_source(&result.text, &config);
        assert_eq!(again.text, result.text);
    }

    #[test]
    fn test_kernel_includes_only_when_instrumented() {
        let src = "static int x;\n";
        let mut config = Config::default();
        config.kernel = true;
        assert_eq!(instrument_source(src, &config).text, src);
    }
}
