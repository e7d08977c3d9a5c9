//! Output formatting for debugweave runs.
//!
//! Supports two formats:
//! - Pretty: colored summary for humans
//! - JSON: structured output for programmatic consumption
//!
//! Reports go to the writer the caller picks. When instrumented text is
//! printed on stdout the CLI hands in stderr here.

use colored::*;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::instrument::{FunctionStatus, Severity};
use crate::runner::{BatchResult, FileResult};

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON report.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub backend: String,
    pub files_processed: usize,
    pub files_changed: usize,
    pub functions_instrumented: usize,
    pub statements_inserted: usize,
    pub files: Vec<JsonFile>,
}

/// Per-file entry.
#[derive(Serialize, Deserialize)]
pub struct JsonFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written: Option<String>,
    #[serde(default)]
    pub ignored_file: bool,
    pub functions: Vec<JsonFunction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes_added: Vec<String>,
    pub diagnostics: Vec<JsonDiagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct JsonFunction {
    pub name: String,
    pub line: usize,
    pub status: String,
    pub inserted: usize,
}

#[derive(Serialize, Deserialize)]
pub struct JsonDiagnostic {
    pub kind: String,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub line: usize,
    pub message: String,
}

/// Build the JSON report for a run.
pub fn json_report(path: &str, backend: &str, result: &BatchResult) -> JsonReport {
    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        backend: backend.to_string(),
        files_processed: result.files.len(),
        files_changed: result.changed_files(),
        functions_instrumented: result.instrumented_functions(),
        statements_inserted: result.inserted(),
        files: result.files.iter().map(file_to_json).collect(),
    }
}

fn file_to_json(f: &FileResult) -> JsonFile {
    JsonFile {
        path: f.path.to_string_lossy().to_string(),
        written: f.written.as_ref().map(|p| p.to_string_lossy().to_string()),
        ignored_file: f.report.ignored_file,
        functions: f
            .report
            .functions
            .iter()
            .map(|func| JsonFunction {
                name: func.name.clone(),
                line: func.line,
                status: func.status.as_str().to_string(),
                inserted: func.inserted,
            })
            .collect(),
        includes_added: f.report.includes_added.clone(),
        diagnostics: f
            .report
            .diagnostics
            .iter()
            .map(|d| JsonDiagnostic {
                kind: d.kind.as_str().to_string(),
                severity: d.severity.to_string(),
                function: d.function.clone(),
                line: d.line,
                message: d.message.clone(),
            })
            .collect(),
        error: f.error.clone(),
    }
}

/// Write results in JSON format.
pub fn write_json(
    out: &mut dyn Write,
    path: &str,
    backend: &str,
    result: &BatchResult,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&json_report(path, backend, result))?;
    writeln!(out, "{}", json)?;
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(
    out: &mut dyn Write,
    path: &str,
    backend: &str,
    result: &BatchResult,
    verbose: bool,
) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "  {} v{}",
        "debugweave".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(out)?;
    writeln!(out, "  {}{}", "Input:   ".dimmed(), path)?;
    writeln!(out, "  {}{}", "Backend: ".dimmed(), backend)?;
    writeln!(out)?;

    for file in &result.files {
        write_file(out, file, verbose)?;
    }

    write_summary(out, result)?;
    writeln!(out)
}

fn write_file(out: &mut dyn Write, file: &FileResult, verbose: bool) -> std::io::Result<()> {
    let path = file.path.to_string_lossy();

    if let Some(error) = &file.error {
        writeln!(out, "  {} {}", "✗".red(), path.blue())?;
        writeln!(out, "            {}", error.red())?;
        return Ok(());
    }
    if file.report.ignored_file {
        writeln!(out, "  {} {} {}", "-".dimmed(), path.blue(), "(ignored)".dimmed())?;
        return Ok(());
    }

    let instrumented = file.report.count(FunctionStatus::Instrumented);
    let mark = if file.report.changed() {
        "✓".green()
    } else {
        "·".dimmed()
    };
    write!(out, "  {} {}", mark, path.blue())?;
    writeln!(
        out,
        "  {}",
        format!(
            "{} function{} instrumented, {} statement{} inserted",
            instrumented,
            plural(instrumented),
            file.report.inserted(),
            plural(file.report.inserted())
        )
        .dimmed()
    )?;
    if let Some(written) = &file.written {
        writeln!(out, "      {} {}", "->".dimmed(), written.display())?;
    }

    for func in &file.report.functions {
        let show = match func.status {
            FunctionStatus::Ignored | FunctionStatus::Unterminated => true,
            FunctionStatus::Instrumented
            | FunctionStatus::Unchanged
            | FunctionStatus::AlreadyInstrumented => verbose,
        };
        if show {
            writeln!(
                out,
                "      {:<24} {}",
                format!("{}:{}", func.name, func.line),
                func.status.as_str().dimmed()
            )?;
        }
    }

    for d in &file.report.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        write_severity_tag(out, d.severity)?;
        write!(out, "{:<32}", d.kind.as_str().dimmed())?;
        writeln!(out, "{}", format!(":{}", d.line).dimmed())?;
        writeln!(out, "            {}", d.message)?;
    }

    if !file.report.includes_added.is_empty() {
        writeln!(
            out,
            "      {} {}",
            "added includes:".dimmed(),
            file.report.includes_added.join(", ")
        )?;
    }
    Ok(())
}

fn write_severity_tag(out: &mut dyn Write, severity: Severity) -> std::io::Result<()> {
    match severity {
        Severity::Warning => write!(out, "    {} ", "WARN ".yellow()),
        Severity::Info => write!(out, "    {} ", "INFO ".blue()),
    }
}

fn write_summary(out: &mut dyn Write, result: &BatchResult) -> std::io::Result<()> {
    writeln!(out)?;
    write!(
        out,
        "  {} file{}, {} changed, {} function{} instrumented, {} statement{} inserted",
        result.files.len(),
        plural(result.files.len()),
        result.changed_files(),
        result.instrumented_functions(),
        plural(result.instrumented_functions()),
        result.inserted(),
        plural(result.inserted())
    )?;
    if result.failed() > 0 {
        write!(out, "  {}", format!("{} failed", result.failed()).red())?;
    }
    writeln!(out)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
