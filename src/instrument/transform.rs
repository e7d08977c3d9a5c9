//! Rewriting of a single function body.
//!
//! The body is analyzed once into [`BodyLine`]s and then walked top to
//! bottom. Logs that belong after a statement are queued and flushed at the
//! next statement boundary, which keeps them out of declaration runs,
//! multi-line statements and aggregate initializers.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::returns::{control_context, depth_at, return_expression, return_value_format, ControlContext};
use super::types::{Diagnostic, DiagnosticKind};
use crate::analysis::{
    analyze_lines, call_sites, control_kind, declaration_region_lines, detect_assignment,
    detect_declaration, has_jump, is_label, parse_params, return_offsets, statement_end,
    statement_text, BodyLine, ControlKind, DeclarationInfo, FormatSpec, FunctionContext,
    FunctionRecord,
};
use crate::config::Config;
use crate::logging::LogBuilder;
use crate::scan::line_of;

/// Result of rewriting one body.
#[derive(Debug, Default)]
pub(crate) struct Rewrite {
    /// New body text, or `None` when nothing was inserted.
    pub body: Option<String>,
    pub inserted: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// A statement that begins on a line.
struct Statement {
    end: usize,
    text: String,
    decl: Option<DeclarationInfo>,
    kind: Option<ControlKind>,
}

/// An exit log spliced in front of a `return` at `col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Splice {
    col: usize,
    with_value: bool,
}

/// A queued log. Control notes take the indentation of the line they are
/// flushed before, everything else keeps the trigger's indentation.
struct Pending {
    indent: Option<String>,
    statement: String,
}

enum FinalExit {
    Skip,
    Append,
    Before { line: usize, col: usize },
}

struct Emitter<'a> {
    builder: &'a LogBuilder,
    out: Vec<String>,
    pending: Vec<Pending>,
    inserted: usize,
}

impl Emitter<'_> {
    fn insert(&mut self, statement: &str, indent: &str) {
        self.out.extend(self.builder.render(statement, indent));
        self.inserted += 1;
    }

    fn queue(&mut self, indent: Option<&str>, statement: String) {
        self.pending.push(Pending {
            indent: indent.map(str::to_string),
            statement,
        });
    }

    fn flush(&mut self, indent: &str) {
        for item in std::mem::take(&mut self.pending) {
            let at = item.indent.as_deref().unwrap_or(indent);
            self.insert(&item.statement, at);
        }
    }
}

/// Instrument one function. `source` is the whole buffer.
pub(crate) fn rewrite_function(source: &str, record: &FunctionRecord, config: &Config) -> Rewrite {
    let body = record.body().slice(source);
    let first_line = line_of(source, record.open_brace);
    let original = analyze_lines(body);
    let base = base_indent(&original, &record.header_indent);

    let normalized = split_leading_statement(body, &original, &base, &record.header_indent);
    let lines = match &normalized {
        Some(text) => analyze_lines(text),
        None => original,
    };
    let line_no = |i: usize| {
        if normalized.is_some() {
            first_line + i.saturating_sub(1)
        } else {
            first_line + i
        }
    };

    let mut ctx = FunctionContext::new(&record.name);
    let params = parse_params(&record.params);
    for param in &params {
        ctx.known.record(&param.name, &param.type_text);
    }
    let region_last = declaration_region_lines(&lines, &mut ctx.known);

    let mut diagnostics = Vec::new();
    if region_last.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::EmptyDeclarationRegion,
            Some(ctx.name()),
            record.line,
            "no leading declarations, entry logs start the body",
        ));
    }

    // Types of later declarations are known before the walk so assignments
    // above a nested declaration still format correctly.
    for i in 0..lines.len() {
        if lines[i].stmt_start && lines[i].is_significant() {
            let end = statement_end(&lines, i);
            if let Some(info) = detect_declaration(&statement_text(&lines, i, end), &ctx.known) {
                ctx.known.record(&info.name, &info.type_text);
            }
        }
    }
    let statements: Vec<Option<Statement>> = (0..lines.len())
        .map(|i| {
            let line = &lines[i];
            if !line.stmt_start || !line.is_significant() {
                return None;
            }
            let end = statement_end(&lines, i);
            let text = statement_text(&lines, i, end);
            Some(Statement {
                end,
                decl: detect_declaration(&text, &ctx.known),
                kind: control_kind(line.trimmed()),
                text,
            })
        })
        .collect();

    let tail = match lines.last() {
        Some(last) if lines.len() > 1 && last.masked.trim().is_empty() && !last.directive => {
            Some(lines.len() - 1)
        }
        _ => None,
    };
    let content_end = tail.unwrap_or(lines.len());

    let builder = LogBuilder::new(config.backend, config.kernel, &config.device, ctx.name());
    let backend_name = builder.backend().as_str();

    let mut splices: BTreeMap<usize, Vec<Splice>> = BTreeMap::new();
    if config.exit_before_return {
        for (i, line) in lines[..content_end].iter().enumerate() {
            if !line.is_significant() || line.in_aggregate {
                continue;
            }
            for col in return_offsets(&line.masked) {
                if depth_at(line, col) != 0 {
                    continue;
                }
                match control_context(&lines, i, col) {
                    ControlContext::Unguarded => splices.entry(i).or_default().push(Splice {
                        col,
                        with_value: config.return_values,
                    }),
                    ControlContext::Guarded => {
                        trace!(function = ctx.name(), line = line_no(i), "return is guarded, not spliced");
                    }
                    ControlContext::Ambiguous => {
                        debug!(function = ctx.name(), line = line_no(i), "ambiguous control context");
                        diagnostics.push(Diagnostic::new(
                            DiagnosticKind::AmbiguousControlContext,
                            Some(ctx.name()),
                            line_no(i),
                            "could not tell whether this return is guarded, no exit log spliced",
                        ));
                    }
                }
            }
        }
    }

    let final_exit = if config.final_exit_always {
        locate_final_exit(&lines, &statements, content_end)
    } else {
        FinalExit::Skip
    };
    if let FinalExit::Before { line, col } = final_exit {
        let at = splices.entry(line).or_default();
        if !at.iter().any(|s| s.col == col) {
            at.push(Splice {
                col,
                with_value: false,
            });
            at.sort_by_key(|s| s.col);
        }
    }

    let mut emit = Emitter {
        builder: &builder,
        out: Vec::with_capacity(lines.len() * 2),
        pending: Vec::new(),
        inserted: 0,
    };
    if config.entry_exit {
        emit.queue(Some(&base), builder.entry());
    }
    if config.params {
        for param in &params {
            if let Some(spec) = FormatSpec::for_type(&param.type_text) {
                emit.queue(Some(&base), builder.value(&param.name, spec, &param.name));
            }
        }
    }

    let mut owner: Option<(usize, usize)> = None;

    for i in 0..content_end {
        let line = &lines[i];
        if !line.is_significant() {
            emit.out.push(line.raw.clone());
            continue;
        }
        let indent = line.indent().to_string();
        let stmt = statements[i].as_ref();
        if let Some(s) = stmt {
            owner = Some((i, s.end));
        }

        let past_region = region_last.map_or(true, |last| i > last);
        if stmt.is_some_and(|s| s.decl.is_none()) && past_region {
            emit.flush(&indent);
        }

        let kind = stmt.and_then(|s| s.kind);
        if config.control && kind == Some(ControlKind::Switch) && !line.in_aggregate {
            let header = control_header_text(&lines, i, stmt.map_or(i, |s| s.end));
            let note = builder.control("branch", &header);
            emit.insert(&note, &indent);
        }

        emit_line(&mut emit, line, splices.get(&i).map(Vec::as_slice), &ctx, &builder);

        if has_jump(&line.masked) || line.in_aggregate {
            continue;
        }

        if let (Some(s), Some(kind)) = (stmt, kind) {
            if config.control {
                queue_control_note(&mut emit, &lines, i, s, kind);
            }
        }

        if let Some(s) = stmt {
            if config.decls {
                if let Some(decl) = s.decl.as_ref().filter(|d| d.has_init && !d.is_array) {
                    if let Some(spec) = FormatSpec::for_type(&decl.type_text) {
                        emit.queue(Some(&indent), builder.value(&decl.name, spec, &decl.name));
                    }
                }
            }
            if config.assigns && s.decl.is_none() {
                if let Some(assignment) = detect_assignment(&s.text, &ctx.known) {
                    if let Some(spec) = ctx.known.format_of(&assignment.name) {
                        emit.queue(
                            Some(&indent),
                            builder.value(&assignment.name, spec, &assignment.name),
                        );
                    }
                }
            }
        }

        if config.calls {
            let unguarded = owner.is_some_and(|(start, end)| {
                i <= end
                    && statements[start]
                        .as_ref()
                        .and_then(|s| s.kind)
                        .map_or(true, |k| k.is_label())
            });
            if unguarded {
                let call_indent = owner
                    .map(|(start, _)| lines[start].indent().to_string())
                    .unwrap_or_else(|| indent.clone());
                for name in call_sites(&line.masked, backend_name) {
                    emit.queue(Some(&call_indent), builder.note(&format!("calling {}", name)));
                }
            }
        }
    }

    emit.flush(&base);
    if matches!(final_exit, FinalExit::Append) {
        emit.insert(&builder.exit(), &base);
    }

    if emit.inserted == 0 {
        return Rewrite {
            body: None,
            inserted: 0,
            diagnostics,
        };
    }

    match tail {
        Some(t) => emit.out.extend(lines[t..].iter().map(|l| l.raw.clone())),
        None => emit.out.push(record.header_indent.clone()),
    }

    Rewrite {
        body: Some(emit.out.join("\n")),
        inserted: emit.inserted,
        diagnostics,
    }
}

/// Indentation of the first significant body line, or one unit deeper than
/// the header.
fn base_indent(lines: &[BodyLine], header_indent: &str) -> String {
    lines
        .iter()
        .skip(1)
        .find(|l| l.is_significant())
        .map(|l| l.indent().to_string())
        .unwrap_or_else(|| {
            let unit = if header_indent.contains('\t') { "\t" } else { "    " };
            format!("{}{}", header_indent, unit)
        })
}

/// Move code that shares a line with the opening brace onto its own line.
fn split_leading_statement(
    body: &str,
    lines: &[BodyLine],
    base: &str,
    header_indent: &str,
) -> Option<String> {
    if !lines.first()?.is_significant() {
        return None;
    }
    let first = lines[0].raw.trim();
    Some(match body.find('\n') {
        Some(nl) => format!("\n{}{}{}", base, first, &body[nl..]),
        None => format!("\n{}{}\n{}", base, first, header_indent),
    })
}

/// Where the guaranteed exit log goes.
fn locate_final_exit(lines: &[BodyLine], statements: &[Option<Statement>], content_end: usize) -> FinalExit {
    let Some(last) = (0..content_end).rev().find(|&i| lines[i].is_significant()) else {
        return FinalExit::Append;
    };
    let Some(start) = (0..=last).rev().find(|&i| statements[i].is_some()) else {
        return FinalExit::Append;
    };
    if statements[start].as_ref().is_some_and(|s| s.end < last) {
        return FinalExit::Append;
    }

    let line = &lines[start];
    let col = if start == last {
        // The return must be the line's final statement.
        let Some(col) = return_offsets(&line.masked)
            .into_iter()
            .rev()
            .find(|&c| depth_at(line, c) == 0)
        else {
            return FinalExit::Append;
        };
        let rest = line.masked[col..].trim_end();
        if !rest.ends_with(';') || rest.matches(';').count() != 1 || rest.contains(['{', '}']) {
            return FinalExit::Append;
        }
        col
    } else {
        let col = line.indent().len();
        if return_offsets(&line.masked).first() != Some(&col) {
            return FinalExit::Append;
        }
        col
    };

    match control_context(lines, start, col) {
        ControlContext::Unguarded => FinalExit::Before { line: start, col },
        _ => FinalExit::Append,
    }
}

/// Emit one line, splitting it in front of each spliced `return`.
fn emit_line(
    emit: &mut Emitter<'_>,
    line: &BodyLine,
    splices: Option<&[Splice]>,
    ctx: &FunctionContext,
    builder: &LogBuilder,
) {
    let Some(splices) = splices.filter(|s| !s.is_empty()) else {
        emit.out.push(line.raw.clone());
        return;
    };
    let indent = line.indent().to_string();
    let mut cursor = 0;
    for splice in splices {
        let before = &line.raw[cursor..splice.col];
        if !before.trim().is_empty() {
            if cursor == 0 {
                emit.out.push(before.trim_end().to_string());
            } else {
                emit.out.push(format!("{}{}", indent, before.trim()));
            }
        }
        if splice.with_value {
            let value = return_expression(line, splice.col)
                .and_then(|expr| return_value_format(&expr, &ctx.known).map(|spec| (expr, spec)));
            if let Some((expr, spec)) = value {
                emit.insert(&builder.return_value(spec, &expr), &indent);
            }
        }
        emit.insert(&builder.exit(), &indent);
        cursor = splice.col;
    }
    emit.out.push(format!("{}{}", indent, line.raw[cursor..].trim_start()));
}

/// Queue a branch note for a control header whose body opens with a brace.
/// A brace on the line after the header belongs to the header's statement.
fn queue_control_note(emit: &mut Emitter<'_>, lines: &[BodyLine], i: usize, stmt: &Statement, kind: ControlKind) {
    let last = lines[stmt.end].trimmed();
    let opens_block = match kind {
        ControlKind::If | ControlKind::ElseIf | ControlKind::Else | ControlKind::For | ControlKind::While => {
            last.ends_with('{')
        }
        ControlKind::Case | ControlKind::Default => is_label(last) || last.ends_with('{'),
        ControlKind::Do | ControlKind::Switch => false,
    };
    if opens_block {
        let note = emit
            .builder
            .control("branch", &control_header_text(lines, i, stmt.end));
        emit.queue(None, note);
    }
}

/// Source text of a control header up to its opening brace, without
/// braces and comments.
fn control_header_text(lines: &[BodyLine], start: usize, end: usize) -> String {
    let mut parts = Vec::new();
    for line in &lines[start..=end] {
        if line.directive {
            continue;
        }
        let cut = line.masked.find('{');
        let code = match cut {
            Some(c) => &line.code[..c],
            None => line.code.as_str(),
        };
        let code = code.trim();
        if !code.is_empty() {
            parts.push(code);
        }
        if cut.is_some() {
            break;
        }
    }
    parts
        .join(" ")
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
