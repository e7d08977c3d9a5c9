//! Core types for instrumentation results.

use serde::{Deserialize, Serialize};

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Something the engine could not do with confidence. None of these stop
/// processing; each is absorbed where it occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A function body never closes; it was left untouched.
    NoMatchingBrace,
    /// The body does not start with declarations; entry logs go at the top.
    EmptyDeclarationRegion,
    /// A `return` whose guard could not be determined was not spliced.
    AmbiguousControlContext,
    /// The buffer ends inside a comment or literal.
    UnterminatedLiteralOrComment,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::NoMatchingBrace => "no_matching_brace",
            DiagnosticKind::EmptyDeclarationRegion => "empty_declaration_region",
            DiagnosticKind::AmbiguousControlContext => "ambiguous_control_context",
            DiagnosticKind::UnterminatedLiteralOrComment => "unterminated_literal_or_comment",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::EmptyDeclarationRegion => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Function the diagnostic belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// 1-based line in the input buffer.
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, function: Option<&str>, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            function: function.map(str::to_string),
            line,
            message: message.into(),
        }
    }
}

/// What happened to one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionStatus {
    /// Statements were inserted.
    Instrumented,
    /// Nothing applicable to insert.
    Unchanged,
    /// Marker comments for this function are already present.
    AlreadyInstrumented,
    /// Excluded by a directive or `skip_functions`.
    Ignored,
    /// The body never closes.
    Unterminated,
}

impl FunctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionStatus::Instrumented => "instrumented",
            FunctionStatus::Unchanged => "unchanged",
            FunctionStatus::AlreadyInstrumented => "already_instrumented",
            FunctionStatus::Ignored => "ignored",
            FunctionStatus::Unterminated => "unterminated",
        }
    }
}

impl std::fmt::Display for FunctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-function result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOutcome {
    pub name: String,
    pub line: usize,
    pub status: FunctionStatus,
    /// Logging statements inserted into this function.
    pub inserted: usize,
}

/// Result of instrumenting one buffer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub functions: Vec<FunctionOutcome>,
    pub diagnostics: Vec<Diagnostic>,
    /// Kernel headers added to the top of the buffer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes_added: Vec<String>,
    /// The whole buffer was skipped by an ignore-file directive.
    #[serde(default)]
    pub ignored_file: bool,
}

impl InstrumentReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Total logging statements inserted.
    pub fn inserted(&self) -> usize {
        self.functions.iter().map(|f| f.inserted).sum()
    }

    pub fn count(&self, status: FunctionStatus) -> usize {
        self.functions.iter().filter(|f| f.status == status).count()
    }

    /// Whether any diagnostic is a warning.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }

    pub fn changed(&self) -> bool {
        self.inserted() > 0 || !self.includes_added.is_empty()
    }
}
