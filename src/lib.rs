//! debugweave - lexically-aware debug-print instrumentation for C/C++.
//!
//! debugweave rewrites function bodies to log entry, exit, parameters,
//! initialized declarations, assignments, calls and branches. It works on
//! arbitrary real-world source without a compiler front end: every decision
//! is made on a comment- and literal-aware lexical view of the text, and
//! anything it cannot rewrite with confidence passes through unchanged.
//!
//! # Architecture
//!
//! - `scan`: lexical state machine and brace matching
//! - `analysis`: function matching, declaration regions and per-line
//!   statement classifiers
//! - `logging`: logging statement text for each backend
//! - `instrument`: the body transformer and per-buffer reports
//! - `directives`, `kernel`: skip comments and kernel header injection
//! - `config`, `runner`, `report`, `cli`: the batch tool around the engine
//!
//! # Example
//!
//! ```
//! use debugweave::{instrument_source, Config};
//!
//! let src = "int add(int a, int b) {\n    int c = a + b;\n    return c;\n}\n";
//! let out = instrument_source(src, &Config::default());
//! assert!(out.text.contains("entered function add"));
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod directives;
pub mod error;
pub mod instrument;
pub mod kernel;
pub mod logging;
pub mod report;
pub mod runner;
pub mod scan;

pub use config::{Config, Feature};
pub use error::{Error, Result};
pub use instrument::{
    instrument_source, Diagnostic, DiagnosticKind, FunctionStatus, InstrumentReport, Instrumented,
};
pub use logging::{LogBackend, LogBuilder};
pub use runner::{BatchResult, OutputMode, Runner};
