//! Lexical analysis of C/C++ functions.
//!
//! Nothing here builds a syntax tree. Every component works on the
//! comment-free and literal-masked views produced by [`crate::scan`]:
//!
//! - `functions`: locates definitions and their bodies
//! - `lines`: per-line nesting facts of a body
//! - `declarations`: single-declarator declarations and the leading
//!   declaration region
//! - `classify`: assignment, control-header and call-site predicates
//! - `params`: parameter list parsing
//! - `format`: printf conversions for declared types
//! - `context`: per-function variable typing

mod classify;
mod context;
mod declarations;
mod format;
mod functions;
mod lines;
mod params;

pub use classify::{
    call_sites, control_kind, detect_assignment, has_jump, is_control_header, return_offsets,
    Assignment, ControlKind,
};
pub use context::{FunctionContext, KnownTypes};
pub use declarations::{
    detect_declaration, find_declaration_region, DeclarationInfo, DeclarationRegion,
};
pub(crate) use declarations::declaration_region_lines;
pub use format::FormatSpec;
pub use functions::{complete_functions, find_functions, FunctionMatch, FunctionRecord, SourceSpan};
pub use lines::{analyze_lines, is_label, starts_with_word, statement_end, statement_text, BodyLine};
pub use params::{parse_param, parse_params, split_params, Param};
