//! Source locations and the closed set of recoverable compile errors (§7).
//!
//! Every lowering layer in `tangle-ssa`/`tangle-compile` returns
//! `Result<_, CompileError>`; the first error stops the walk (§7
//! "Propagation"). Internal invariant violations (§7 kind 5 — allocator
//! re-assignment, compilation-stack underflow, and similar programmer bugs
//! that malformed *input* cannot trigger) are `panic!`s elsewhere in this
//! workspace, not `CompileError` variants, exactly as the teacher's
//! `builder.rs`/`circuit.rs` panic on its own bookkeeping invariants rather
//! than threading a `Result` through them.

use std::fmt;

/// An opaque source location, passed through from the external parser
/// (§6) for error reporting. The core never constructs one from scratch —
/// every `SourceLoc` it sees came from the AST it was handed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct SourceLoc {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub const UNKNOWN: SourceLoc = SourceLoc { file: "<unknown>", line: 0, column: 0 };

    pub fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The five error kinds of §7; kind 5 (Internal) is deliberately absent —
/// it is represented by a `panic!`, never surfaced as a `Result::Err`.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Undefined variable/package, unknown type, duplicate constant or
    /// field (§7 kind 1).
    #[error("{loc}: {message}")]
    Resolution { loc: SourceLoc, message: String },

    /// Invalid operand types, non-bool `if` condition, assignment
    /// mismatch, width overflow, invalid cast (§7 kind 2).
    #[error("{loc}: {message}")]
    Type { loc: SourceLoc, message: String },

    /// Argument-count mismatch for calls/returns, multi-value used where a
    /// single value is required (§7 kind 3).
    #[error("{loc}: {message}")]
    Arity { loc: SourceLoc, message: String },

    /// Slice/index bounds, constant divide-by-zero, non-constant
    /// `for`-loop control (§7 kind 4).
    #[error("{loc}: {message}")]
    Semantic { loc: SourceLoc, message: String },
}

impl CompileError {
    pub fn loc(&self) -> SourceLoc {
        match self {
            CompileError::Resolution { loc, .. }
            | CompileError::Type { loc, .. }
            | CompileError::Arity { loc, .. }
            | CompileError::Semantic { loc, .. } => *loc,
        }
    }

    pub fn resolution(loc: SourceLoc, message: impl Into<String>) -> Self {
        CompileError::Resolution { loc, message: message.into() }
    }

    pub fn ty(loc: SourceLoc, message: impl Into<String>) -> Self {
        CompileError::Type { loc, message: message.into() }
    }

    pub fn arity(loc: SourceLoc, message: impl Into<String>) -> Self {
        CompileError::Arity { loc, message: message.into() }
    }

    pub fn semantic(loc: SourceLoc, message: impl Into<String>) -> Self {
        CompileError::Semantic { loc, message: message.into() }
    }
}

/// The `error_logger(location, format, args...) -> Error` collaborator
/// (§6): a plain function reference, injected rather than globally
/// dispatched, so tests can supply a silent fixture instead of a real
/// reporting sink. `log` both builds the `CompileError` and gives the
/// implementation a chance to emit it somewhere (stderr, a diagnostics
/// channel, `tracing`) before returning it.
pub trait ErrorLogger {
    fn log(&self, loc: SourceLoc, message: String) -> CompileError;
}

/// An [`ErrorLogger`] that only constructs the error, logging nothing —
/// the fixture tests use in place of a production sink (§6 "Collaborators"
/// expansion).
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentLogger;

impl ErrorLogger for SilentLogger {
    fn log(&self, loc: SourceLoc, message: String) -> CompileError {
        CompileError::semantic(loc, message)
    }
}

/// An [`ErrorLogger`] that routes every message through `tracing::error!`
/// before returning the same error a [`SilentLogger`] would, mirroring the
/// ambient-stack logging story this workspace carries regardless of
/// spec.md's non-goals around observability layers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn log(&self, loc: SourceLoc, message: String) -> CompileError {
        tracing::error!(%loc, %message, "compile error");
        CompileError::semantic(loc, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_file_line_column_message() {
        let err = CompileError::ty(SourceLoc::new("main.go", 12, 4), "width overflow");
        assert_eq!(err.to_string(), "main.go:12:4: width overflow");
    }

    #[test]
    fn loc_extracts_the_embedded_location() {
        let loc = SourceLoc::new("a.go", 1, 1);
        let err = CompileError::arity(loc, "too few args");
        assert_eq!(err.loc(), loc);
    }

    #[test]
    fn silent_logger_builds_semantic_errors() {
        let err = SilentLogger.log(SourceLoc::UNKNOWN, "oops".into());
        assert!(matches!(err, CompileError::Semantic { .. }));
    }
}
