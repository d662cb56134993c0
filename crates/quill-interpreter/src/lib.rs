//! Tree-walking interpreter for the Quill scripting language.
//!
//! The crate evaluates a parsed [`quill_ast::Program`] against an
//! [`Environment`]: a frame stack of typed bindings, the modules the unit
//! imported, the active function calls and a handle to the run's error
//! reporter. [`evaluate`] drives a whole source unit from text to diagnostics.

use quill_lexer::Span;
use smol_str::SmolStr;
use thiserror::Error;

mod binding;
mod console;
mod environment;
mod eval;
mod module;
mod ops;
mod scope;
mod session;
mod stack;
mod value;

pub use binding::{Any, Binding, Slot, Var};
pub use console::Console;
pub use environment::{Activation, Environment, Streams, UnitInfo};
pub use eval::Interpreter;
pub use module::{Libraries, Module, SourceModule};
pub use ops::{OpResult, Operators, ValueError};
pub use scope::{FrameKind, Scope};
pub use session::{evaluate, evaluate_with_timings, PhaseTimings, RunConfig, RunOutcome, SourceUnit};
pub use value::{tags, Array, Value};

/// Runtime errors that can occur during interpretation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("{error}")]
    Value { error: ValueError, span: Span },

    #[error("undefined variable: {name}")]
    UndefinedVariable { name: SmolStr, span: Span },

    #[error("undefined function: {name}")]
    UndefinedFunction { name: SmolStr, span: Span },

    #[error("{name} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: SmolStr,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("{name} does not return a value")]
    NoValue { name: SmolStr, span: Span },

    #[error("return outside function")]
    ReturnOutsideFunction { span: Span },

    #[error("{message}")]
    ModuleNotFound { message: String, span: Span },

    #[error("{message}")]
    CircularImport { message: String, span: Span },

    #[error("cannot load module {name}: {message}")]
    ModuleLoad {
        name: SmolStr,
        message: String,
        span: Span,
    },

    #[error("call depth limit of {limit} exceeded in {name}")]
    CallDepthExceeded {
        name: SmolStr,
        limit: usize,
        span: Span,
    },

    #[error("invalid argument to {function}: {message}")]
    InvalidArgument {
        function: SmolStr,
        message: String,
        span: Span,
    },

    #[error("module {name} is already running")]
    ModuleBusy { name: SmolStr, span: Span },

    #[error("malformed {kind} literal: {text}")]
    MalformedLiteral {
        kind: &'static str,
        text: SmolStr,
        span: Span,
    },

    #[error("i/o error: {message}")]
    Io { message: String, span: Span },

    /// The failure has already been reported.
    #[error("execution aborted")]
    Aborted,
}

impl RuntimeError {
    pub fn value(error: ValueError, span: Span) -> Self {
        RuntimeError::Value { error, span }
    }

    pub fn io(error: std::io::Error) -> Self {
        RuntimeError::Io {
            message: error.to_string(),
            span: Span::dummy(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            RuntimeError::Value { span, .. }
            | RuntimeError::UndefinedVariable { span, .. }
            | RuntimeError::UndefinedFunction { span, .. }
            | RuntimeError::ArityMismatch { span, .. }
            | RuntimeError::NoValue { span, .. }
            | RuntimeError::ReturnOutsideFunction { span }
            | RuntimeError::CallDepthExceeded { span, .. }
            | RuntimeError::InvalidArgument { span, .. }
            | RuntimeError::ModuleNotFound { span, .. }
            | RuntimeError::CircularImport { span, .. }
            | RuntimeError::ModuleLoad { span, .. }
            | RuntimeError::ModuleBusy { span, .. }
            | RuntimeError::MalformedLiteral { span, .. }
            | RuntimeError::Io { span, .. } => *span,
            RuntimeError::Aborted => Span::dummy(),
        }
    }

    fn span_mut(&mut self) -> Option<&mut Span> {
        match self {
            RuntimeError::Value { span, .. }
            | RuntimeError::UndefinedVariable { span, .. }
            | RuntimeError::UndefinedFunction { span, .. }
            | RuntimeError::ArityMismatch { span, .. }
            | RuntimeError::NoValue { span, .. }
            | RuntimeError::ReturnOutsideFunction { span }
            | RuntimeError::CallDepthExceeded { span, .. }
            | RuntimeError::InvalidArgument { span, .. }
            | RuntimeError::ModuleNotFound { span, .. }
            | RuntimeError::CircularImport { span, .. }
            | RuntimeError::ModuleLoad { span, .. }
            | RuntimeError::ModuleBusy { span, .. }
            | RuntimeError::MalformedLiteral { span, .. }
            | RuntimeError::Io { span, .. } => Some(span),
            RuntimeError::Aborted => None,
        }
    }

    /// Attach `span` unless the error already points somewhere.
    pub fn located(mut self, span: Span) -> Self {
        if let Some(current) = self.span_mut() {
            if current.is_dummy() {
                *current = span;
            }
        }
        self
    }

    /// Stable code rendered next to the severity.
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::Value { error, .. } => error.code(),
            RuntimeError::UndefinedVariable { .. } => "E0201",
            RuntimeError::UndefinedFunction { .. } => "E0202",
            RuntimeError::ArityMismatch { .. } => "E0203",
            RuntimeError::NoValue { .. } => "E0204",
            RuntimeError::ReturnOutsideFunction { .. } => "E0205",
            RuntimeError::CallDepthExceeded { .. } => "E0206",
            RuntimeError::InvalidArgument { .. } => "E0207",
            RuntimeError::ModuleNotFound { .. } => "E0301",
            RuntimeError::CircularImport { .. } => "E0302",
            RuntimeError::ModuleLoad { .. } => "E0303",
            RuntimeError::ModuleBusy { .. } => "E0304",
            RuntimeError::MalformedLiteral { .. } => "E0401",
            RuntimeError::Io { .. } => "E0501",
            RuntimeError::Aborted => "E0000",
        }
    }
}

/// Result type for interpreter operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_located_keeps_existing_span() {
        let err = RuntimeError::UndefinedVariable {
            name: "x".into(),
            span: Span::new(4, 5),
        };
        assert_eq!(err.located(Span::new(10, 20)).span(), Span::new(4, 5));
    }

    #[test]
    fn test_located_fills_missing_span() {
        let err = RuntimeError::value(ValueError::DivisionByZero, Span::dummy());
        let err = err.located(Span::new(3, 8));
        assert_eq!(err.span(), Span::new(3, 8));
        assert_eq!(err.code(), "E0106");
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn test_aborted_has_no_span() {
        assert_eq!(RuntimeError::Aborted.located(Span::new(1, 2)), RuntimeError::Aborted);
    }
}
