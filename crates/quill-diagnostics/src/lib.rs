//! Quill Diagnostics - positioned error reports and their asynchronous delivery.
//!
//! This crate provides:
//!
//! - `Diagnostic` - a `(file, line, column, message, severity)` report with an
//!   optional code and source snippet
//! - `Severity` - `Warning` (execution continues) and `Fatal` (the run ends)
//! - `LineIndex` - byte offset to line/column resolution
//! - `TerminalRenderer` - colored terminal rendering
//! - `ErrorReporter` / `Reporter` - the background consumer that renders
//!   diagnostics in the order they were sent
//!
//! # Example
//!
//! ```rust
//! use quill_diagnostics::{Diagnostic, ErrorReporter, ReporterConfig, Severity};
//!
//! let reporter = ErrorReporter::spawn(ReporterConfig::silent()).unwrap();
//! reporter.handle().report(Diagnostic::warning("shadowed declaration").at("main.ql", 3, 5));
//! let diagnostics = reporter.finish();
//!
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].severity, Severity::Warning);
//! ```

pub mod location;
pub mod render;
pub mod reporter;

use std::fmt;

pub use location::{LineIndex, Location};
pub use render::{RenderConfig, TerminalRenderer};
pub use reporter::{ErrorReporter, Reporter, ReporterConfig, Sink};

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Rendered, execution continues.
    Warning,
    /// Rendered, then the run terminates with a non-zero outcome.
    Fatal,
}

impl Severity {
    /// Returns the text prefix for this severity level.
    pub fn prefix(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Fatal => "fatal",
        }
    }

    /// Returns the underline character for this severity level.
    pub fn underline_char(&self) -> char {
        match self {
            Severity::Warning => '~',
            Severity::Fatal => '^',
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Severity::Fatal)
    }
}

/// The source line a diagnostic points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// Full text of the offending line, without its terminator.
    pub line_text: String,
    /// Number of characters to underline starting at the diagnostic column.
    pub width: usize,
}

/// A positioned error or warning produced while running a source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The error code (e.g., "E0201").
    pub code: Option<String>,
    pub severity: Severity,
    pub message: String,
    /// Source unit the position refers to.
    pub file: String,
    /// 1-based line; 0 when the diagnostic has no position.
    pub line: usize,
    /// 1-based column in characters; 0 when the diagnostic has no position.
    pub column: usize,
    pub snippet: Option<Snippet>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: None,
            severity,
            message: message.into(),
            file: String::new(),
            line: 0,
            column: 0,
            snippet: None,
        }
    }

    /// Creates a fatal diagnostic.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the file, line and column this diagnostic points at.
    pub fn at(mut self, file: impl Into<String>, line: usize, column: usize) -> Self {
        self.file = file.into();
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_snippet(mut self, line_text: impl Into<String>, width: usize) -> Self {
        self.snippet = Some(Snippet {
            line_text: line_text.into(),
            width,
        });
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity.is_fatal()
    }

    pub fn has_position(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_position() {
            write!(f, "{}:{}:{}: ", self.file, self.line, self.column)?;
        } else if !self.file.is_empty() {
            write!(f, "{}: ", self.file)?;
        }
        write!(f, "{}", self.severity.prefix())?;
        if let Some(code) = &self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_with_position() {
        let diagnostic = Diagnostic::fatal("undefined variable: x")
            .with_code("E0201")
            .at("main.ql", 4, 9);
        assert_eq!(
            diagnostic.to_string(),
            "main.ql:4:9: fatal[E0201]: undefined variable: x"
        );
    }

    #[test]
    fn test_display_without_position() {
        let diagnostic = Diagnostic::warning("nothing to run");
        assert_eq!(diagnostic.to_string(), "warning: nothing to run");
        assert!(!diagnostic.has_position());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Fatal > Severity::Warning);
        assert!(Severity::Fatal.is_fatal());
        assert_eq!(Severity::Warning.prefix(), "warning");
    }
}
