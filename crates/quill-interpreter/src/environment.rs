//! Execution context for one source unit.

use std::cell::RefCell;
use std::io::{self, BufRead, BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use quill_diagnostics::{Diagnostic, LineIndex, Reporter, Severity};
use quill_lexer::Span;
use smol_str::SmolStr;
use termcolor::{Color, ColorChoice, ColorSpec, NoColor, StandardStream, WriteColor};
use tracing::debug;

use crate::module::{Loader, LoaderHandle, Module};
use crate::scope::Scope;
use crate::stack::DEFAULT_MAX_CALL_DEPTH;

/// Output and input shared by every environment of a run.
#[derive(Clone)]
pub struct Streams {
    output: Rc<RefCell<dyn WriteColor>>,
    input: Rc<RefCell<dyn BufRead>>,
}

/// A byte buffer that stays readable after the streams are gone.
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Streams {
    pub fn new(output: Rc<RefCell<dyn WriteColor>>, input: Rc<RefCell<dyn BufRead>>) -> Self {
        Self { output, input }
    }

    /// Stdout and stdin; colored output only when `use_color` is set and
    /// stdout can show it.
    pub fn stdio(use_color: bool) -> Self {
        let choice = if use_color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            output: Rc::new(RefCell::new(StandardStream::stdout(choice))),
            input: Rc::new(RefCell::new(BufReader::new(io::stdin()))),
        }
    }

    /// Streams writing into a buffer the caller keeps, reading from `input`.
    /// Colors are dropped.
    pub fn captured(input: impl Into<String>) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let output: Rc<RefCell<dyn WriteColor>> =
            Rc::new(RefCell::new(NoColor::new(SharedBuffer(Rc::clone(&buffer)))));
        let input: Rc<RefCell<dyn BufRead>> =
            Rc::new(RefCell::new(Cursor::new(input.into().into_bytes())));
        (Self { output, input }, buffer)
    }

    /// Write `text` and flush so output interleaves with diagnostics.
    pub fn write(&self, text: &str) -> io::Result<()> {
        let mut output = self.output.borrow_mut();
        output.write_all(text.as_bytes())?;
        output.flush()
    }

    /// Write `text` in `color`, then restore the default style.
    pub fn write_colored(&self, text: &str, color: Color) -> io::Result<()> {
        let mut output = self.output.borrow_mut();
        output.set_color(ColorSpec::new().set_fg(Some(color)))?;
        output.write_all(text.as_bytes())?;
        output.reset()?;
        output.flush()
    }

    /// One line of input without its terminator. Empty at end of input.
    pub fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        self.input.borrow_mut().read_line(&mut line)?;
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}

/// The source unit an environment executes, for positioning diagnostics.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    path: PathBuf,
    source: String,
    lines: LineIndex,
}

impl UnitInfo {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            path: path.into(),
            lines: LineIndex::new(&source),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a diagnostic pointing at `span`, with the offending line attached.
    pub fn diagnostic(&self, severity: Severity, message: impl Into<String>, span: Span) -> Diagnostic {
        let file = self.path.display().to_string();
        let diagnostic = Diagnostic::new(severity, message);
        if span.is_dummy() {
            return diagnostic.at(file, 0, 0);
        }

        let start = self.lines.location(&self.source, span.start);
        let diagnostic = diagnostic.at(file, start.line, start.column);
        match self.lines.line_text(&self.source, start.line) {
            Some(text) => {
                let end = self.lines.location(&self.source, span.end);
                let width = if end.line == start.line {
                    end.column.saturating_sub(start.column)
                } else {
                    (text.chars().count() + 1).saturating_sub(start.column)
                };
                diagnostic.with_snippet(text, width.max(1))
            }
            None => diagnostic,
        }
    }
}

/// One in-progress function call.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub name: SmolStr,
    /// Declared return type tag; `None` for functions that return nothing
    pub return_type: Option<SmolStr>,
}

/// Scope stack, imported modules, call stack and reporter of one source unit.
pub struct Environment {
    scope: Scope,
    modules: IndexMap<SmolStr, Rc<dyn Module>>,
    activations: Vec<Activation>,
    reporter: Reporter,
    streams: Streams,
    unit: UnitInfo,
    loader: LoaderHandle,
    max_call_depth: usize,
}

impl Environment {
    pub(crate) fn new(unit: UnitInfo, reporter: Reporter, streams: Streams, loader: LoaderHandle) -> Self {
        debug!(unit = %unit.path.display(), "new environment");
        Self {
            scope: Scope::new(),
            modules: IndexMap::new(),
            activations: Vec::new(),
            reporter,
            streams,
            unit,
            loader,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Limit nested function calls; deeper calls fail instead of recursing.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// An environment for a unit imported from this one, sharing the run's
    /// reporter, streams and loader.
    pub(crate) fn for_import(&self, unit: UnitInfo) -> Self {
        Self::new(unit, self.reporter.clone(), self.streams.clone(), self.loader.share())
            .with_max_call_depth(self.max_call_depth)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    /// Bind `module` under `name`, replacing an earlier import of that name.
    pub fn import(&mut self, name: impl Into<SmolStr>, module: Rc<dyn Module>) {
        self.modules.insert(name.into(), module);
    }

    pub fn module(&self, name: &str) -> Option<Rc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    pub fn push_activation(&mut self, activation: Activation) {
        self.activations.push(activation);
    }

    pub fn peek_activation(&self) -> Option<&Activation> {
        self.activations.last()
    }

    pub fn pop_activation(&mut self) -> Option<Activation> {
        self.activations.pop()
    }

    pub fn call_depth(&self) -> usize {
        self.activations.len()
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    pub fn unit(&self) -> &UnitInfo {
        &self.unit
    }

    pub(crate) fn loader(&self) -> Option<Rc<RefCell<Loader>>> {
        self.loader.get()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        self.reporter.report(diagnostic);
    }

    /// Report against this unit's source.
    pub fn report_at(&self, severity: Severity, code: &str, message: impl Into<String>, span: Span) {
        self.report(self.unit.diagnostic(severity, message, span).with_code(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_position_and_snippet() {
        let unit = UnitInfo::new("main.ql", "var x int\nprint(1.0 % 2.0)\n");
        let diagnostic = unit.diagnostic(Severity::Fatal, "cannot mod float", Span::new(20, 21));
        assert_eq!(diagnostic.file, "main.ql");
        assert_eq!((diagnostic.line, diagnostic.column), (2, 11));
        let snippet = diagnostic.snippet.unwrap();
        assert_eq!(snippet.line_text, "print(1.0 % 2.0)");
        assert_eq!(snippet.width, 1);
    }

    #[test]
    fn test_diagnostic_without_span() {
        let unit = UnitInfo::new("main.ql", "x");
        let diagnostic = unit.diagnostic(Severity::Warning, "note", Span::dummy());
        assert!(!diagnostic.has_position());
        assert!(diagnostic.snippet.is_none());
    }

    #[test]
    fn test_captured_streams_drop_colors() {
        let (streams, buffer) = Streams::captured("");
        streams.write_colored("alert", Color::Red).unwrap();
        streams.write("!").unwrap();
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "alert!");
    }

    #[test]
    fn test_captured_streams() {
        let (streams, buffer) = Streams::captured("first\r\nsecond\n");
        streams.write("hello ").unwrap();
        streams.write("world").unwrap();
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "hello world");
        assert_eq!(streams.read_line().unwrap(), "first");
        assert_eq!(streams.read_line().unwrap(), "second");
        assert_eq!(streams.read_line().unwrap(), "");
    }
}
