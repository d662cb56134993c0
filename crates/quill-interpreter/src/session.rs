//! Running a source unit from text to diagnostics.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use quill_diagnostics::{Diagnostic, ErrorReporter, ReporterConfig, Severity};
use quill_lexer::{Lexer, LexerError, Span};
use quill_parser::parse_tokens;
use tracing::{debug, info_span};

use crate::environment::{Environment, Streams, UnitInfo};
use crate::eval::Interpreter;
use crate::module::{Libraries, LoaderHandle};
use crate::stack::DEFAULT_MAX_CALL_DEPTH;

/// A program to run: its path (for positions and relative imports) and text.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub source: String,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        Ok(Self::new(path, source))
    }
}

/// How a run reports and where its output goes.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub reporter: ReporterConfig,
    /// Collect program output into [`RunOutcome::output`] instead of stdout.
    pub capture_output: bool,
    /// Text served to `console.input` when output is captured.
    pub input: String,
    pub libraries: Libraries,
    /// Nested calls allowed before a run fails with a call depth error.
    pub max_call_depth: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::captured()
    }
}

impl RunConfig {
    /// Stdout and stdin, diagnostics on stderr, exit on the first fatal one.
    pub fn terminal(use_color: bool) -> Self {
        Self {
            reporter: ReporterConfig::terminal(use_color),
            capture_output: false,
            input: String::new(),
            libraries: Libraries::standard(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Everything kept in memory; nothing exits the process.
    pub fn captured() -> Self {
        Self {
            reporter: ReporterConfig::silent(),
            capture_output: true,
            input: String::new(),
            libraries: Libraries::standard(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Every diagnostic, in the order it was reported
    pub diagnostics: Vec<Diagnostic>,
    /// Program output; empty unless output was captured
    pub output: String,
}

impl RunOutcome {
    /// No fatal diagnostic was produced.
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_fatal)
    }

    pub fn fatal(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_fatal())
    }
}

/// Wall-clock time spent in each phase of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub lexing: Duration,
    pub parsing: Duration,
    pub evaluation: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.lexing + self.parsing + self.evaluation
    }
}

impl fmt::Display for PhaseTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lexing:     {:?}", self.lexing)?;
        writeln!(f, "parsing:    {:?}", self.parsing)?;
        writeln!(f, "evaluation: {:?}", self.evaluation)?;
        write!(f, "total:      {:?}", self.total())
    }
}

/// Run `unit` and collect its diagnostics.
pub fn evaluate(unit: SourceUnit, config: RunConfig) -> RunOutcome {
    evaluate_with_timings(unit, config).0
}

fn lexer_error_span(error: &LexerError) -> Span {
    match error {
        LexerError::UnexpectedCharacter(offset, c) | LexerError::InvalidEscape(offset, c) => {
            Span::new(*offset, offset + c.len_utf8())
        }
    }
}

/// [`evaluate`], also measuring how long each phase took.
///
/// Evaluation is skipped when the unit has syntax errors.
pub fn evaluate_with_timings(unit: SourceUnit, config: RunConfig) -> (RunOutcome, PhaseTimings) {
    let span = info_span!("evaluate", unit = %unit.path.display());
    let _guard = span.enter();
    let mut timings = PhaseTimings::default();

    let reporter = match ErrorReporter::spawn(config.reporter.clone()) {
        Ok(reporter) => reporter,
        Err(err) => {
            let diagnostic = Diagnostic::fatal(format!("cannot start error reporter: {}", err));
            return (
                RunOutcome {
                    diagnostics: vec![diagnostic],
                    output: String::new(),
                },
                timings,
            );
        }
    };

    let (streams, captured) = if config.capture_output {
        let (streams, buffer) = Streams::captured(config.input.clone());
        (streams, Some(buffer))
    } else {
        (Streams::stdio(config.reporter.use_color), None)
    };

    let started = Instant::now();
    let (tokens, lex_errors) = Lexer::new(&unit.source).tokenize_filtered();
    timings.lexing = started.elapsed();

    let started = Instant::now();
    let (program, parse_errors) = parse_tokens(&unit.source, tokens);
    timings.parsing = started.elapsed();
    debug!(
        statements = program.stmts.len(),
        lex_errors = lex_errors.len(),
        parse_errors = parse_errors.len(),
        "parsed"
    );

    let env = Environment::new(
        UnitInfo::new(unit.path, unit.source),
        reporter.handle(),
        streams,
        LoaderHandle::new(config.libraries),
    )
    .with_max_call_depth(config.max_call_depth);
    let mut interpreter = Interpreter::new(env);

    if lex_errors.is_empty() && parse_errors.is_empty() {
        let started = Instant::now();
        // Failures have been reported by the time run returns.
        let _ = interpreter.run(&program);
        timings.evaluation = started.elapsed();
    } else {
        let env = interpreter.environment();
        for error in &lex_errors {
            env.report_at(Severity::Fatal, "E0001", error.to_string(), lexer_error_span(error));
        }
        for error in &parse_errors {
            env.report_at(Severity::Fatal, "E0002", error.to_string(), error.span());
        }
    }
    drop(interpreter);

    let diagnostics = reporter.finish();
    let output = captured
        .map(|buffer| String::from_utf8_lossy(&buffer.borrow()).into_owned())
        .unwrap_or_default();
    debug!(diagnostics = diagnostics.len(), "run finished");

    (RunOutcome { diagnostics, output }, timings)
}
