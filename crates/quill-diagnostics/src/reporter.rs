//! Asynchronous error reporting.
//!
//! Producers hold a cloneable [`Reporter`] and push diagnostics into an
//! unbounded FIFO channel. A single background thread owned by
//! [`ErrorReporter`] renders them in send order and records them.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use termcolor::{ColorChoice, NoColor, StandardStream, WriteColor};
use tracing::{debug, trace, warn};

use crate::render::{RenderConfig, TerminalRenderer};
use crate::Diagnostic;

/// Where rendered diagnostics go.
#[derive(Debug, Clone, Default)]
pub enum Sink {
    #[default]
    Stderr,
    /// Plain text appended to a shared buffer.
    Captured(Arc<Mutex<Vec<u8>>>),
    /// Record only, render nothing.
    Silent,
}

#[derive(Debug, Clone, Default)]
pub struct ReporterConfig {
    pub use_color: bool,
    /// Terminate the process with status 1 once a fatal diagnostic is rendered.
    pub exit_on_fatal: bool,
    pub sink: Sink,
}

impl ReporterConfig {
    /// Render to stderr and exit on the first fatal diagnostic.
    pub fn terminal(use_color: bool) -> Self {
        Self {
            use_color,
            exit_on_fatal: true,
            sink: Sink::Stderr,
        }
    }

    pub fn silent() -> Self {
        Self {
            use_color: false,
            exit_on_fatal: false,
            sink: Sink::Silent,
        }
    }

    pub fn captured(buffer: Arc<Mutex<Vec<u8>>>) -> Self {
        Self {
            use_color: false,
            exit_on_fatal: false,
            sink: Sink::Captured(buffer),
        }
    }
}

enum Message {
    Report(Diagnostic),
    Shutdown,
}

/// Producer handle for the error reporter.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: Sender<Message>,
}

impl Reporter {
    /// Enqueue a diagnostic. Never blocks.
    pub fn report(&self, diagnostic: Diagnostic) {
        trace!(%diagnostic, "enqueue diagnostic");
        if self.tx.send(Message::Report(diagnostic)).is_err() {
            warn!("error reporter already shut down, diagnostic dropped");
        }
    }
}

/// Owner of the background consumer thread.
pub struct ErrorReporter {
    handle: Reporter,
    thread: Option<JoinHandle<Vec<Diagnostic>>>,
}

impl ErrorReporter {
    /// Start the consumer thread.
    pub fn spawn(config: ReporterConfig) -> io::Result<Self> {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("quill-reporter".into())
            .spawn(move || consume(rx, config))?;
        debug!("error reporter started");

        Ok(Self {
            handle: Reporter { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> Reporter {
        self.handle.clone()
    }

    /// Drain the queue, stop the consumer and return every diagnostic it saw, in order.
    pub fn finish(mut self) -> Vec<Diagnostic> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Vec<Diagnostic> {
        let Some(thread) = self.thread.take() else {
            return Vec::new();
        };
        // Producers may outlive us through clones, so a marker ends the loop
        // rather than channel disconnection.
        let _ = self.handle.tx.send(Message::Shutdown);
        let diagnostics = thread.join().unwrap_or_else(|_| {
            warn!("error reporter thread panicked");
            Vec::new()
        });
        debug!(count = diagnostics.len(), "error reporter stopped");
        diagnostics
    }
}

impl Drop for ErrorReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Shared byte buffer usable as a `Write` target.
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "diagnostic buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn open_sink(config: &ReporterConfig) -> Option<Box<dyn WriteColor>> {
    match &config.sink {
        Sink::Stderr => {
            let choice = if config.use_color {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            };
            Some(Box::new(StandardStream::stderr(choice)))
        }
        Sink::Captured(buffer) => Some(Box::new(NoColor::new(SharedBuffer(Arc::clone(buffer))))),
        Sink::Silent => None,
    }
}

fn consume(rx: Receiver<Message>, config: ReporterConfig) -> Vec<Diagnostic> {
    let render_config = RenderConfig {
        use_color: config.use_color,
        ..RenderConfig::default()
    };
    let mut renderer = open_sink(&config).map(|sink| TerminalRenderer::new(sink, render_config));
    let mut seen = Vec::new();

    let mut emit = |diagnostic: Diagnostic, seen: &mut Vec<Diagnostic>| {
        if let Some(renderer) = renderer.as_mut() {
            if let Err(err) = renderer.render(&diagnostic) {
                warn!(%err, "failed to render diagnostic");
            }
        }
        seen.push(diagnostic);
    };

    while let Ok(message) = rx.recv() {
        match message {
            Message::Report(diagnostic) => {
                let fatal = diagnostic.is_fatal();
                emit(diagnostic, &mut seen);

                if fatal && config.exit_on_fatal {
                    // Render whatever is already queued before terminating.
                    for queued in rx.try_iter() {
                        if let Message::Report(diagnostic) = queued {
                            emit(diagnostic, &mut seen);
                        }
                    }
                    let _ = io::stdout().flush();
                    std::process::exit(1);
                }
            }
            Message::Shutdown => break,
        }
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostics_are_recorded_in_send_order() {
        let reporter = ErrorReporter::spawn(ReporterConfig::silent()).unwrap();
        let handle = reporter.handle();

        for i in 0..50 {
            handle.report(Diagnostic::warning(format!("w{}", i)).at("main.ql", i + 1, 1));
        }
        handle.report(Diagnostic::fatal("last"));

        let diagnostics = reporter.finish();
        assert_eq!(diagnostics.len(), 51);
        assert_eq!(diagnostics[0].message, "w0");
        assert_eq!(diagnostics[49].message, "w49");
        assert_eq!(diagnostics[50].severity, Severity::Fatal);
    }

    #[test]
    fn test_reports_from_other_threads_are_kept() {
        let reporter = ErrorReporter::spawn(ReporterConfig::silent()).unwrap();
        let handle = reporter.handle();

        let worker = std::thread::spawn(move || {
            handle.report(Diagnostic::warning("from worker"));
        });
        worker.join().unwrap();

        let diagnostics = reporter.finish();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "from worker");
    }

    #[test]
    fn test_captured_sink_renders_text() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reporter = ErrorReporter::spawn(ReporterConfig::captured(Arc::clone(&buffer))).unwrap();

        reporter
            .handle()
            .report(Diagnostic::fatal("undefined variable: y").at("main.ql", 1, 7));
        reporter.finish();

        let text = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "fatal: undefined variable: y\n --> main.ql:1:7\n");
    }

    #[test]
    fn test_report_after_finish_is_dropped_quietly() {
        let reporter = ErrorReporter::spawn(ReporterConfig::silent()).unwrap();
        let handle = reporter.handle();
        assert!(reporter.finish().is_empty());
        handle.report(Diagnostic::warning("late"));
    }
}
