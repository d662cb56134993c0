//! Diagnostic rendering for terminal and other outputs.

use std::io::{self, Write};

use termcolor::{Color, ColorSpec, WriteColor};
use unicode_width::UnicodeWidthStr;

use crate::{Diagnostic, Severity};

/// Configuration for the diagnostic renderer.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Whether to use colors.
    pub use_color: bool,
    /// Maximum line width for source snippets.
    pub max_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            use_color: true,
            max_width: 100,
        }
    }
}

/// Renders diagnostics in the form
///
/// ```text
/// fatal[E0201]: cannot set value of x to "a" because it is of type string and not int
///  --> main.ql:3:5
///   |
/// 3 | x = "a"
///   |     ^^^
/// ```
pub struct TerminalRenderer<W: WriteColor> {
    config: RenderConfig,
    stream: W,
}

impl<W: WriteColor> TerminalRenderer<W> {
    pub fn new(stream: W, config: RenderConfig) -> Self {
        Self { config, stream }
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    fn severity_color(severity: Severity) -> Color {
        match severity {
            Severity::Warning => Color::Yellow,
            Severity::Fatal => Color::Red,
        }
    }

    /// Writes colored text.
    fn write_colored(&mut self, text: &str, color: Color, bold: bool) -> io::Result<()> {
        if !self.config.use_color {
            return write!(self.stream, "{}", text);
        }
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(bold);
        self.stream.set_color(&spec)?;
        write!(self.stream, "{}", text)?;
        self.stream.reset()?;
        Ok(())
    }

    fn write_header(&mut self, diagnostic: &Diagnostic) -> io::Result<()> {
        let color = Self::severity_color(diagnostic.severity);
        self.write_colored(diagnostic.severity.prefix(), color, true)?;
        if let Some(code) = &diagnostic.code {
            self.write_colored(&format!("[{}]", code), color, true)?;
        }
        self.write_colored(": ", color, true)?;
        self.write_colored(&diagnostic.message, Color::White, true)?;
        writeln!(self.stream)
    }

    fn write_snippet(&mut self, diagnostic: &Diagnostic, line_text: &str, width: usize) -> io::Result<()> {
        let gutter = diagnostic.line.to_string().len();
        let line_text = truncate(line_text, self.config.max_width);

        writeln!(self.stream, "{:>gutter$} |", "", gutter = gutter)?;
        self.write_colored(&format!("{:>gutter$}", diagnostic.line, gutter = gutter), Color::Blue, false)?;
        writeln!(self.stream, " | {}", line_text)?;

        // Pad with the display width of the characters before the column so wide
        // characters keep the caret aligned.
        let prefix: String = line_text
            .chars()
            .take(diagnostic.column.saturating_sub(1))
            .collect();
        let pad = UnicodeWidthStr::width(prefix.as_str());
        let underline: String = std::iter::repeat(diagnostic.severity.underline_char())
            .take(width.max(1))
            .collect();

        write!(self.stream, "{:>gutter$} | {:pad$}", "", "", gutter = gutter, pad = pad)?;
        self.write_colored(&underline, Self::severity_color(diagnostic.severity), true)?;
        writeln!(self.stream)
    }

    /// Renders a single diagnostic.
    pub fn render(&mut self, diagnostic: &Diagnostic) -> io::Result<()> {
        self.write_header(diagnostic)?;

        if diagnostic.has_position() {
            writeln!(
                self.stream,
                " --> {}:{}:{}",
                diagnostic.file, diagnostic.line, diagnostic.column
            )?;
            if let Some(snippet) = &diagnostic.snippet {
                self.write_snippet(diagnostic, &snippet.line_text, snippet.width)?;
            }
        } else if !diagnostic.file.is_empty() {
            writeln!(self.stream, " --> {}", diagnostic.file)?;
        }

        self.stream.flush()
    }
}

fn truncate(line: &str, max_width: usize) -> String {
    if line.chars().count() <= max_width {
        return line.to_string();
    }
    let mut out: String = line.chars().take(max_width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use termcolor::Buffer;

    fn render_plain(diagnostic: &Diagnostic) -> String {
        let config = RenderConfig {
            use_color: false,
            ..RenderConfig::default()
        };
        let mut renderer = TerminalRenderer::new(Buffer::no_color(), config);
        renderer.render(diagnostic).unwrap();
        String::from_utf8(renderer.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn test_render_with_snippet() {
        let diagnostic = Diagnostic::fatal("unsupported operation: cannot mod float")
            .with_code("E0102")
            .at("main.ql", 2, 7)
            .with_snippet("print(1.0 % 2.0)", 1);

        assert_eq!(
            render_plain(&diagnostic),
            "fatal[E0102]: unsupported operation: cannot mod float\n \
             --> main.ql:2:7\n  \
             |\n\
             2 | print(1.0 % 2.0)\n  \
             |       ^\n"
        );
    }

    #[test]
    fn test_render_warning_without_snippet() {
        let diagnostic = Diagnostic::warning("redeclared x").at("lib.ql", 10, 1);
        assert_eq!(
            render_plain(&diagnostic),
            "warning: redeclared x\n --> lib.ql:10:1\n"
        );
    }

    #[test]
    fn test_render_without_position() {
        let diagnostic = Diagnostic::fatal("cannot read file");
        assert_eq!(render_plain(&diagnostic), "fatal: cannot read file\n");
    }

    #[test]
    fn test_truncate_long_lines() {
        assert_eq!(truncate("abcdef", 10), "abcdef");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
