//! Quill Language Runner
//!
//! Command-line interface for running and inspecting Quill programs.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Once;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};
use quill_ast::{Stmt, StmtKind};
use quill_interpreter::{evaluate_with_timings, RunConfig, SourceUnit};
use quill_lexer::{LexerError, Lexer};
use quill_parser::{parse, ParseError};

#[derive(Parser)]
#[command(name = "quill")]
#[command(version = "0.1.0")]
#[command(about = "The Quill scripting language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Quill program
    Run {
        /// Source file to run
        file: PathBuf,
        /// Print how long each phase took to stderr
        #[arg(long)]
        timings: bool,
        /// Disable colored diagnostics
        #[arg(long)]
        no_color: bool,
    },
    /// Lex source file and display tokens
    Lex {
        /// Source file to lex
        file: PathBuf,
    },
    /// Parse source file and display its statements
    Parse {
        /// Source file to parse
        file: PathBuf,
        /// Show full AST details
        #[arg(short, long)]
        verbose: bool,
    },
}

static TRACING_INIT: Once = Once::new();

/// Install a tracing subscriber when `RUST_LOG` is set.
///
/// Example: `RUST_LOG=quill_interpreter=trace quill run main.ql`
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            timings,
            no_color,
        } => run_file(&file, timings, !no_color),
        Commands::Lex { file } => lex_file(&file),
        Commands::Parse { file, verbose } => parse_file(&file, verbose),
    }
}

fn read_source(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            None
        }
    }
}

/// Run a program; diagnostics go to stderr and the first fatal one ends it.
fn run_file(path: &Path, show_timings: bool, use_color: bool) -> ExitCode {
    let unit = match SourceUnit::from_path(path) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(file = %path.display(), "running");
    let (outcome, timings) = evaluate_with_timings(unit, RunConfig::terminal(use_color));
    if show_timings {
        eprintln!("{}", timings);
    }

    if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Lex a source file and display tokens
fn lex_file(path: &Path) -> ExitCode {
    let Some(source) = read_source(path) else {
        return ExitCode::FAILURE;
    };
    let filename = path.display().to_string();

    let (tokens, lex_errors) = Lexer::new(&source).tokenize_filtered();

    println!("Tokens ({}):", tokens.len());
    for token in &tokens {
        println!("  {:?} @ {}..{}", token.kind, token.span.start, token.span.end);
    }

    for error in &lex_errors {
        report_lex_error(&filename, &source, error);
    }

    if lex_errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Parse a source file and display the statements it holds
fn parse_file(path: &Path, verbose: bool) -> ExitCode {
    let Some(source) = read_source(path) else {
        return ExitCode::FAILURE;
    };
    let filename = path.display().to_string();

    let (program, parse_errors) = parse(&source);

    for error in &parse_errors {
        report_parse_error(&filename, &source, error);
    }

    if verbose {
        println!("{:#?}", program);
    } else {
        println!("Parsed {} statements:", program.stmts.len());
        for stmt in &program.stmts {
            print_stmt_summary(stmt, 1);
        }
    }

    if parse_errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report_lex_error(filename: &str, source: &str, error: &LexerError) {
    let (LexerError::UnexpectedCharacter(offset, c) | LexerError::InvalidEscape(offset, c)) = error;
    let span_range = *offset..offset + c.len_utf8();

    let _ = Report::build(ReportKind::Error, filename, span_range.start)
        .with_code("E0001")
        .with_message(error.to_string())
        .with_label(Label::new((filename, span_range)).with_color(Color::Red))
        .finish()
        .eprint((filename, Source::from(source)));
}

fn report_parse_error(filename: &str, source: &str, error: &ParseError) {
    let span = error.span();
    // Errors at end of input point just past the last character.
    let start = span.start.min(source.len().saturating_sub(1));
    let span_range = start..span.end.max(start + 1);

    let label = match error {
        ParseError::UnexpectedToken { expected, .. } | ParseError::UnexpectedEof { expected, .. } => {
            format!("expected {} here", expected)
        }
        ParseError::UnknownType { .. } => {
            "types are int, float, string, char, bool, any, function and []T".to_string()
        }
        ParseError::InvalidAssignTarget { .. } => "only variables can be assigned".to_string(),
        ParseError::Lex { .. } => "not valid here".to_string(),
    };

    let _ = Report::build(ReportKind::Error, filename, span_range.start)
        .with_code("E0002")
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, span_range))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .eprint((filename, Source::from(source)));
}

fn print_stmt_summary(stmt: &Stmt, depth: usize) {
    let indent = "  ".repeat(depth);
    match &stmt.kind {
        StmtKind::VarDecl { name, ty, init } => {
            let init = if init.is_some() { " = ..." } else { "" };
            println!("{}var {} {}{}", indent, name.node, ty.node, init);
        }
        StmtKind::Assign { name, .. } => println!("{}{} = ...", indent, name.node),
        StmtKind::Increment(name) => println!("{}{}++", indent, name.node),
        StmtKind::Decrement(name) => println!("{}{}--", indent, name.node),
        StmtKind::Print { newline, .. } => {
            println!("{}{}(...)", indent, if *newline { "println" } else { "print" })
        }
        StmtKind::TypeOf(_) => println!("{}type(...)", indent),
        StmtKind::Function(decl) => {
            let params: Vec<_> = decl
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name.node, p.ty))
                .collect();
            let ret = decl
                .return_type
                .as_ref()
                .map(|ty| format!(" {}", ty))
                .unwrap_or_default();
            println!("{}function {}({}){}", indent, decl.name.node, params.join(", "), ret);
            for inner in &decl.body {
                print_stmt_summary(inner, depth + 1);
            }
        }
        StmtKind::Return(value) => {
            println!("{}return{}", indent, if value.is_some() { " ..." } else { "" })
        }
        StmtKind::Block(stmts) => {
            println!("{}block ({} statements)", indent, stmts.len());
            for inner in stmts {
                print_stmt_summary(inner, depth + 1);
            }
        }
        StmtKind::Import(import) => println!("{}import {:?}", indent, import.path.node.as_str()),
        StmtKind::Expr(_) => println!("{}expression", indent),
    }
}
