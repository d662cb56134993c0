//! The `console` library.

use std::rc::Rc;

use quill_lexer::Span;
use termcolor::Color;

use crate::environment::Streams;
use crate::module::Module;
use crate::value::Value;
use crate::{Result, RuntimeError};

/// Terminal input and output: `print`, `println`, `printf`, `printInColor`
/// and `input`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Console {
    pub fn create() -> Rc<dyn Module> {
        Rc::new(Console)
    }
}

fn join(args: &[Value], separator: &str) -> String {
    args.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

fn verb_count(format: &str) -> usize {
    let mut count = 0;
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('v' | 'd' | 'f' | 's') => count += 1,
                _ => {}
            }
        }
    }
    count
}

/// Expand `%v`, `%d`, `%f`, `%s` and `%%` in `format`.
fn sprintf(format: &str, args: &[Value]) -> Result<String> {
    let needed = verb_count(format);
    if args.len() < needed {
        return Err(RuntimeError::ArityMismatch {
            name: "console.printf".into(),
            expected: needed + 1,
            got: args.len() + 1,
            span: Span::dummy(),
        });
    }

    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => out.push('%'),
            Some(verb @ ('v' | 'd' | 'f' | 's')) => {
                let arg = args.next().map(|arg| arg.resolved().into_owned());
                match (verb, arg) {
                    ('f', Some(Value::Int(n))) => out.push_str(&format!("{:.6}", n as f32)),
                    ('d', Some(Value::Float(f))) => out.push_str(&(f.trunc() as i64).to_string()),
                    (_, Some(value)) => out.push_str(&value.to_string()),
                    (_, None) => {}
                }
            }
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => {
                out.push('%');
                continue;
            }
        }
        chars.next();
    }
    Ok(out)
}

impl Module for Console {
    fn name(&self) -> &str {
        "console"
    }

    fn call(&self, function: &str, args: Vec<Value>, streams: &Streams) -> Result<Vec<Value>> {
        match function {
            "print" => {
                streams.write(&join(&args, "")).map_err(RuntimeError::io)?;
                Ok(Vec::new())
            }
            "println" => {
                let mut line = join(&args, " ");
                line.push('\n');
                streams.write(&line).map_err(RuntimeError::io)?;
                Ok(Vec::new())
            }
            "printf" => {
                let Some((format, rest)) = args.split_first() else {
                    return Err(RuntimeError::ArityMismatch {
                        name: "console.printf".into(),
                        expected: 1,
                        got: 0,
                        span: Span::dummy(),
                    });
                };
                let text = sprintf(&format.to_string(), rest)?;
                streams.write(&text).map_err(RuntimeError::io)?;
                Ok(Vec::new())
            }
            "printInColor" => {
                let Some((color, rest)) = args.split_first() else {
                    return Err(RuntimeError::ArityMismatch {
                        name: "console.printInColor".into(),
                        expected: 1,
                        got: 0,
                        span: Span::dummy(),
                    });
                };
                let color: Color = color.to_string().parse().map_err(|err: termcolor::ParseColorError| {
                    RuntimeError::InvalidArgument {
                        function: "console.printInColor".into(),
                        message: err.to_string(),
                        span: Span::dummy(),
                    }
                })?;
                streams
                    .write_colored(&join(rest, ""), color)
                    .map_err(RuntimeError::io)?;
                Ok(Vec::new())
            }
            "input" => {
                if let Some(prompt) = args.first() {
                    streams.write(&prompt.to_string()).map_err(RuntimeError::io)?;
                }
                let line = streams.read_line().map_err(RuntimeError::io)?;
                Ok(vec![Value::string(line)])
            }
            _ => Err(RuntimeError::UndefinedFunction {
                name: function.into(),
                span: Span::dummy(),
            }),
        }
    }
}
