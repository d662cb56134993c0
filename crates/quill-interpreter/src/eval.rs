//! Evaluation of statements and expressions.

use std::cell::RefCell;
use std::rc::Rc;

use quill_ast::*;
use quill_diagnostics::Severity;
use quill_modules::{FileSystemResolver, ModuleError, ModuleId};
use tracing::{debug, trace};

use crate::binding::{Any, Binding, Slot, Var};
use crate::environment::{Activation, Environment, UnitInfo};
use crate::module::{Loader, Module, SourceModule};
use crate::ops::{Operators, ValueError};
use crate::scope::FrameKind;
use crate::stack;
use crate::value::{tags, Array, Value};
use crate::{Result, RuntimeError};

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
enum Flow {
    Normal,
    Return(Option<Value>),
}

/// The tree-walking interpreter for one source unit.
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Execute every top-level statement in order.
    ///
    /// A failure is reported as a fatal diagnostic against this unit and the
    /// run stops; the returned error is then always [`RuntimeError::Aborted`].
    pub fn run(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.stmts {
            match self.exec(stmt) {
                Ok(Flow::Normal) | Ok(Flow::Return(_)) => {}
                Err(err) => return Err(self.fail(err)),
            }
        }
        Ok(())
    }

    /// Report `err` unless that already happened.
    fn fail(&self, err: RuntimeError) -> RuntimeError {
        if err == RuntimeError::Aborted {
            return err;
        }
        debug!(%err, "runtime failure");
        self.env
            .report_at(Severity::Fatal, err.code(), err.to_string(), err.span());
        RuntimeError::Aborted
    }

    /// Run `f` inside a new frame that is popped whatever `f` returns.
    fn with_frame<T>(&mut self, kind: FrameKind, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.env.scope_mut().enter(kind);
        let result = f(self);
        self.env.scope_mut().exit();
        result
    }

    fn declare(&mut self, name: &Ident, binding: Binding) {
        if self
            .env
            .scope_mut()
            .declare(name.node.clone(), binding)
            .is_some()
        {
            self.env.report_at(
                Severity::Warning,
                "W0001",
                format!("{} is already declared in this scope", name.node),
                name.span,
            );
        }
    }

    /// Read, change and store back the binding called `name`. The stored
    /// binding is left as it was when `change` fails.
    fn update(
        &mut self,
        name: &Ident,
        span: Span,
        change: impl FnOnce(&mut Binding) -> std::result::Result<(), ValueError>,
    ) -> Result<()> {
        let mut binding = self
            .env
            .scope()
            .get(&name.node)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.node.clone(),
                span: name.span,
            })?;
        change(&mut binding).map_err(|error| RuntimeError::value(error, span))?;
        self.env.scope_mut().set(name.node.clone(), binding);
        Ok(())
    }

    fn write(&self, text: &str, span: Span) -> Result<()> {
        self.env
            .streams()
            .write(text)
            .map_err(|err| RuntimeError::io(err).located(span))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::VarDecl { name, ty, init } => {
                let binding = self.declaration(name, &ty.node, init.as_ref())?;
                self.declare(name, binding);
            }

            StmtKind::Assign { name, value } => {
                let value = self.eval(value)?;
                self.update(name, stmt.span, |binding| binding.assign(value))?;
            }

            StmtKind::Increment(name) => {
                self.update(name, stmt.span, |binding| {
                    let next = binding.increment()?;
                    binding.assign(next)
                })?;
            }

            StmtKind::Decrement(name) => {
                self.update(name, stmt.span, |binding| {
                    let next = binding.decrement()?;
                    binding.assign(next)
                })?;
            }

            StmtKind::Print { expr, newline } => {
                let value = self.eval(expr)?;
                let text = if *newline {
                    format!("{}\n", value)
                } else {
                    value.to_string()
                };
                self.write(&text, stmt.span)?;
            }

            StmtKind::TypeOf(expr) => {
                let value = self.eval(expr)?;
                self.write(&format!("{}\n", value.type_tag()), stmt.span)?;
            }

            StmtKind::Function(decl) => {
                let var = Var::new(decl.name.node.clone(), tags::FUNCTION, Value::Function(Rc::clone(decl)))
                    .map_err(|error| RuntimeError::value(error, decl.name.span))?;
                self.declare(&decl.name, var.into());
            }

            StmtKind::Return(expr) => return self.exec_return(expr.as_ref(), stmt.span),

            StmtKind::Block(stmts) => {
                return self.with_frame(FrameKind::Block, |this| this.exec_stmts(stmts));
            }

            StmtKind::Import(import) => self.import(import)?,

            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Call { .. } | ExprKind::ModuleCall { .. } => {
                    self.eval_call(expr)?;
                }
                _ => {
                    self.eval(expr)?;
                }
            },
        }
        Ok(Flow::Normal)
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    /// Build the binding a `var` statement or a parameter introduces.
    fn bind(&self, name: &str, ty: &TypeExpr, value: Option<Value>) -> std::result::Result<Binding, ValueError> {
        Ok(match (ty, value) {
            (TypeExpr::Any, Some(value)) => Any::new(name, value).into(),
            (TypeExpr::Any, None) => Any::empty(name).into(),
            (ty, Some(value)) => Var::new(name, ty.tag(), value)?.into(),
            (ty, None) => Var::empty(name, ty.tag()).into(),
        })
    }

    fn declaration(&mut self, name: &Ident, ty: &TypeExpr, init: Option<&Expr>) -> Result<Binding> {
        let (value, span) = match init {
            Some(expr) => (Some(self.eval(expr)?), expr.span),
            None => (None, name.span),
        };
        self.bind(&name.node, ty, value)
            .map_err(|error| RuntimeError::value(error, span))
    }

    fn exec_return(&mut self, expr: Option<&Expr>, span: Span) -> Result<Flow> {
        let Some(activation) = self.env.peek_activation().cloned() else {
            return Err(RuntimeError::ReturnOutsideFunction { span });
        };
        let value = match expr {
            Some(expr) => Some(self.eval(expr)?),
            None => None,
        };

        let value = match (activation.return_type, value) {
            (Some(ty), Some(value)) => {
                let name = format!("return value of {}", activation.name);
                let checked = Var::new(name, ty, value).map_err(|error| RuntimeError::value(error, span))?;
                Some(Value::from(checked))
            }
            (Some(ty), None) => Some(Value::Null(ty)),
            (None, None) => None,
            (None, Some(value)) => {
                return Err(RuntimeError::value(
                    ValueError::TypeMismatch {
                        name: format!("return value of {}", activation.name).into(),
                        value: value.to_string(),
                        found: value.type_tag(),
                        expected: "void".into(),
                    },
                    span,
                ))
            }
        };
        Ok(Flow::Return(value))
    }

    // ========================================================================
    // Imports
    // ========================================================================

    fn import(&mut self, import: &ImportDecl) -> Result<()> {
        let path = &import.path.node;
        let at = import.keyword.merge(import.path.span);
        let loader = self.env.loader().ok_or_else(|| RuntimeError::ModuleLoad {
            name: path.clone(),
            message: "the run that loaded this module has ended".into(),
            span: at,
        })?;

        let library = loader.borrow().libraries.get(path);
        if let Some(library) = library {
            debug!(library = %path, "import library");
            self.env.import(path.clone(), library);
            return Ok(());
        }

        let resolved = loader
            .borrow_mut()
            .resolver
            .resolve(path, Some(self.env.unit().path()));
        let id = resolved.map_err(|err| match err {
            ModuleError::ModuleNotFound { .. } => RuntimeError::ModuleNotFound {
                message: err.to_string(),
                span: at,
            },
            other => RuntimeError::ModuleLoad {
                name: path.clone(),
                message: other.to_string(),
                span: at,
            },
        })?;
        let name = match loader.borrow().resolver.path(id) {
            Some(resolved) => FileSystemResolver::module_name(resolved),
            None => Ok(path.clone()),
        }
        .map_err(|err| RuntimeError::ModuleLoad {
            name: path.clone(),
            message: err.to_string(),
            span: at,
        })?;

        let cached = loader.borrow().cache.get(id);
        if let Some(module) = cached {
            debug!(module = %name, "import cache hit");
            self.env.import(name, module);
            return Ok(());
        }

        loader
            .borrow_mut()
            .cache
            .begin(id, name.clone())
            .map_err(|err| RuntimeError::CircularImport {
                message: err.to_string(),
                span: at,
            })?;

        match self.load_module(&loader, id, &name, at) {
            Ok(module) => {
                loader.borrow_mut().cache.finish(id, Rc::clone(&module));
                self.env.import(name, module);
                Ok(())
            }
            Err(err) => {
                loader.borrow_mut().cache.abandon(id);
                Err(err)
            }
        }
    }

    /// Parse and run the top level of an imported unit, then freeze it.
    fn load_module(
        &mut self,
        loader: &RefCell<Loader>,
        id: ModuleId,
        name: &SmolStr,
        at: Span,
    ) -> Result<Rc<dyn Module>> {
        let file = loader
            .borrow()
            .resolver
            .load(id)
            .map_err(|err| RuntimeError::ModuleLoad {
                name: name.clone(),
                message: err.to_string(),
                span: at,
            })?;

        let (program, errors) = quill_parser::parse(&file.source);
        let unit = UnitInfo::new(file.path, file.source);
        if let Some(error) = errors.first() {
            let position = unit.diagnostic(Severity::Fatal, "", error.span());
            return Err(RuntimeError::ModuleLoad {
                name: name.clone(),
                message: format!(
                    "{}:{}:{}: {}",
                    position.file, position.line, position.column, error
                ),
                span: at,
            });
        }

        debug!(module = %name, "running module top level");
        let mut module = Interpreter::new(self.env.for_import(unit));
        module.run(&program)?;
        Ok(Rc::new(SourceModule::new(name.clone(), module)))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn function(&self, name: &str) -> Option<Rc<FunctionDecl>> {
        match self.env.scope().get(name).map(Slot::value) {
            Some(Value::Function(decl)) => Some(Rc::clone(decl)),
            _ => None,
        }
    }

    fn bind_params(&mut self, decl: &FunctionDecl, args: Vec<Value>) -> Result<()> {
        for (param, arg) in decl.params.iter().zip(args) {
            let binding = self
                .bind(&param.name.node, &param.ty, Some(arg))
                .map_err(|error| RuntimeError::value(error, Span::dummy()))?;
            self.env.scope_mut().declare(param.name.node.clone(), binding);
        }
        Ok(())
    }

    /// Execute the body of `decl` in the current frame.
    fn run_body(&mut self, decl: &FunctionDecl, call_span: Span) -> Result<Option<Value>> {
        let limit = self.env.max_call_depth();
        if self.env.call_depth() >= limit {
            return Err(RuntimeError::CallDepthExceeded {
                name: decl.name.node.clone(),
                limit,
                span: call_span,
            });
        }

        let return_type = decl.return_type.as_ref().map(TypeExpr::tag);
        self.env.push_activation(Activation {
            name: decl.name.node.clone(),
            return_type: return_type.clone(),
        });
        trace!(
            function = %decl.name.node,
            depth = self.env.call_depth(),
            frames = self.env.scope().depth(),
            "call"
        );
        let flow = stack::ensure_sufficient_stack(|| self.exec_stmts(&decl.body));
        self.env.pop_activation();

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(return_type.map(Value::Null)),
        }
    }

    fn check_arity(decl: &FunctionDecl, got: usize, span: Span) -> Result<()> {
        if decl.params.len() != got {
            return Err(RuntimeError::ArityMismatch {
                name: decl.name.node.clone(),
                expected: decl.params.len(),
                got,
                span,
            });
        }
        Ok(())
    }

    /// Call a function of this unit.
    fn invoke(&mut self, decl: &FunctionDecl, args: Vec<Value>, call_span: Span) -> Result<Option<Value>> {
        Self::check_arity(decl, args.len(), call_span)?;
        self.with_frame(FrameKind::Function, |this| {
            this.bind_params(decl, args).map_err(|err| err.located(call_span))?;
            this.run_body(decl, call_span)
        })
    }

    /// Entry point for calls arriving from an importing unit.
    ///
    /// Failures inside the body are reported against this unit. Failures of
    /// the call itself are returned unpositioned for the caller to place.
    pub(crate) fn call_export(&mut self, function: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let decl = self.function(function).ok_or_else(|| RuntimeError::UndefinedFunction {
            name: function.into(),
            span: Span::dummy(),
        })?;
        Self::check_arity(&decl, args.len(), Span::dummy())?;
        let result = self.with_frame(FrameKind::Function, |this| {
            this.bind_params(&decl, args)?;
            this.run_body(&decl, Span::dummy()).map_err(|err| this.fail(err))
        })?;
        Ok(result.into_iter().collect())
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    /// Evaluate a call and return every value it produced.
    fn eval_call(&mut self, expr: &Expr) -> Result<Vec<Value>> {
        match &expr.kind {
            ExprKind::Call { callee, args } => {
                let decl = self.function(&callee.node).ok_or_else(|| RuntimeError::UndefinedFunction {
                    name: callee.node.clone(),
                    span: callee.span,
                })?;
                let args = self.eval_args(args)?;
                Ok(self.invoke(&decl, args, expr.span)?.into_iter().collect())
            }

            ExprKind::ModuleCall {
                module,
                function,
                args,
            } => {
                let target = self.env.module(&module.node).ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: module.node.clone(),
                    span: module.span,
                })?;
                let args = self.eval_args(args)?;
                let qualified: SmolStr = format!("{}.{}", module.node, function.node).into();
                trace!(call = %qualified, "module call");

                target
                    .call(&function.node, args, self.env.streams())
                    .map_err(|err| match err {
                        RuntimeError::UndefinedFunction { span, .. } if span.is_dummy() => {
                            RuntimeError::UndefinedFunction {
                                name: qualified,
                                span: function.span,
                            }
                        }
                        other => other.located(expr.span),
                    })
            }

            _ => Ok(vec![self.eval(expr)?]),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(literal) => Self::literal(literal, expr.span),

            ExprKind::Ident(name) => self
                .env
                .scope()
                .get(name)
                .map(|binding| binding.value().clone())
                .ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: name.clone(),
                    span: expr.span,
                }),

            ExprKind::Array(items) => {
                let items = self.eval_args(items)?;
                Ok(Value::Array(Array::from_items(items)))
            }

            ExprKind::Binary {
                op,
                op_span,
                left,
                right,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Self::binary(*op, &left, &right).map_err(|error| RuntimeError::value(error, *op_span))
            }

            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                let result = match op {
                    UnaryOp::Neg => Value::Int(0).sub(&value),
                    UnaryOp::Plus => Ok(value),
                    UnaryOp::Not => value.not(),
                };
                result.map_err(|error| RuntimeError::value(error, expr.span))
            }

            ExprKind::Paren(inner) => self.eval(inner),

            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                object
                    .index(&index)
                    .map_err(|error| RuntimeError::value(error, expr.span))
            }

            ExprKind::Call { callee, .. } => self.call_value(expr, callee.node.clone()),

            ExprKind::ModuleCall { module, function, .. } => {
                self.call_value(expr, format!("{}.{}", module.node, function.node).into())
            }
        }
    }

    /// A call used where a value is needed.
    fn call_value(&mut self, expr: &Expr, name: SmolStr) -> Result<Value> {
        self.eval_call(expr)?
            .into_iter()
            .next()
            .ok_or(RuntimeError::NoValue {
                name,
                span: expr.span,
            })
    }

    fn binary(op: BinaryOp, left: &Value, right: &Value) -> std::result::Result<Value, ValueError> {
        match op {
            BinaryOp::Add => left.add(right),
            BinaryOp::Sub => left.sub(right),
            BinaryOp::Mul => left.mul(right),
            BinaryOp::Div => left.div(right),
            BinaryOp::ExactDiv => left.exact_div(right),
            BinaryOp::Mod => left.modulo(right),
            BinaryOp::Eq => left.equal(right),
            BinaryOp::NotEq => left.not_equal(right),
            BinaryOp::Lt => left.lw(right),
            BinaryOp::Gt => left.gt(right),
            BinaryOp::LtEq => left.lw_eq(right),
            BinaryOp::GtEq => left.gt_eq(right),
            BinaryOp::And => left.and(right),
            BinaryOp::Or => left.or(right),
            BinaryOp::Xor => left.xor(right),
        }
    }

    fn literal(literal: &Literal, span: Span) -> Result<Value> {
        let malformed = |kind| RuntimeError::MalformedLiteral {
            kind,
            text: literal.text.clone(),
            span,
        };
        let text = literal.text.as_str();
        match literal.kind {
            LiteralKind::Int => text.parse().map(Value::Int).map_err(|_| malformed("int")),
            LiteralKind::Float => text.parse().map(Value::Float).map_err(|_| malformed("float")),
            LiteralKind::String => Ok(Value::String(literal.text.clone())),
            LiteralKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(malformed("char")),
                }
            }
            LiteralKind::Bool => Ok(Value::Bool(text == "true")),
            LiteralKind::Null => Ok(Value::null()),
        }
    }
}
