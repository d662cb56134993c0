//! Quill Language Abstract Syntax Tree
//!
//! Defines the node shapes produced by the parser and walked by the interpreter.

use std::fmt;
use std::rc::Rc;

// Re-export common types for use by other crates
pub use quill_lexer::Span;
pub use smol_str::SmolStr;

/// A spanned value - wraps any value with source location info
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }
}

/// Identifier (variable names, function names, module names)
pub type Ident = Spanned<SmolStr>;

// ============================================================================
// Program Structure
// ============================================================================

/// A complete Quill source unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

// ============================================================================
// Types
// ============================================================================

/// A declared type as written in source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Int,
    Float,
    String,
    Char,
    Bool,
    Any,
    Function,
    Array(Box<TypeExpr>),
}

impl TypeExpr {
    /// Resolve a builtin type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(TypeExpr::Int),
            "float" => Some(TypeExpr::Float),
            "string" => Some(TypeExpr::String),
            "char" => Some(TypeExpr::Char),
            "bool" => Some(TypeExpr::Bool),
            "any" => Some(TypeExpr::Any),
            "function" => Some(TypeExpr::Function),
            _ => None,
        }
    }

    /// The runtime type tag this declaration checks against (`int`, `[]string`, ...)
    pub fn tag(&self) -> SmolStr {
        SmolStr::new(self.to_string())
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Int => write!(f, "int"),
            TypeExpr::Float => write!(f, "float"),
            TypeExpr::String => write!(f, "string"),
            TypeExpr::Char => write!(f, "char"),
            TypeExpr::Bool => write!(f, "bool"),
            TypeExpr::Any => write!(f, "any"),
            TypeExpr::Function => write!(f, "function"),
            TypeExpr::Array(elem) => write!(f, "[]{}", elem),
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `var name type (= init)?`
    VarDecl {
        name: Ident,
        ty: Spanned<TypeExpr>,
        init: Option<Expr>,
    },
    /// `name = value`
    Assign { name: Ident, value: Expr },
    /// `name++`
    Increment(Ident),
    /// `name--`
    Decrement(Ident),
    /// `print(expr)` / `println(expr)`
    Print { expr: Expr, newline: bool },
    /// `type(expr)`
    TypeOf(Expr),
    Function(Rc<FunctionDecl>),
    Return(Option<Expr>),
    Block(Vec<Stmt>),
    Import(ImportDecl),
    Expr(Expr),
}

/// A function declaration; also the payload of a runtime function value
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
}

/// `import "path"`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub path: Spanned<SmolStr>,
    /// Span of the `import` keyword, used to position resolution failures
    pub keyword: Span,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(SmolStr),
    Array(Vec<Expr>),
    Binary {
        op: BinaryOp,
        /// Span of the operator token
        op_span: Span,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Paren(Box<Expr>),
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// `name(args)`
    Call { callee: Ident, args: Vec<Expr> },
    /// `module.function(args)`
    ModuleCall {
        module: Ident,
        function: Ident,
        args: Vec<Expr>,
    },
}

/// A literal keeps its source text; the interpreter builds the value from it
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: SmolStr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Float,
    String,
    Char,
    Bool,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    ExactDiv,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Logical
    And,
    Or,
    Xor,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::ExactDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        assert_eq!(TypeExpr::Int.tag(), "int");
        assert_eq!(
            TypeExpr::Array(Box::new(TypeExpr::Array(Box::new(TypeExpr::String)))).tag(),
            "[][]string"
        );
        assert_eq!(TypeExpr::from_name("bool"), Some(TypeExpr::Bool));
        assert_eq!(TypeExpr::from_name("Int"), None);
    }

    #[test]
    fn test_binary_op_display() {
        assert_eq!(BinaryOp::ExactDiv.to_string(), "//");
        assert_eq!(BinaryOp::Xor.to_string(), "^");
    }
}
