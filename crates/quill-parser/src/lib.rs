//! Quill Language Parser
//!
//! Recursive descent parser that produces an AST from the token stream.
//! Errors are collected rather than returned, recovering at the next statement.

use std::rc::Rc;

use quill_ast::*;
use quill_lexer::{unescape, Lexer, LexerError, Token, TokenKind};
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },

    #[error("unknown type '{name}'")]
    UnknownType { name: String, span: Span },

    #[error("invalid assignment target")]
    InvalidAssignTarget { span: Span },

    #[error("{error}")]
    Lex { error: LexerError, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::UnknownType { span, .. }
            | ParseError::InvalidAssignTarget { span }
            | ParseError::Lex { span, .. } => *span,
        }
    }
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parser state
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    /// Create a new parser from source code
    pub fn new(source: &'src str) -> Self {
        let (tokens, lex_errors) = Lexer::new(source).tokenize_filtered();
        let mut parser = Self::from_tokens(source, tokens);
        parser.errors.extend(lex_errors.into_iter().map(|error| {
            let span = match error {
                LexerError::UnexpectedCharacter(pos, c) => Span::new(pos, pos + c.len_utf8()),
                LexerError::InvalidEscape(pos, _) => Span::new(pos, pos + 1),
            };
            ParseError::Lex { error, span }
        }));
        parser
    }

    /// Create a parser over an already lexed, comment-free token stream
    pub fn from_tokens(source: &'src str, tokens: Vec<Token>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Error)
            .collect();
        Self {
            source,
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Parse the entire program
    pub fn parse_program(&mut self) -> Program {
        let mut stmts = Vec::new();

        while !self.is_eof() {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_next_statement();
                }
            }
        }

        Program {
            stmts,
            span: Span::new(0, self.source.len()),
        }
    }

    /// Get collected errors
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn current_span(&self) -> Span {
        self.current()
            .map(|t| t.span)
            .unwrap_or(Span::new(self.source.len(), self.source.len()))
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or(Span::new(0, 0))
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| &t.kind)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(token) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
                span: token.span,
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                span: self.current_span(),
            },
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Span> {
        if self.check(kind) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(&format!("'{}'", kind)))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match self.current_kind() {
            Some(TokenKind::Identifier(name)) => {
                let ident = Spanned::new(name.clone(), self.current_span());
                self.advance();
                Ok(ident)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// The name after `module.`; keywords such as `print` are plain names there
    fn expect_member_name(&mut self) -> ParseResult<Ident> {
        match self.current_kind() {
            Some(kind) if kind.is_keyword() => {
                let ident = Spanned::new(SmolStr::new(kind.to_string()), self.current_span());
                self.advance();
                Ok(ident)
            }
            _ => self.expect_ident(),
        }
    }

    /// Skip tokens until just past a `;` or up to the start of the next statement
    fn recover_to_next_statement(&mut self) {
        // Always make progress so a bad token cannot stall the loop.
        if self.advance().is_none() {
            return;
        }
        while let Some(kind) = self.current_kind() {
            match kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Var
                | TokenKind::Function
                | TokenKind::Import
                | TokenKind::Return
                | TokenKind::Print
                | TokenKind::Println
                | TokenKind::Type
                | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let stmt = match self.current_kind() {
            Some(TokenKind::Var) => self.parse_var_decl()?,
            Some(TokenKind::Function) => self.parse_function()?,
            Some(TokenKind::Import) => self.parse_import()?,
            Some(TokenKind::Return) => self.parse_return()?,
            Some(TokenKind::LBrace) => {
                let start = self.current_span();
                let body = self.parse_block()?;
                Stmt::new(StmtKind::Block(body), start.merge(self.previous_span()))
            }
            Some(TokenKind::Print) => self.parse_print(false)?,
            Some(TokenKind::Println) => self.parse_print(true)?,
            Some(TokenKind::Type) => {
                let start = self.current_span();
                self.advance();
                let expr = self.parse_paren_operand()?;
                Stmt::new(StmtKind::TypeOf(expr), start.merge(self.previous_span()))
            }
            Some(TokenKind::Identifier(_)) => self.parse_ident_stmt()?,
            _ => {
                let expr = self.parse_expr()?;
                let span = expr.span;
                Stmt::new(StmtKind::Expr(expr), span)
            }
        };
        self.eat(&TokenKind::Semicolon);
        Ok(stmt)
    }

    fn parse_var_decl(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(&TokenKind::Var)?;
        let name = self.expect_ident()?;
        let ty_start = self.current_span();
        let ty = self.parse_type()?;
        let ty = Spanned::new(ty, ty_start.merge(self.previous_span()));

        let init = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::VarDecl { name, ty, init },
            start.merge(self.previous_span()),
        ))
    }

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        match self.current_kind() {
            Some(TokenKind::LBracket) => {
                self.advance();
                self.expect(&TokenKind::RBracket)?;
                Ok(TypeExpr::Array(Box::new(self.parse_type()?)))
            }
            Some(TokenKind::Function) => {
                self.advance();
                Ok(TypeExpr::Function)
            }
            Some(TokenKind::Identifier(name)) => {
                let span = self.current_span();
                let ty = TypeExpr::from_name(name).ok_or_else(|| ParseError::UnknownType {
                    name: name.to_string(),
                    span,
                })?;
                self.advance();
                Ok(ty)
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn parse_function(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(&TokenKind::Function)?;
        let name = self.expect_ident()?;

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param_name = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(Param {
                    name: param_name,
                    ty,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;

        let return_type = if self.check(&TokenKind::LBrace) {
            None
        } else {
            Some(self.parse_type()?)
        };

        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());

        Ok(Stmt::new(
            StmtKind::Function(Rc::new(FunctionDecl {
                name,
                params,
                return_type,
                body,
                span,
            })),
            span,
        ))
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();

        while !self.check(&TokenKind::RBrace) {
            if self.is_eof() {
                return Err(self.unexpected("'}'"));
            }
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_next_statement();
                }
            }
        }

        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_import(&mut self) -> ParseResult<Stmt> {
        let keyword = self.expect(&TokenKind::Import)?;
        let path = match self.current_kind() {
            Some(TokenKind::String(raw)) => {
                let span = self.current_span();
                let text = unescape(raw, span.start).map_err(|error| ParseError::Lex { error, span })?;
                self.advance();
                Spanned::new(SmolStr::new(text), span)
            }
            _ => return Err(self.unexpected("module path string")),
        };

        Ok(Stmt::new(
            StmtKind::Import(ImportDecl { path, keyword }),
            keyword.merge(self.previous_span()),
        ))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(&TokenKind::Return)?;
        let value = match self.current_kind() {
            None | Some(TokenKind::Semicolon) | Some(TokenKind::RBrace) => None,
            _ => Some(self.parse_expr()?),
        };
        Ok(Stmt::new(
            StmtKind::Return(value),
            start.merge(self.previous_span()),
        ))
    }

    fn parse_print(&mut self, newline: bool) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance();
        let expr = self.parse_paren_operand()?;
        Ok(Stmt::new(
            StmtKind::Print { expr, newline },
            start.merge(self.previous_span()),
        ))
    }

    /// `( expr )` operand of the print family and `type`
    fn parse_paren_operand(&mut self) -> ParseResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    /// Statements that start with an identifier: assignment, `++`, `--`, or an expression
    fn parse_ident_stmt(&mut self) -> ParseResult<Stmt> {
        let kind = self.peek_kind().cloned();
        match kind {
            Some(TokenKind::Eq) => {
                let name = self.expect_ident()?;
                self.advance();
                let value = self.parse_expr()?;
                let span = name.span.merge(value.span);
                Ok(Stmt::new(StmtKind::Assign { name, value }, span))
            }
            Some(TokenKind::PlusPlus) | Some(TokenKind::MinusMinus) => {
                let name = self.expect_ident()?;
                let op_span = self.current_span();
                let span = name.span.merge(op_span);
                let stmt = if kind == Some(TokenKind::PlusPlus) {
                    StmtKind::Increment(name)
                } else {
                    StmtKind::Decrement(name)
                };
                self.advance();
                Ok(Stmt::new(stmt, span))
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.check(&TokenKind::Eq) {
                    return Err(ParseError::InvalidAssignTarget { span: expr.span });
                }
                let span = expr.span;
                Ok(Stmt::new(StmtKind::Expr(expr), span))
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn binary(op: BinaryOp, op_span: Span, left: Expr, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        Expr::new(
            ExprKind::Binary {
                op,
                op_span,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    /// Parse one left-associative precedence level
    fn parse_level(
        &mut self,
        next: fn(&mut Self) -> ParseResult<Expr>,
        op_for: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> ParseResult<Expr> {
        let mut left = next(self)?;

        while let Some(op) = self.current_kind().and_then(op_for) {
            let op_span = self.current_span();
            self.advance();
            let right = next(self)?;
            left = Self::binary(op, op_span, left, right);
        }

        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        self.parse_level(Self::parse_and, |kind| match kind {
            TokenKind::PipePipe => Some(BinaryOp::Or),
            TokenKind::Caret => Some(BinaryOp::Xor),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        self.parse_level(Self::parse_equality, |kind| match kind {
            TokenKind::AmpAmp => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        self.parse_level(Self::parse_comparison, |kind| match kind {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::BangEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        self.parse_level(Self::parse_additive, |kind| match kind {
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        self.parse_level(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        self.parse_level(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::SlashSlash => Some(BinaryOp::ExactDiv),
            TokenKind::Percent => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.current_kind() {
            Some(TokenKind::Minus) => UnaryOp::Neg,
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Bang) => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };

        let start = self.current_span();
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        while self.eat(&TokenKind::LBracket) {
            let index = self.parse_expr()?;
            let end = self.expect(&TokenKind::RBracket)?;
            let span = expr.span.merge(end);
            expr = Expr::new(
                ExprKind::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                },
                span,
            );
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn literal(kind: LiteralKind, text: impl Into<SmolStr>, span: Span) -> Expr {
        Expr::new(
            ExprKind::Literal(Literal {
                kind,
                text: text.into(),
            }),
            span,
        )
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        let Some(kind) = self.current_kind().cloned() else {
            return Err(self.unexpected("expression"));
        };

        match kind {
            TokenKind::Integer(text) => {
                self.advance();
                Ok(Self::literal(LiteralKind::Int, text, span))
            }
            TokenKind::Float(text) => {
                self.advance();
                Ok(Self::literal(LiteralKind::Float, text, span))
            }
            TokenKind::String(raw) => {
                let text = unescape(&raw, span.start).map_err(|error| ParseError::Lex { error, span })?;
                self.advance();
                Ok(Self::literal(LiteralKind::String, text, span))
            }
            TokenKind::Char(raw) => {
                let text = unescape(&raw, span.start).map_err(|error| ParseError::Lex { error, span })?;
                self.advance();
                Ok(Self::literal(LiteralKind::Char, text, span))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Self::literal(LiteralKind::Bool, kind.to_string(), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Self::literal(LiteralKind::Null, "null", span))
            }
            TokenKind::Identifier(name) => {
                let ident = Spanned::new(name.clone(), span);
                self.advance();

                if self.check(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    let span = span.merge(self.previous_span());
                    return Ok(Expr::new(ExprKind::Call { callee: ident, args }, span));
                }

                if self.check(&TokenKind::Dot) {
                    self.advance();
                    let function = self.expect_member_name()?;
                    let args = self.parse_args()?;
                    let span = span.merge(self.previous_span());
                    return Ok(Expr::new(
                        ExprKind::ModuleCall {
                            module: ident,
                            function,
                            args,
                        },
                        span,
                    ));
                }

                Ok(Expr::new(ExprKind::Ident(name), span))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(&TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::Array(elements), span.merge(end)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.expect(&TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::Paren(Box::new(inner)), span.merge(end)))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

/// Parse source code into an AST, collecting every error
pub fn parse(source: &str) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    (program, parser.into_errors())
}

/// Parse an already lexed token stream
pub fn parse_tokens(source: &str, tokens: Vec<Token>) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::from_tokens(source, tokens);
    let program = parser.parse_program();
    (program, parser.into_errors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        program
    }

    fn single_expr(source: &str) -> Expr {
        let program = parse_ok(source);
        match program.stmts.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_var_decl_with_and_without_init() {
        let program = parse_ok("var x int; var y float = 3;");
        assert_eq!(program.stmts.len(), 2);

        match &program.stmts[0].kind {
            StmtKind::VarDecl { name, ty, init } => {
                assert_eq!(name.node, "x");
                assert_eq!(ty.node, TypeExpr::Int);
                assert!(init.is_none());
            }
            other => panic!("expected var decl, got {:?}", other),
        }

        match &program.stmts[1].kind {
            StmtKind::VarDecl { ty, init: Some(init), .. } => {
                assert_eq!(ty.node, TypeExpr::Float);
                assert!(matches!(&init.kind, ExprKind::Literal(l) if l.text == "3"));
            }
            other => panic!("expected initialised var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_array_type() {
        let program = parse_ok("var xs []int = [1, 2]");
        match &program.stmts[0].kind {
            StmtKind::VarDecl { ty, .. } => {
                assert_eq!(ty.node, TypeExpr::Array(Box::new(TypeExpr::Int)));
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = single_expr("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_divide_and_operator_span() {
        let expr = single_expr("7 // 2");
        match expr.kind {
            ExprKind::Binary { op, op_span, .. } => {
                assert_eq!(op, BinaryOp::ExactDiv);
                assert_eq!(op_span, Span::new(2, 4));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_and_paren() {
        let expr = single_expr("-(1 + 2)");
        match expr.kind {
            ExprKind::Unary { op, operand } => {
                assert_eq!(op, UnaryOp::Neg);
                assert!(matches!(operand.kind, ExprKind::Paren(_)));
            }
            other => panic!("expected unary, got {:?}", other),
        }
    }

    #[test]
    fn test_statements() {
        let program = parse_ok(
            r#"
            x = 4
            x++
            x--;
            print(x)
            println("done")
            type(x)
            "#,
        );
        let kinds: Vec<_> = program.stmts.iter().map(|s| &s.kind).collect();
        assert!(matches!(kinds[0], StmtKind::Assign { .. }));
        assert!(matches!(kinds[1], StmtKind::Increment(n) if n.node == "x"));
        assert!(matches!(kinds[2], StmtKind::Decrement(_)));
        assert!(matches!(kinds[3], StmtKind::Print { newline: false, .. }));
        assert!(matches!(kinds[4], StmtKind::Print { newline: true, .. }));
        assert!(matches!(kinds[5], StmtKind::TypeOf(_)));
    }

    #[test]
    fn test_function_declaration() {
        let program = parse_ok(
            r#"
            function add(a: int, b: int) int {
                return a + b
            }
            function greet() {
                println("hi")
            }
            "#,
        );

        match &program.stmts[0].kind {
            StmtKind::Function(decl) => {
                assert_eq!(decl.name.node, "add");
                assert_eq!(decl.params.len(), 2);
                assert_eq!(decl.params[1].ty, TypeExpr::Int);
                assert_eq!(decl.return_type, Some(TypeExpr::Int));
                assert!(matches!(decl.body[0].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("expected function, got {:?}", other),
        }

        match &program.stmts[1].kind {
            StmtKind::Function(decl) => assert_eq!(decl.return_type, None),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_import_and_module_call() {
        let program = parse_ok(
            r#"import "console"
            console.println(1, "a")"#,
        );

        match &program.stmts[0].kind {
            StmtKind::Import(decl) => {
                assert_eq!(decl.path.node, "console");
                assert_eq!(decl.keyword, Span::new(0, 6));
            }
            other => panic!("expected import, got {:?}", other),
        }

        match &program.stmts[1].kind {
            StmtKind::Expr(Expr {
                kind: ExprKind::ModuleCall { module, function, args },
                ..
            }) => {
                assert_eq!(module.node, "console");
                assert_eq!(function.node, "println");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected module call, got {:?}", other),
        }
    }

    #[test]
    fn test_keyword_names_after_module_dot() {
        let program = parse_ok("console.print(1)\nconsole.println()\nlib.type(2)");
        let names: Vec<_> = program
            .stmts
            .iter()
            .map(|stmt| match &stmt.kind {
                StmtKind::Expr(Expr {
                    kind: ExprKind::ModuleCall { function, .. },
                    ..
                }) => function.node.to_string(),
                other => panic!("expected module call, got {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["print", "println", "type"]);

        match &program.stmts[0].kind {
            StmtKind::Expr(Expr {
                kind: ExprKind::ModuleCall { function, .. },
                ..
            }) => assert_eq!(function.span, Span::new(8, 13)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_string_and_char_literals_are_unescaped() {
        let expr = single_expr(r#""a\nb""#);
        assert!(matches!(&expr.kind, ExprKind::Literal(l) if l.text == "a\nb" && l.kind == LiteralKind::String));

        let expr = single_expr(r"'\t'");
        assert!(matches!(&expr.kind, ExprKind::Literal(l) if l.text == "\t" && l.kind == LiteralKind::Char));
    }

    #[test]
    fn test_index_expression() {
        let expr = single_expr("xs[1][0]");
        match expr.kind {
            ExprKind::Index { object, .. } => {
                assert!(matches!(object.kind, ExprKind::Index { .. }));
            }
            other => panic!("expected index, got {:?}", other),
        }
    }

    #[test]
    fn test_error_recovery_collects_all_errors() {
        let (program, errors) = parse("var x = 1; var y int = 2; var z widget;");
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[1], ParseError::UnknownType { ref name, .. } if name == "widget"));
        assert!(program
            .stmts
            .iter()
            .any(|s| matches!(&s.kind, StmtKind::VarDecl { name, .. } if name.node == "y")));
    }

    #[test]
    fn test_lexer_errors_are_reported() {
        let (_, errors) = parse("var x int = 1 @");
        assert!(matches!(errors[0], ParseError::Lex { .. }));
        assert_eq!(errors[0].span(), Span::new(14, 15));
    }

    #[test]
    fn test_unclosed_block_is_an_error() {
        let (_, errors) = parse("function f() { print(1)");
        assert!(!errors.is_empty());
    }
}
