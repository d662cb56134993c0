//! Quill Language Lexer
//!
//! Tokenizes Quill source text into an ordered stream of `(kind, text, span)` tokens.
//! Token kinds are declared with `logos`; comments survive `tokenize` and are dropped by `tokenize_filtered`.

use logos::Logos;
use smol_str::SmolStr;
use std::fmt;
use std::ops::Range;

/// Source span representing a byte range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// One lexeme and where it sits in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All token types in the Quill language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    // ========== Keywords ==========
    #[token("var")]
    Var,
    #[token("function")]
    Function,
    #[token("return")]
    Return,
    #[token("import")]
    Import,
    #[token("print")]
    Print,
    #[token("println")]
    Println,
    #[token("type")]
    Type,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // ========== Operators ==========
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("=")]
    Eq,

    // ========== Delimiters ==========
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // ========== Literals ==========
    /// Integer literal
    #[regex(r"[0-9]+", |lex| SmolStr::new(lex.slice()))]
    Integer(SmolStr),

    /// Float literal
    #[regex(r"[0-9]+\.[0-9]+", |lex| SmolStr::new(lex.slice()))]
    Float(SmolStr),

    /// String literal (double quotes, raw slice including the quotes)
    #[regex(r#""(?:[^"\\]|\\.)*""#, |lex| SmolStr::new(lex.slice()))]
    String(SmolStr),

    /// Character literal (single quotes, raw slice including the quotes)
    #[regex(r"'(?:[^'\\]|\\.)'", |lex| SmolStr::new(lex.slice()))]
    Char(SmolStr),

    // ========== Identifiers ==========
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Identifier(SmolStr),

    // ========== Comments ==========
    #[regex(r"#[^\n]*", |lex| SmolStr::new(lex.slice()))]
    LineComment(SmolStr),

    // ========== Error ==========
    /// Anything logos could not match
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Var => write!(f, "var"),
            TokenKind::Function => write!(f, "function"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Import => write!(f, "import"),
            TokenKind::Print => write!(f, "print"),
            TokenKind::Println => write!(f, "println"),
            TokenKind::Type => write!(f, "type"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::SlashSlash => write!(f, "//"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::PlusPlus => write!(f, "++"),
            TokenKind::MinusMinus => write!(f, "--"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::BangEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::AmpAmp => write!(f, "&&"),
            TokenKind::PipePipe => write!(f, "||"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Integer(s) => write!(f, "integer {}", s),
            TokenKind::Float(s) => write!(f, "float {}", s),
            TokenKind::String(s) => write!(f, "string {}", s),
            TokenKind::Char(s) => write!(f, "char {}", s),
            TokenKind::Identifier(s) => write!(f, "identifier {}", s),
            TokenKind::LineComment(_) => write!(f, "comment"),
            TokenKind::Error => write!(f, "error"),
        }
    }
}

impl TokenKind {
    /// Reserved words of the language
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::Function
                | TokenKind::Return
                | TokenKind::Import
                | TokenKind::Print
                | TokenKind::Println
                | TokenKind::Type
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::LineComment(_))
    }

    /// The literal text carried by this token, if any
    pub fn text(&self) -> Option<&SmolStr> {
        match self {
            TokenKind::Integer(s)
            | TokenKind::Float(s)
            | TokenKind::String(s)
            | TokenKind::Char(s)
            | TokenKind::Identifier(s)
            | TokenKind::LineComment(s) => Some(s),
            _ => None,
        }
    }
}

/// Failures found while scanning, positioned by byte offset
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexerError {
    #[error("Unexpected character '{1}' at position {0}")]
    UnexpectedCharacter(usize, char),

    #[error("Invalid escape sequence '\\{1}' at position {0}")]
    InvalidEscape(usize, char),
}

/// Whether `text` is exactly one identifier token (keywords are not).
pub fn is_identifier(text: &str) -> bool {
    let (tokens, errors) = Lexer::new(text).tokenize();
    errors.is_empty()
        && matches!(
            tokens.as_slice(),
            [Token { kind: TokenKind::Identifier(_), span }] if span.start == 0 && span.end == text.len()
        )
}

/// Resolve the escape sequences of a quoted string or char literal.
///
/// `raw` is the token slice including its surrounding quotes and `offset` is the
/// byte position of the token, used to locate a bad escape.
pub fn unescape(raw: &str, offset: usize) -> Result<String, LexerError> {
    let body = raw
        .get(1..raw.len().saturating_sub(1))
        .unwrap_or_default();
    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices();

    while let Some((_, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, 'n')) => out.push('\n'),
            Some((_, 't')) => out.push('\t'),
            Some((_, 'r')) => out.push('\r'),
            Some((_, '0')) => out.push('\0'),
            Some((_, '\\')) => out.push('\\'),
            Some((_, '"')) => out.push('"'),
            Some((_, '\'')) => out.push('\''),
            Some((idx, other)) => return Err(LexerError::InvalidEscape(offset + 1 + idx, other)),
            None => return Err(LexerError::InvalidEscape(offset + raw.len(), '\\')),
        }
    }

    Ok(out)
}

/// Lexer for Quill source code
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Lexer over `source`; nothing is scanned until `tokenize`
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
        }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Every token in order, comments included, plus any scanning errors
    pub fn tokenize(self) -> (Vec<Token>, Vec<LexerError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for (result, span) in self.inner.spanned() {
            match result {
                Ok(kind) => tokens.push(Token::new(kind, Span::from(span))),
                Err(_) => {
                    let bad_char = self.source[span.clone()].chars().next().unwrap_or('?');
                    errors.push(LexerError::UnexpectedCharacter(span.start, bad_char));
                    tokens.push(Token::new(TokenKind::Error, Span::from(span)));
                }
            }
        }

        (tokens, errors)
    }

    /// Tokenize, dropping comments
    pub fn tokenize_filtered(self) -> (Vec<Token>, Vec<LexerError>) {
        let (tokens, errors) = self.tokenize();
        let filtered: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !t.kind.is_comment())
            .collect();
        (filtered, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(source).tokenize_filtered();
        assert!(errors.is_empty(), "unexpected lexer errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = kinds("var function return import print println type true false null");
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[0], TokenKind::Var);
        assert_eq!(tokens[5], TokenKind::Println);
        assert_eq!(tokens[9], TokenKind::Null);
        assert!(tokens.iter().all(TokenKind::is_keyword));
    }

    #[test]
    fn test_type_names_are_identifiers() {
        let tokens = kinds("int float string char bool any");
        assert!(matches!(&tokens[0], TokenKind::Identifier(s) if s == "int"));
        assert!(matches!(&tokens[5], TokenKind::Identifier(s) if s == "any"));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("+ - * / // % ++ -- == != < <= > >= && || ^ ! =");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::SlashSlash,
                TokenKind::Percent,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Caret,
                TokenKind::Bang,
                TokenKind::Eq,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("42 3.14 0");
        assert!(matches!(&tokens[0], TokenKind::Integer(s) if s == "42"));
        assert!(matches!(&tokens[1], TokenKind::Float(s) if s == "3.14"));
        assert!(matches!(&tokens[2], TokenKind::Integer(s) if s == "0"));
    }

    #[test]
    fn test_strings_and_chars() {
        let tokens = kinds(r#""hello \"world\"" 'a' '\n'"#);
        assert!(matches!(&tokens[0], TokenKind::String(s) if s == r#""hello \"world\"""#));
        assert!(matches!(&tokens[1], TokenKind::Char(s) if s == "'a'"));
        assert!(matches!(&tokens[2], TokenKind::Char(s) if s == r"'\n'"));
    }

    #[test]
    fn test_comments_are_filtered() {
        let (tokens, _) = Lexer::new("# a comment\nvar x int").tokenize();
        assert!(matches!(&tokens[0].kind, TokenKind::LineComment(_)));

        let filtered = kinds("# a comment\nvar x int");
        assert_eq!(filtered[0], TokenKind::Var);
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_module_call_tokens() {
        let tokens = kinds("console.println(x);");
        assert!(matches!(&tokens[0], TokenKind::Identifier(s) if s == "console"));
        assert_eq!(tokens[1], TokenKind::Dot);
        assert_eq!(tokens[3], TokenKind::LParen);
        assert_eq!(tokens[6], TokenKind::Semicolon);
    }

    #[test]
    fn test_unknown_character_is_reported() {
        let (tokens, errors) = Lexer::new("var @ x").tokenize();
        assert_eq!(errors, vec![LexerError::UnexpectedCharacter(4, '@')]);
        assert_eq!(tokens[1].kind, TokenKind::Error);
    }

    #[test]
    fn test_spans_cover_lexemes() {
        let (tokens, _) = Lexer::new("var  count").tokenize();
        assert_eq!(tokens[0].span, Span::new(0, 3));
        assert_eq!(tokens[1].span, Span::new(5, 10));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""a\tb\n""#, 0).unwrap(), "a\tb\n");
        assert_eq!(unescape("'x'", 0).unwrap(), "x");
        assert_eq!(
            unescape(r#""bad \q""#, 10),
            Err(LexerError::InvalidEscape(16, 'q'))
        );
    }

    #[test]
    fn test_span_merge() {
        let merged = Span::new(4, 8).merge(Span::new(1, 5));
        assert_eq!(merged, Span::new(1, 8));
        assert!(Span::dummy().is_dummy());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("math"));
        assert!(is_identifier("_util2"));
        assert!(!is_identifier("my-lib"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("print"));
        assert!(!is_identifier(""));
    }
}
