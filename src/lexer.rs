use crate::error::{Error, ErrorType, Result};
use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenType {
    #[regex("[ \t\n\r]+")]
    Whitespace,
    #[regex("//[^\n]*")]
    Comment,

    #[token("fn")]
    Fn,
    #[token("int")]
    Int,
    #[token("float")]
    Float,

    #[token("const")]
    Const,
    #[token("assign")]
    Assign,
    #[token("add")]
    Add,
    #[token("sub")]
    Sub,
    #[token("mul")]
    Mul,
    #[token("div")]
    Div,
    #[token("jump")]
    Jump,
    #[token("jump_if")]
    JumpIf,
    #[token("call")]
    Call,
    #[token("return")]
    Return,
    #[token("push")]
    Push,
    #[token("pop")]
    Pop,

    #[regex("v[0-9]+", priority = 3)]
    Variable,
    #[regex("L[0-9]+", priority = 3)]
    Label,

    #[regex("-?[0-9]+")]
    IntegerLiteral,
    #[regex("-?[0-9]+\\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex("-?[0-9]+[eE][+-]?[0-9]+")]
    FloatLiteral,

    #[regex("[a-zA-Z_][_0-9a-zA-Z]*")]
    Identifier,

    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn expand(&self, other: &Self) -> Self {
        SourceRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<Range<usize>> for SourceRange {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

impl From<SourceRange> for Range<usize> {
    fn from(range: SourceRange) -> Self {
        range.start..range.end
    }
}

#[derive(Debug)]
pub struct Token<'a> {
    pub token_type: TokenType,
    pub value: &'a str,
    pub range: SourceRange,
}

impl<'a> Token<'a> {
    pub fn new(token_type: TokenType, value: &'a str, range: SourceRange) -> Self {
        Self {
            token_type,
            value,
            range,
        }
    }
}

impl<'a> PartialEq for Token<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.token_type == other.token_type && self.range == other.range
    }
}

impl<'a> PartialEq<TokenType> for &Token<'a> {
    fn eq(&self, other: &TokenType) -> bool {
        self.token_type == *other
    }
}

pub fn lex(input: &str) -> Result<Vec<Token>> {
    let mut lex = TokenType::lexer(input);

    let mut tokens = vec![];

    while let Some(token_type) = lex.next() {
        match token_type {
            Err(_) => {
                return Err(Error::new_with_range(
                    ErrorType::Lexer,
                    "Unknown character".to_string(),
                    lex.span().into(),
                ))
            }
            Ok(TokenType::Whitespace) | Ok(TokenType::Comment) => continue,
            Ok(token_type) => tokens.push(Token::new(token_type, lex.slice(), lex.span().into())),
        }
    }

    Ok(tokens)
}
