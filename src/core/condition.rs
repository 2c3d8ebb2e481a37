//! Step condition expressions
//!
//! A small, explicitly parsed language for gating steps:
//!
//! ```text
//! expr       := or
//! or         := and (("||" | "or") and)*
//! and        := comparison (("&&" | "and") comparison)*
//! comparison := unary (("==" | "===" | "!=" | "!==" | "<" | "<=" | ">" | ">=") unary)?
//! unary      := ("!" | "not") unary | primary
//! primary    := literal | path | "(" expr ")"
//! path       := ("inputs" | "results" | "state") ("." segment | "[" (number | string) "]")*
//! literal    := number | 'string' | "string" | true | false | null | undefined
//! ```
//!
//! Conditions are parsed once and evaluated against a [`SharedContext`]
//! without any dynamic code generation.

use crate::core::{context::SharedContext, error::ConditionError};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

const ROOTS: [&str; 3] = ["inputs", "results", "state"];

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Not,
    And,
    Or,
    Op(CompareOp),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`: like `===`, but null and undefined are equal
    LooseEq,
    /// `===`
    StrictEq,
    LooseNe,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::LooseEq => "==",
            CompareOp::StrictEq => "===",
            CompareOp::LooseNe => "!=",
            CompareOp::StrictNe => "!==",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `None` is `undefined`
    Literal(Option<Value>),
    /// Root followed by segments, e.g. `["results", "a", "ok"]`
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// A compiled step condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parse a condition expression
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = Tokenizer::new(source).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        parser.expect_eof()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against the context; the result is the truthiness of the expression
    pub fn evaluate(&self, ctx: &SharedContext) -> bool {
        truthy(eval(&self.expr, ctx).as_ref())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

struct Tokenizer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// The previous token was a `.`, so the next one is a property name
    after_dot: bool,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            after_dot: false,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ConditionError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.input.len())
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    /// Consume `c` if it is next
    fn eat(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Result<Token, ConditionError> {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }

        let pos = self.pos();
        let Some(c) = self.peek_char() else {
            return Ok(Token { kind: TokenKind::Eof, pos });
        };

        if std::mem::take(&mut self.after_dot) && is_segment_char(c) {
            return Ok(Token {
                kind: TokenKind::Ident(self.read_segment()),
                pos,
            });
        }

        let kind = match c {
            '(' | ')' | '[' | ']' | '.' => {
                self.advance();
                match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    _ => {
                        self.after_dot = true;
                        TokenKind::Dot
                    }
                }
            }
            '=' => {
                self.advance();
                if !self.eat('=') {
                    return Err(parse_error("assignment is not supported, use '=='", pos));
                }
                if self.eat('=') {
                    TokenKind::Op(CompareOp::StrictEq)
                } else {
                    TokenKind::Op(CompareOp::LooseEq)
                }
            }
            '!' => {
                self.advance();
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::Op(CompareOp::StrictNe)
                    } else {
                        TokenKind::Op(CompareOp::LooseNe)
                    }
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                self.advance();
                if self.eat('=') {
                    TokenKind::Op(CompareOp::Le)
                } else {
                    TokenKind::Op(CompareOp::Lt)
                }
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    TokenKind::Op(CompareOp::Ge)
                } else {
                    TokenKind::Op(CompareOp::Gt)
                }
            }
            '&' | '|' => {
                self.advance();
                if !self.eat(c) {
                    return Err(parse_error(format!("expected '{}{}'", c, c), pos));
                }
                if c == '&' {
                    TokenKind::And
                } else {
                    TokenKind::Or
                }
            }
            '\'' | '"' => self.read_string(c, pos)?,
            c if c.is_ascii_digit() || c == '-' => self.read_number(pos)?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.read_ident(),
            other => return Err(parse_error(format!("unexpected character '{}'", other), pos)),
        };

        Ok(Token { kind, pos })
    }

    fn read_string(&mut self, quote: char, start: usize) -> Result<TokenKind, ConditionError> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(parse_error("unterminated string", start)),
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => return Err(parse_error("unterminated string", start)),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn read_number(&mut self, start: usize) -> Result<TokenKind, ConditionError> {
        let mut text = String::new();
        if self.eat('-') {
            text.push('-');
        }
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' && !text.contains('.') && self.digit_follows_dot() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| parse_error(format!("invalid number '{}'", text), start))
    }

    /// True if the next char is '.' and the one after it is a digit
    fn digit_follows_dot(&self) -> bool {
        let mut ahead = self.chars.clone();
        matches!(ahead.next(), Some((_, '.'))) && ahead.next().is_some_and(|(_, c)| c.is_ascii_digit())
    }

    /// A property name after `.`; may start with a digit or hold `-` and `:`
    fn read_segment(&mut self) -> String {
        let mut segment = String::new();
        while let Some(c) = self.peek_char().filter(|&c| is_segment_char(c)) {
            segment.push(c);
            self.advance();
        }
        segment
    }

    fn read_ident(&mut self) -> TokenKind {
        let mut ident = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '$' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match ident.as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Ident(ident),
        }
    }
}

fn is_segment_char(c: char) -> bool {
    !c.is_whitespace() && !".[]()=!<>&|'\"".contains(c)
}

fn parse_error(message: impl Into<String>, position: usize) -> ConditionError {
    ConditionError::Parse {
        message: message.into(),
        position,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The tokenizer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect_eof(&mut self) -> Result<(), ConditionError> {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => Ok(()),
            _ => Err(parse_error("unexpected trailing input", token.pos)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek().kind == TokenKind::Or {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_comparison()?;
        while self.peek().kind == TokenKind::And {
            self.next();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let left = self.parse_unary()?;
        if let TokenKind::Op(op) = self.peek().kind {
            self.next();
            let right = self.parse_unary()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek().kind == TokenKind::Not {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        let token = self.next();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Some(number(n)))),
            TokenKind::Str(s) => Ok(Expr::Literal(Some(Value::String(s)))),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                let close = self.next();
                if close.kind != TokenKind::RParen {
                    return Err(parse_error("expected ')'", close.pos));
                }
                Ok(inner)
            }
            TokenKind::Ident(ident) => {
                let literal = match ident.as_str() {
                    "true" => Some(Some(Value::Bool(true))),
                    "false" => Some(Some(Value::Bool(false))),
                    "null" => Some(Some(Value::Null)),
                    "undefined" => Some(None),
                    _ => None,
                };
                if let Some(value) = literal {
                    return Ok(Expr::Literal(value));
                }
                if ROOTS.contains(&ident.as_str()) {
                    self.parse_path(ident)
                } else {
                    Err(ConditionError::UnknownRoot(ident))
                }
            }
            TokenKind::Eof => Err(parse_error("unexpected end of expression", token.pos)),
            other => Err(parse_error(format!("unexpected token {:?}", other), token.pos)),
        }
    }

    fn parse_path(&mut self, root: String) -> Result<Expr, ConditionError> {
        let mut segments = vec![root];
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.next();
                    let token = self.next();
                    match token.kind {
                        TokenKind::Ident(name) => segments.push(name),
                        TokenKind::Number(n) if n >= 0.0 && n.fract() == 0.0 => {
                            segments.push((n as u64).to_string())
                        }
                        _ => return Err(parse_error("expected property name after '.'", token.pos)),
                    }
                }
                TokenKind::LBracket => {
                    self.next();
                    let token = self.next();
                    match token.kind {
                        TokenKind::Str(key) => segments.push(key),
                        TokenKind::Number(n) if n >= 0.0 && n.fract() == 0.0 => {
                            segments.push((n as u64).to_string())
                        }
                        _ => return Err(parse_error("expected index or key", token.pos)),
                    }
                    let close = self.next();
                    if close.kind != TokenKind::RBracket {
                        return Err(parse_error("expected ']'", close.pos));
                    }
                }
                _ => return Ok(Expr::Path(segments)),
            }
        }
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn eval(expr: &Expr, ctx: &SharedContext) -> Option<Value> {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(segments) => ctx.resolve_segments(segments).cloned(),
        Expr::Not(inner) => Some(Value::Bool(!truthy(eval(inner, ctx).as_ref()))),
        Expr::And(left, right) => Some(Value::Bool(
            truthy(eval(left, ctx).as_ref()) && truthy(eval(right, ctx).as_ref()),
        )),
        Expr::Or(left, right) => Some(Value::Bool(
            truthy(eval(left, ctx).as_ref()) || truthy(eval(right, ctx).as_ref()),
        )),
        Expr::Compare { op, left, right } => {
            let l = eval(left, ctx);
            let r = eval(right, ctx);
            Some(Value::Bool(compare(*op, l.as_ref(), r.as_ref())))
        }
    }
}

fn compare(op: CompareOp, left: Option<&Value>, right: Option<&Value>) -> bool {
    match op {
        CompareOp::StrictEq => strict_eq(left, right),
        CompareOp::StrictNe => !strict_eq(left, right),
        CompareOp::LooseEq => loose_eq(left, right),
        CompareOp::LooseNe => !loose_eq(left, right),
        CompareOp::Lt => order(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(order(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => order(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(order(left, right), Some(Ordering::Greater | Ordering::Equal)),
    }
}

fn strict_eq(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn loose_eq(left: Option<&Value>, right: Option<&Value>) -> bool {
    let nullish = |v: Option<&Value>| v.map_or(true, Value::is_null);
    if nullish(left) || nullish(right) {
        return nullish(left) && nullish(right);
    }
    strict_eq(left, right)
}

fn order(left: Option<&Value>, right: Option<&Value>) -> Option<Ordering> {
    match (left?, right?) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// JavaScript-style truthiness; `None` is undefined
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
