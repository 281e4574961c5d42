//! # Boolean expression interpreter for `if(...)` modifiers.
//!
//! A deliberately small DSL: literals, identifiers, `==`/`!=`, `!`,
//! `&&`/`||`, parentheses and function application over a fixed
//! environment. The environment is asynchronous because the predicates it
//! exposes (`group_exists`, `group_compatible`) query registries.
//!
//! ```text
//! or       := and ("||" and)*
//! and      := equality ("&&" equality)*
//! equality := unary (("==" | "!=") unary)?
//! unary    := "!" unary | primary
//! primary  := literal | ident | ident "(" args ")" | "(" or ")"
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::AgentError;
use crate::model::sdk::SdkConnectionConfig;

/// Runtime values of the DSL.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Str(String),
    Num(f64),
    Config(Arc<SdkConnectionConfig>),
    Null,
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Config(_) => "config",
            Value::Null => "null",
        }
    }

    fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Bool(bool),
    Str(String),
    Num(f64),
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// Name resolution and predicate dispatch for one evaluation.
#[async_trait]
pub trait ExprEnv: Send + Sync {
    /// Resolves an identifier; unknown names read as [`Value::Null`].
    fn lookup(&self, name: &str) -> Value;

    /// Invokes a named predicate.
    async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, AgentError>;
}

// ---- Tokenizer ----

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    Not,
    And,
    Or,
    Eq,
    Ne,
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Token>, AgentError> {
    let err = |msg: String| AgentError::ManifestParse(msg);
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err(err("expected '&&'".into()));
                }
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err(err("expected '||'".into()));
                }
                tokens.push(Token::Or);
            }
            '=' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(err("expected '=='".into()));
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => s.push(c),
                        None => return Err(err("unterminated string literal".into())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n: f64 = s.parse().map_err(|_| err(format!("bad number literal '{s}'")))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match s.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(s),
                });
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

// ---- Parser ----

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> Result<(), AgentError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(AgentError::ManifestParse(format!(
                "expected {tok:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, AgentError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, AgentError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, AgentError> {
        let left = self.parse_unary()?;
        if self.eat(&Token::Eq) {
            let right = self.parse_unary()?;
            return Ok(Expr::Eq(Box::new(left), Box::new(right)));
        }
        if self.eat(&Token::Ne) {
            let right = self.parse_unary()?;
            return Ok(Expr::Ne(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, AgentError> {
        if self.eat(&Token::Not) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, AgentError> {
        match self.next() {
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            self.expect(Token::Comma)?;
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(AgentError::ManifestParse(format!(
                "unexpected token {other:?} in expression"
            ))),
        }
    }
}

/// Parses an expression source into its tree.
pub fn parse(src: &str) -> Result<Expr, AgentError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(AgentError::ManifestParse("empty expression".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(AgentError::ManifestParse(format!(
            "trailing tokens after expression: {:?}",
            parser.tokens[parser.pos..].to_vec()
        )));
    }
    Ok(expr)
}

/// Static check that an expression only uses the given identifiers and
/// functions (with matching arity).
pub fn validate(expr: &Expr, idents: &[&str], funcs: &[(&str, usize)]) -> Result<(), AgentError> {
    match expr {
        Expr::Bool(_) | Expr::Str(_) | Expr::Num(_) => Ok(()),
        Expr::Ident(name) => {
            if idents.contains(&name.as_str()) {
                Ok(())
            } else {
                Err(AgentError::ManifestParse(format!("unknown identifier '{name}'")))
            }
        }
        Expr::Not(inner) => validate(inner, idents, funcs),
        Expr::And(a, b) | Expr::Or(a, b) | Expr::Eq(a, b) | Expr::Ne(a, b) => {
            validate(a, idents, funcs)?;
            validate(b, idents, funcs)
        }
        Expr::Call(name, args) => {
            let Some((_, arity)) = funcs.iter().find(|(n, _)| n == name) else {
                return Err(AgentError::ManifestParse(format!("unknown function '{name}'")));
            };
            if args.len() != *arity {
                return Err(AgentError::ManifestParse(format!(
                    "function '{name}' takes {arity} argument(s), got {}",
                    args.len()
                )));
            }
            for arg in args {
                validate(arg, idents, funcs)?;
            }
            Ok(())
        }
    }
}

fn expect_bool(value: Value, what: &str) -> Result<bool, AgentError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(AgentError::ManifestParse(format!(
            "{what} must be a bool, got {}",
            other.type_name()
        ))),
    }
}

/// Evaluates an expression against an environment. `&&` and `||`
/// short-circuit, so predicates on the untaken side never run.
pub fn eval<'a>(expr: &'a Expr, env: &'a dyn ExprEnv) -> BoxFuture<'a, Result<Value, AgentError>> {
    Box::pin(async move {
        match expr {
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Ident(name) => Ok(env.lookup(name)),
            Expr::Not(inner) => {
                let v = expect_bool(eval(inner, env).await?, "operand of '!'")?;
                Ok(Value::Bool(!v))
            }
            Expr::And(a, b) => {
                if !expect_bool(eval(a, env).await?, "operand of '&&'")? {
                    return Ok(Value::Bool(false));
                }
                let right = expect_bool(eval(b, env).await?, "operand of '&&'")?;
                Ok(Value::Bool(right))
            }
            Expr::Or(a, b) => {
                if expect_bool(eval(a, env).await?, "operand of '||'")? {
                    return Ok(Value::Bool(true));
                }
                let right = expect_bool(eval(b, env).await?, "operand of '||'")?;
                Ok(Value::Bool(right))
            }
            Expr::Eq(a, b) => {
                let (a, b) = (eval(a, env).await?, eval(b, env).await?);
                Ok(Value::Bool(a.loose_eq(&b)))
            }
            Expr::Ne(a, b) => {
                let (a, b) = (eval(a, env).await?, eval(b, env).await?);
                Ok(Value::Bool(!a.loose_eq(&b)))
            }
            Expr::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(eval(arg, env).await?);
                }
                env.call(name, values).await
            }
        }
    })
}
