//! Closed expression language for parametric formulas
//!
//! Expressions are arithmetic over named variables, comparisons, and the
//! `if(cond, then, else)` / `min` / `max` functions. The grammar is closed
//! and non-recursive at runtime, so every expression terminates and can be
//! audited from its source text.
//!
//! Parsing validates everything that can be validated statically: syntax,
//! that every variable is declared, function arity, and operand types. The
//! only error left for evaluation time is division by zero.

use rust_decimal::Decimal;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("Expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{name}' takes {expected} arguments, got {got}")]
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Variable '{0}' was not bound at evaluation")]
    UnboundVariable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(Decimal),
    Variable(String),
    Unary(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    If(Box<Node>, Box<Node>, Box<Node>),
    Min(Box<Node>, Box<Node>),
    Max(Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Type {
    Number,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Number(Decimal),
    Bool(bool),
}

/// A parsed, validated formula expression.
///
/// Equality and serialization go through the source text; the AST is
/// rebuilt on deserialization so a stored expression is re-validated when
/// loaded.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    variables: Vec<String>,
    root: Node,
}

impl Expression {
    /// Parses and validates `source` against the declared variable set.
    pub fn parse(source: &str, variables: &[String]) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(ExprError::UnexpectedToken(format!(
                "{:?}",
                parser.tokens[parser.pos]
            )));
        }
        check_variables(&root, variables)?;
        let ty = infer(&root)?;
        if ty != Type::Number {
            return Err(ExprError::TypeMismatch(
                "expression must produce a number".to_string(),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            variables: variables.to_vec(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluates against concrete bindings. Every declared variable must be
    /// bound; extra bindings are ignored.
    pub fn evaluate(&self, bindings: &HashMap<String, Decimal>) -> Result<Decimal, ExprError> {
        match eval(&self.root, bindings)? {
            Value::Number(n) => Ok(n),
            // infer() guarantees a numeric root
            Value::Bool(_) => Err(ExprError::TypeMismatch(
                "expression produced a boolean".to_string(),
            )),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.variables == other.variables
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            source: &'a str,
            variables: &'a [String],
        }
        Repr {
            source: &self.source,
            variables: &self.variables,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Repr {
            source: String,
            variables: Vec<String>,
        }
        let repr = Repr::deserialize(deserializer)?;
        Expression::parse(&repr.source, &repr.variables).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(ExprError::UnexpectedChar('=', i));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err(ExprError::UnexpectedChar('!', i));
                }
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value =
                    Decimal::from_str(&text).map_err(|_| ExprError::InvalidNumber(text))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ExprError::UnexpectedChar(other, i)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken(format!("{token:?}")))
        }
    }

    // expr := additive ( cmp-op additive )?
    fn parse_expr(&mut self) -> Result<Node, ExprError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Lt) => Some(BinOp::Lt),
            Some(Token::Le) => Some(BinOp::Le),
            Some(Token::Gt) => Some(BinOp::Gt),
            Some(Token::Ge) => Some(BinOp::Ge),
            Some(Token::EqEq) => Some(BinOp::Eq),
            Some(Token::Ne) => Some(BinOp::Ne),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let right = self.parse_additive()?;
                Ok(Node::Binary(op, Box::new(left), Box::new(right)))
            }
            None => Ok(left),
        }
    }

    fn parse_additive(&mut self) -> Result<Node, ExprError> {
        let mut node = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            node = Node::Binary(op, Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<Node, ExprError> {
        let mut node = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            node = Node::Binary(op, Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Node::Unary(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        match self.next()? {
            Token::Number(n) => Ok(Node::Number(n)),
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    build_call(&name, args)
                } else {
                    Ok(Node::Variable(name))
                }
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExprError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Node>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.next()? {
                Token::Comma => continue,
                Token::RParen => break,
                other => return Err(ExprError::UnexpectedToken(format!("{other:?}"))),
            }
        }
        Ok(args)
    }
}

fn build_call(name: &str, mut args: Vec<Node>) -> Result<Node, ExprError> {
    let arity = |expected: usize, args: &Vec<Node>| -> Result<(), ExprError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ExprError::WrongArity {
                name: name.to_string(),
                expected,
                got: args.len(),
            })
        }
    };
    match name {
        "if" => {
            arity(3, &args)?;
            let otherwise = args.pop().unwrap();
            let then = args.pop().unwrap();
            let cond = args.pop().unwrap();
            Ok(Node::If(Box::new(cond), Box::new(then), Box::new(otherwise)))
        }
        "min" => {
            arity(2, &args)?;
            let b = args.pop().unwrap();
            let a = args.pop().unwrap();
            Ok(Node::Min(Box::new(a), Box::new(b)))
        }
        "max" => {
            arity(2, &args)?;
            let b = args.pop().unwrap();
            let a = args.pop().unwrap();
            Ok(Node::Max(Box::new(a), Box::new(b)))
        }
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

fn check_variables(node: &Node, declared: &[String]) -> Result<(), ExprError> {
    match node {
        Node::Number(_) => Ok(()),
        Node::Variable(name) => {
            if declared.iter().any(|v| v == name) {
                Ok(())
            } else {
                Err(ExprError::UnknownVariable(name.clone()))
            }
        }
        Node::Unary(inner) => check_variables(inner, declared),
        Node::Binary(_, a, b) | Node::Min(a, b) | Node::Max(a, b) => {
            check_variables(a, declared)?;
            check_variables(b, declared)
        }
        Node::If(c, t, e) => {
            check_variables(c, declared)?;
            check_variables(t, declared)?;
            check_variables(e, declared)
        }
    }
}

fn infer(node: &Node) -> Result<Type, ExprError> {
    match node {
        Node::Number(_) | Node::Variable(_) => Ok(Type::Number),
        Node::Unary(inner) => {
            expect_type(inner, Type::Number, "unary minus")?;
            Ok(Type::Number)
        }
        Node::Binary(op, a, b) => {
            expect_type(a, Type::Number, "operator operand")?;
            expect_type(b, Type::Number, "operator operand")?;
            match op {
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => Ok(Type::Number),
                _ => Ok(Type::Bool),
            }
        }
        Node::Min(a, b) | Node::Max(a, b) => {
            expect_type(a, Type::Number, "min/max argument")?;
            expect_type(b, Type::Number, "min/max argument")?;
            Ok(Type::Number)
        }
        Node::If(cond, then, otherwise) => {
            expect_type(cond, Type::Bool, "if condition")?;
            let then_ty = infer(then)?;
            let else_ty = infer(otherwise)?;
            if then_ty != else_ty {
                return Err(ExprError::TypeMismatch(
                    "if branches have different types".to_string(),
                ));
            }
            Ok(then_ty)
        }
    }
}

fn expect_type(node: &Node, expected: Type, context: &str) -> Result<(), ExprError> {
    let actual = infer(node)?;
    if actual != expected {
        return Err(ExprError::TypeMismatch(format!(
            "{context} must be {expected:?}"
        )));
    }
    Ok(())
}

fn eval(node: &Node, bindings: &HashMap<String, Decimal>) -> Result<Value, ExprError> {
    match node {
        Node::Number(n) => Ok(Value::Number(*n)),
        Node::Variable(name) => bindings
            .get(name)
            .map(|v| Value::Number(*v))
            .ok_or_else(|| ExprError::UnboundVariable(name.clone())),
        Node::Unary(inner) => match eval(inner, bindings)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::Bool(_) => Err(ExprError::TypeMismatch("unary minus on bool".to_string())),
        },
        Node::Binary(op, a, b) => {
            let a = eval_number(a, bindings)?;
            let b = eval_number(b, bindings)?;
            match op {
                BinOp::Add => Ok(Value::Number(a + b)),
                BinOp::Sub => Ok(Value::Number(a - b)),
                BinOp::Mul => Ok(Value::Number(a * b)),
                BinOp::Div => {
                    if b.is_zero() {
                        Err(ExprError::DivisionByZero)
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }
                BinOp::Lt => Ok(Value::Bool(a < b)),
                BinOp::Le => Ok(Value::Bool(a <= b)),
                BinOp::Gt => Ok(Value::Bool(a > b)),
                BinOp::Ge => Ok(Value::Bool(a >= b)),
                BinOp::Eq => Ok(Value::Bool(a == b)),
                BinOp::Ne => Ok(Value::Bool(a != b)),
            }
        }
        Node::Min(a, b) => {
            let a = eval_number(a, bindings)?;
            let b = eval_number(b, bindings)?;
            Ok(Value::Number(a.min(b)))
        }
        Node::Max(a, b) => {
            let a = eval_number(a, bindings)?;
            let b = eval_number(b, bindings)?;
            Ok(Value::Number(a.max(b)))
        }
        Node::If(cond, then, otherwise) => match eval(cond, bindings)? {
            Value::Bool(true) => eval(then, bindings),
            Value::Bool(false) => eval(otherwise, bindings),
            Value::Number(_) => Err(ExprError::TypeMismatch(
                "if condition must be a comparison".to_string(),
            )),
        },
    }
}

fn eval_number(node: &Node, bindings: &HashMap<String, Decimal>) -> Result<Decimal, ExprError> {
    match eval(node, bindings)? {
        Value::Number(n) => Ok(n),
        Value::Bool(_) => Err(ExprError::TypeMismatch(
            "expected a number".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn bind(pairs: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn arithmetic_with_precedence() {
        let expr = Expression::parse("2 + 3 * 4", &[]).unwrap();
        assert_eq!(expr.evaluate(&HashMap::new()).unwrap(), dec!(14));

        let expr = Expression::parse("(2 + 3) * 4", &[]).unwrap();
        assert_eq!(expr.evaluate(&HashMap::new()).unwrap(), dec!(20));
    }

    #[test]
    fn aliquot_distribution_expression() {
        let expr = Expression::parse(
            "total_amount * aliquot / 100",
            &vars(&["total_amount", "aliquot"]),
        )
        .unwrap();
        let result = expr
            .evaluate(&bind(&[("total_amount", dec!(1000)), ("aliquot", dec!(3.5))]))
            .unwrap();
        assert_eq!(result, dec!(35));
    }

    #[test]
    fn conditional_with_comparison() {
        let expr = Expression::parse(
            "if(aliquot > 5, 100, 50)",
            &vars(&["aliquot"]),
        )
        .unwrap();
        assert_eq!(expr.evaluate(&bind(&[("aliquot", dec!(6))])).unwrap(), dec!(100));
        assert_eq!(expr.evaluate(&bind(&[("aliquot", dec!(4))])).unwrap(), dec!(50));
    }

    #[test]
    fn undeclared_variable_rejected_at_parse() {
        let err = Expression::parse("total * aliquot", &vars(&["aliquot"])).unwrap_err();
        assert_eq!(err, ExprError::UnknownVariable("total".to_string()));
    }

    #[test]
    fn boolean_result_rejected_at_parse() {
        let err = Expression::parse("aliquot > 5", &vars(&["aliquot"])).unwrap_err();
        assert!(matches!(err, ExprError::TypeMismatch(_)));
    }

    #[test]
    fn numeric_if_condition_rejected_at_parse() {
        let err = Expression::parse("if(aliquot, 1, 2)", &vars(&["aliquot"])).unwrap_err();
        assert!(matches!(err, ExprError::TypeMismatch(_)));
    }

    #[test]
    fn division_by_zero_surfaces_at_eval() {
        let expr = Expression::parse("100 / units", &vars(&["units"])).unwrap();
        let err = expr.evaluate(&bind(&[("units", dec!(0))])).unwrap_err();
        assert_eq!(err, ExprError::DivisionByZero);
    }

    #[test]
    fn unknown_function_rejected() {
        let err = Expression::parse("pow(2, 3)", &[]).unwrap_err();
        assert_eq!(err, ExprError::UnknownFunction("pow".to_string()));
    }

    #[test]
    fn min_max_and_unary_minus() {
        let expr = Expression::parse("max(min(10, 20), -5)", &[]).unwrap();
        assert_eq!(expr.evaluate(&HashMap::new()).unwrap(), dec!(10));
    }

    #[test]
    fn trailing_garbage_rejected() {
        assert!(Expression::parse("1 + 2 )", &[]).is_err());
        assert!(Expression::parse("1 +", &[]).is_err());
    }

    #[test]
    fn serde_round_trip_revalidates() {
        let expr = Expression::parse("total * aliquot / 100", &vars(&["total", "aliquot"])).unwrap();
        let json = serde_json::to_string(&expr).unwrap();
        let back: Expression = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}
