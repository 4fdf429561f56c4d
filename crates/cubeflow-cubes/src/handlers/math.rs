//! Arithmetic expression evaluation.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | ident | ident '(' args ')' | '(' expr ')'
//! ```
//!
//! `^` is right-associative and binds tighter than unary minus, so `-2^2`
//! is `-4`.
//!
//! Nesting (parentheses, calls, unary signs, `^` and operator chains) is
//! bounded by [`MAX_DEPTH`] so parsing and evaluation stay within the stack.

use std::collections::HashMap;

use async_trait::async_trait;
use cubeflow_output::number_value;
use serde_json::Value;

use crate::error::HandlerError;
use crate::handler::{CubeHandler, Params, coerce_number, merge_params, param, require_text};

/// Deepest expression tree the parser accepts.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Number(f64),
  Ident(String),
  Op(char),
  LParen,
  RParen,
  Comma,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
  Number(f64),
  Variable(String),
  Neg(Box<Expr>),
  Binary(char, Box<Expr>, Box<Expr>),
  Call(String, Vec<Expr>),
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
  let mut tokens = Vec::new();
  let mut chars = input.char_indices().peekable();

  while let Some(&(start, c)) = chars.peek() {
    match c {
      c if c.is_whitespace() => {
        chars.next();
      }
      '0'..='9' | '.' => {
        let mut end = start;
        while let Some(&(i, d)) = chars.peek() {
          if d.is_ascii_digit() || d == '.' {
            end = i + d.len_utf8();
            chars.next();
          } else {
            break;
          }
        }
        let literal = &input[start..end];
        let number = literal
          .parse()
          .map_err(|_| format!("invalid number '{literal}'"))?;
        tokens.push(Token::Number(number));
      }
      c if c.is_alphabetic() || c == '_' => {
        let mut end = start;
        while let Some(&(i, d)) = chars.peek() {
          if d.is_alphanumeric() || d == '_' {
            end = i + d.len_utf8();
            chars.next();
          } else {
            break;
          }
        }
        tokens.push(Token::Ident(input[start..end].to_string()));
      }
      '+' | '-' | '*' | '/' | '%' | '^' => {
        tokens.push(Token::Op(c));
        chars.next();
      }
      '(' => {
        tokens.push(Token::LParen);
        chars.next();
      }
      ')' => {
        tokens.push(Token::RParen);
        chars.next();
      }
      ',' => {
        tokens.push(Token::Comma);
        chars.next();
      }
      other => return Err(format!("unexpected character '{other}'")),
    }
  }

  Ok(tokens)
}

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
  depth: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    self.pos += 1;
    token
  }

  fn expect(&mut self, expected: Token) -> Result<(), String> {
    match self.next() {
      Some(ref t) if *t == expected => Ok(()),
      Some(t) => Err(format!("expected {expected:?}, found {t:?}")),
      None => Err(format!("expected {expected:?}, found end of expression")),
    }
  }

  /// One level deeper. Callers restore `depth` once the nested part is parsed.
  fn descend(&mut self) -> Result<(), String> {
    self.depth += 1;
    if self.depth > MAX_DEPTH {
      return Err(format!("expression nests deeper than {MAX_DEPTH} levels"));
    }
    Ok(())
  }

  fn expr(&mut self) -> Result<Expr, String> {
    let start = self.depth;
    let mut left = self.term()?;
    // Each operand in a chain deepens the left-leaning tree by one
    while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
      self.pos += 1;
      self.descend()?;
      left = Expr::Binary(op, Box::new(left), Box::new(self.term()?));
    }
    self.depth = start;
    Ok(left)
  }

  fn term(&mut self) -> Result<Expr, String> {
    let start = self.depth;
    let mut left = self.unary()?;
    while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
      self.pos += 1;
      self.descend()?;
      left = Expr::Binary(op, Box::new(left), Box::new(self.unary()?));
    }
    self.depth = start;
    Ok(left)
  }

  fn unary(&mut self) -> Result<Expr, String> {
    let start = self.depth;
    let expr = match self.peek() {
      Some(Token::Op('-')) => {
        self.pos += 1;
        self.descend()?;
        Expr::Neg(Box::new(self.unary()?))
      }
      Some(Token::Op('+')) => {
        self.pos += 1;
        self.descend()?;
        self.unary()?
      }
      _ => self.power()?,
    };
    self.depth = start;
    Ok(expr)
  }

  fn power(&mut self) -> Result<Expr, String> {
    let start = self.depth;
    let base = self.primary()?;
    if let Some(Token::Op('^')) = self.peek() {
      self.pos += 1;
      self.descend()?;
      let exponent = self.unary()?;
      self.depth = start;
      return Ok(Expr::Binary('^', Box::new(base), Box::new(exponent)));
    }
    Ok(base)
  }

  fn primary(&mut self) -> Result<Expr, String> {
    let start = self.depth;
    let expr = self.primary_inner()?;
    self.depth = start;
    Ok(expr)
  }

  fn primary_inner(&mut self) -> Result<Expr, String> {
    match self.next() {
      Some(Token::Number(n)) => Ok(Expr::Number(n)),
      Some(Token::Ident(name)) => {
        if self.peek() != Some(&Token::LParen) {
          return Ok(Expr::Variable(name));
        }
        self.pos += 1;
        self.descend()?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
          args.push(self.expr()?);
          while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.expr()?);
          }
        }
        self.expect(Token::RParen)?;
        Ok(Expr::Call(name, args))
      }
      Some(Token::LParen) => {
        self.descend()?;
        let inner = self.expr()?;
        self.expect(Token::RParen)?;
        Ok(inner)
      }
      Some(t) => Err(format!("unexpected token {t:?}")),
      None => Err("unexpected end of expression".to_string()),
    }
  }
}

fn parse(input: &str) -> Result<Expr, String> {
  let mut parser = Parser {
    tokens: tokenize(input)?,
    pos: 0,
    depth: 0,
  };
  if parser.tokens.is_empty() {
    return Err("expression is empty".to_string());
  }
  let expr = parser.expr()?;
  match parser.peek() {
    None => Ok(expr),
    Some(t) => Err(format!("unexpected token {t:?}")),
  }
}

fn eval(expr: &Expr, vars: &HashMap<String, f64>) -> Result<f64, String> {
  match expr {
    Expr::Number(n) => Ok(*n),
    Expr::Variable(name) => match vars.get(name) {
      Some(v) => Ok(*v),
      None => match name.as_str() {
        "pi" | "PI" => Ok(std::f64::consts::PI),
        "e" | "E" => Ok(std::f64::consts::E),
        _ => Err(format!("undefined symbol '{name}'")),
      },
    },
    Expr::Neg(inner) => Ok(-eval(inner, vars)?),
    Expr::Binary(op, l, r) => {
      let (l, r) = (eval(l, vars)?, eval(r, vars)?);
      Ok(match op {
        '+' => l + r,
        '-' => l - r,
        '*' => l * r,
        '/' => l / r,
        '%' => l % r,
        '^' => l.powf(r),
        _ => return Err(format!("unknown operator '{op}'")),
      })
    }
    Expr::Call(name, args) => {
      let values = args
        .iter()
        .map(|a| eval(a, vars))
        .collect::<Result<Vec<_>, _>>()?;
      call(name, &values)
    }
  }
}

fn call(name: &str, args: &[f64]) -> Result<f64, String> {
  let unary = |f: fn(f64) -> f64| match args {
    [x] => Ok(f(*x)),
    _ => Err(format!("{name}() takes exactly one argument")),
  };

  match name {
    "sqrt" => unary(f64::sqrt),
    "abs" => unary(f64::abs),
    "floor" => unary(f64::floor),
    "ceil" => unary(f64::ceil),
    "round" => unary(f64::round),
    "min" | "max" if args.is_empty() => Err(format!("{name}() needs at least one argument")),
    "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
    "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
    _ => Err(format!("unknown function '{name}'")),
  }
}

/// Evaluate an arithmetic expression with named variables.
///
/// Non-finite results (division by zero, `sqrt(-1)`) are errors.
pub fn evaluate_expression(
  expression: &str,
  variables: &HashMap<String, f64>,
) -> Result<f64, HandlerError> {
  let value = parse(expression)
    .and_then(|expr| eval(&expr, variables))
    .map_err(|message| HandlerError::Evaluation { message })?;

  if !value.is_finite() {
    return Err(HandlerError::Evaluation {
      message: "expression did not evaluate to a valid number".to_string(),
    });
  }
  Ok(value)
}

/// Evaluates `expression` against an optional `variables` map.
pub struct MathHandler;

#[async_trait]
impl CubeHandler for MathHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);
    let expression = require_text(&params, "expression")?;

    let mut variables = HashMap::new();
    match param(&params, "variables") {
      None => {}
      Some(Value::Object(map)) => {
        for (name, value) in map {
          let number = coerce_number(value);
          if number.is_nan() {
            return Err(HandlerError::invalid(
              "variables",
              format!("variable '{name}' is not a number"),
            ));
          }
          variables.insert(name.clone(), number);
        }
      }
      Some(_) => return Err(HandlerError::invalid("variables", "must be an object")),
    }

    evaluate_expression(&expression, &variables).map(number_value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn eval_str(expression: &str) -> Result<f64, HandlerError> {
    evaluate_expression(expression, &HashMap::new())
  }

  #[test]
  fn test_precedence_and_associativity() {
    assert_eq!(eval_str("2+2").unwrap(), 4.0);
    assert_eq!(eval_str("2 + 3 * 4").unwrap(), 14.0);
    assert_eq!(eval_str("(2 + 3) * 4").unwrap(), 20.0);
    assert_eq!(eval_str("10 - 4 - 3").unwrap(), 3.0);
    assert_eq!(eval_str("2 ^ 3 ^ 2").unwrap(), 512.0);
    assert_eq!(eval_str("-2 ^ 2").unwrap(), -4.0);
    assert_eq!(eval_str("7 % 3").unwrap(), 1.0);
    assert_eq!(eval_str("--3").unwrap(), 3.0);
  }

  #[test]
  fn test_functions_and_constants() {
    assert_eq!(eval_str("sqrt(16) + abs(-2)").unwrap(), 6.0);
    assert_eq!(eval_str("floor(2.7) + ceil(2.1) + round(2.5)").unwrap(), 8.0);
    assert_eq!(eval_str("max(1, 5, 3) - min(4, 2)").unwrap(), 3.0);
    assert!((eval_str("pi").unwrap() - std::f64::consts::PI).abs() < 1e-12);
  }

  #[test]
  fn test_rejects_bad_input() {
    assert!(eval_str("").is_err());
    assert!(eval_str("2 +").is_err());
    assert!(eval_str("(1 + 2").is_err());
    assert!(eval_str("1 2").is_err());
    assert!(eval_str("x + 1").is_err());
    assert!(eval_str("nope(1)").is_err());
    assert!(eval_str("2 $ 3").is_err());
  }

  #[test]
  fn test_deep_nesting_is_rejected_not_overflowed() {
    let parens = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
    let err = eval_str(&parens).unwrap_err();
    assert!(err.to_string().contains("nests deeper"), "{err}");

    let chain = format!("{}1", "1+".repeat(100_000));
    assert!(eval_str(&chain).is_err());
    assert!(eval_str(&"-".repeat(10_000)).is_err());
    assert!(eval_str(&format!("2{}", "^2".repeat(10_000))).is_err());
    assert!(eval_str(&format!("{}1{}", "abs(".repeat(5_000), ")".repeat(5_000))).is_err());
  }

  #[test]
  fn test_moderate_nesting_still_evaluates() {
    let parens = format!("{}1{}", "(".repeat(100), ")".repeat(100));
    assert_eq!(eval_str(&parens).unwrap(), 1.0);
    let chain = format!("{}1", "1+".repeat(200));
    assert_eq!(eval_str(&chain).unwrap(), 201.0);
  }

  #[test]
  fn test_non_finite_is_an_error() {
    assert!(eval_str("1 / 0").is_err());
    assert!(eval_str("sqrt(-1)").is_err());
  }

  #[tokio::test]
  async fn test_handler_returns_integral_numbers() {
    let config = json!({ "expression": "2+2" }).as_object().cloned().unwrap();
    let out = MathHandler.execute(&Params::new(), &config).await.unwrap();
    assert_eq!(out, json!(4));
  }

  #[tokio::test]
  async fn test_handler_uses_variables() {
    let config = json!({ "expression": "price * qty", "variables": { "price": 2.5, "qty": "4" } })
      .as_object()
      .cloned()
      .unwrap();
    let out = MathHandler.execute(&Params::new(), &config).await.unwrap();
    assert_eq!(out, json!(10));
  }
}
