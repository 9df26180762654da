//! Arithmetic evaluation.
//!
//! Expressions are evaluated in-process by a small recursive-descent parser
//! with `bc -l` flavoured functions: `s c a l e` alongside the long names.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{str_arg, ToolError, ToolTrait};
use crate::safety::SafetyCategory;

const MAX_EXPRESSION: usize = 500;
const MAX_RESULT: usize = 1000;

pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop everything outside the arithmetic alphabet and cap the length.
pub fn sanitize(expression: &str) -> String {
    expression
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "_.+-*/^%() \t\n".contains(*c))
        .take(MAX_EXPRESSION)
        .collect()
}

pub fn evaluate(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("Invalid expression or no result".to_string());
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected {}", token));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

/// Integral values print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{:.10}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {}", n),
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Op(op) => write!(f, "'{}'", op),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Token::Num(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
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
            other => return Err(format!("unexpected character '{}'", other)),
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

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(op) = self.eat_op(&['*', '/', '%']) {
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err("divide by zero".to_string()),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.eat_op(&['-', '+']) {
            Some('-') => Ok(-self.unary()?),
            Some(_) => self.unary(),
            None => self.power(),
        }
    }

    // power := primary ('^' unary)?, right associative
    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if self.eat_op(&['^']).is_some() {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect_rparen()?;
                    apply(&name, arg)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(format!("unexpected {}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), String> {
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            _ => Err("missing ')'".to_string()),
        }
    }
}

fn apply(name: &str, x: f64) -> Result<f64, String> {
    let value = match name {
        "sqrt" => {
            if x < 0.0 {
                return Err("square root of negative number".to_string());
            }
            x.sqrt()
        }
        "s" | "sin" => x.sin(),
        "c" | "cos" => x.cos(),
        "tan" => x.tan(),
        "a" | "atan" => x.atan(),
        "l" | "ln" => {
            if x <= 0.0 {
                return Err("logarithm of non-positive number".to_string());
            }
            x.ln()
        }
        "e" | "exp" => x.exp(),
        "abs" => x.abs(),
        other => return Err(format!("unknown function '{}'", other)),
    };
    Ok(value)
}

fn constant(name: &str) -> Result<f64, String> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        other => Err(format!("unknown identifier '{}'", other)),
    }
}

#[async_trait]
impl ToolTrait for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }
    fn description(&self) -> &str {
        "Evaluate a mathematical expression"
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "A mathematical expression to evaluate. Supports +, -, *, /, %, \
                                    exponents (^), parentheses and functions (sqrt, sin, cos, tan, \
                                    atan, ln, exp, abs)."
                }
            },
            "required": ["expression"]
        })
    }
    fn category(&self) -> SafetyCategory {
        SafetyCategory::Calculation
    }
    fn payload(&self, args: &Value) -> Result<String, ToolError> {
        Ok(sanitize(str_arg(args, "expression")?))
    }
    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let expression = sanitize(str_arg(&args, "expression")?);
        debug!("calculator: {}", expression);

        let value = evaluate(&expression).map_err(|e| ToolError::Failed(format!("Error: {}", e)))?;
        let result = format_number(value);
        if result.len() > MAX_RESULT {
            return Err(ToolError::Failed("Result too large".to_string()));
        }
        Ok(result)
    }
}
