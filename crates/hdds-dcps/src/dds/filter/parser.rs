// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Filter Expression Parser
//!
//! Turns an SQL-like filter string into an [`Expression`] tree. Precedence,
//! lowest first: `OR`, `AND`, `NOT`, comparison.

use super::FilterError;
use crate::core::types::TypeDescriptor;
use std::iter::Peekable;
use std::str::CharIndices;

/// Comparison operators supported in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `=` or `==`
    Eq,
    /// `<>` or `!=`
    Ne,
}

/// Operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    /// Positional parameter `%n`
    Parameter(usize),
    /// Payload field reference
    Field(String),
}

/// Parsed filter expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Comparison {
        left: Value,
        op: Operator,
        right: Value,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    /// Matches everything
    True,
}

impl Expression {
    fn walk_values<'a>(&'a self, visit: &mut impl FnMut(&'a Value)) {
        match self {
            Expression::Comparison { left, right, .. } => {
                visit(left);
                visit(right);
            }
            Expression::And(a, b) | Expression::Or(a, b) => {
                a.walk_values(visit);
                b.walk_values(visit);
            }
            Expression::Not(inner) => inner.walk_values(visit),
            Expression::True => {}
        }
    }

    /// Number of positional parameters the expression expects
    /// (highest `%n` index plus one).
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        let mut count = 0;
        self.walk_values(&mut |value| {
            if let Value::Parameter(idx) = value {
                count = count.max(idx + 1);
            }
        });
        count
    }

    /// Field names referenced by the expression, in order of appearance.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk_values(&mut |value| {
            if let Value::Field(name) = value {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        });
        names
    }

    /// Reject references to fields the type does not declare.
    pub fn check_fields(&self, descriptor: &TypeDescriptor) -> Result<(), FilterError> {
        match self
            .field_names()
            .into_iter()
            .find(|name| descriptor.get(name).is_none())
        {
            Some(unknown) => Err(FilterError::UnknownField(unknown.to_string())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Parameter(usize),
    Operator(Operator),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.offset();
        while self.peek().is_some_and(&pred) {
            self.chars.next();
        }
        let end = self.offset();
        &self.input[start..end]
    }

    /// Lex a number whose first character (digit or '-') starts at `start`.
    fn number(&mut self, start: usize) -> Result<Token, FilterError> {
        self.take_while(|c| c.is_ascii_digit() || c == '.');
        let text = &self.input[start..self.offset()];
        let parsed = if text.contains('.') {
            text.parse::<f64>().map(Token::Float).ok()
        } else {
            text.parse::<i64>().map(Token::Integer).ok()
        };
        parsed.ok_or_else(|| FilterError::ParseError(format!("Invalid number '{}'", text)))
    }

    fn quoted(&mut self, quote: char) -> Result<Token, FilterError> {
        let body = self.take_while(|c| c != quote);
        if !self.eat(quote) {
            return Err(FilterError::ParseError("Unterminated string".to_string()));
        }
        Ok(Token::String(body.to_string()))
    }

    fn parameter(&mut self) -> Result<Token, FilterError> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(FilterError::ParseError(
                "Expected digit after '%'".to_string(),
            ));
        }
        digits
            .parse()
            .map(Token::Parameter)
            .map_err(|_| FilterError::ParseError("Invalid parameter index".to_string()))
    }

    fn next_token(&mut self) -> Result<Token, FilterError> {
        self.take_while(char::is_whitespace);

        let Some((start, ch)) = self.chars.next() else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            '>' if self.eat('=') => Token::Operator(Operator::Ge),
            '>' => Token::Operator(Operator::Gt),
            '<' if self.eat('=') => Token::Operator(Operator::Le),
            '<' if self.eat('>') => Token::Operator(Operator::Ne),
            '<' => Token::Operator(Operator::Lt),
            '=' => {
                self.eat('=');
                Token::Operator(Operator::Eq)
            }
            '!' if self.eat('=') => Token::Operator(Operator::Ne),
            '!' => {
                return Err(FilterError::ParseError(
                    "Expected '=' after '!'".to_string(),
                ))
            }
            '(' => Token::LParen,
            ')' => Token::RParen,
            '%' => self.parameter()?,
            '\'' | '"' => self.quoted(ch)?,
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.number(start)?,
            c if c.is_ascii_digit() => self.number(start)?,
            c if c.is_alphabetic() || c == '_' => {
                self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
                let ident = self.input[start..self.offset()].to_string();
                match ident.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "TRUE" => Token::Boolean(true),
                    "FALSE" => Token::Boolean(false),
                    _ => Token::Identifier(ident),
                }
            }
            other => {
                return Err(FilterError::ParseError(format!(
                    "Unexpected character: '{}'",
                    other
                )))
            }
        };
        Ok(token)
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, FilterError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self) -> Result<Token, FilterError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn parse_or(&mut self) -> Result<Expression, FilterError> {
        let mut left = self.parse_and()?;
        while self.current == Token::Or {
            self.advance()?;
            left = Expression::Or(Box::new(left), Box::new(self.parse_and()?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, FilterError> {
        let mut left = self.parse_not()?;
        while self.current == Token::And {
            self.advance()?;
            left = Expression::And(Box::new(left), Box::new(self.parse_not()?));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, FilterError> {
        if self.current == Token::Not {
            self.advance()?;
            return Ok(Expression::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, FilterError> {
        if self.current != Token::LParen {
            return self.parse_comparison();
        }
        self.advance()?;
        let inner = self.parse_or()?;
        if self.advance()? != Token::RParen {
            return Err(FilterError::ParseError(
                "Expected closing parenthesis".to_string(),
            ));
        }
        Ok(inner)
    }

    fn parse_comparison(&mut self) -> Result<Expression, FilterError> {
        let left = self.parse_value()?;
        let op = match self.advance()? {
            Token::Operator(op) => op,
            other => {
                return Err(FilterError::ParseError(format!(
                    "Expected operator, got {:?}",
                    other
                )))
            }
        };
        let right = self.parse_value()?;
        Ok(Expression::Comparison { left, op, right })
    }

    fn parse_value(&mut self) -> Result<Value, FilterError> {
        Ok(match self.advance()? {
            Token::Identifier(name) => Value::Field(name),
            Token::Integer(n) => Value::Integer(n),
            Token::Float(f) => Value::Float(f),
            Token::String(s) => Value::String(s),
            Token::Boolean(b) => Value::Boolean(b),
            Token::Parameter(idx) => Value::Parameter(idx),
            other => {
                return Err(FilterError::ParseError(format!(
                    "Expected value, got {:?}",
                    other
                )))
            }
        })
    }
}

/// Parse a filter expression string into an AST.
///
/// ```
/// use hdds_dcps::dds::filter::{parse_expression, Expression};
///
/// let expr = parse_expression("x < %0 AND color = 'RED'")?;
/// assert!(matches!(expr, Expression::And(_, _)));
/// assert_eq!(expr.parameter_count(), 1);
/// # Ok::<(), hdds_dcps::dds::filter::FilterError>(())
/// ```
pub fn parse_expression(expression: &str) -> Result<Expression, FilterError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(FilterError::EmptyExpression);
    }

    let mut parser = Parser::new(trimmed)?;
    let expr = parser.parse_or()?;
    if parser.current != Token::Eof {
        return Err(FilterError::ParseError(format!(
            "Unexpected trailing token {:?}",
            parser.current
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FieldKind;

    fn comparison(expr: &str) -> (Value, Operator, Value) {
        match parse_expression(expr).expect("valid expression") {
            Expression::Comparison { left, op, right } => (left, op, right),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_comparison() {
        let (left, op, right) = comparison("x < 4");
        assert_eq!(left, Value::Field("x".to_string()));
        assert_eq!(op, Operator::Lt);
        assert_eq!(right, Value::Integer(4));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(comparison("x > 125").2, Value::Integer(125));
        assert_eq!(comparison("x > -7").2, Value::Integer(-7));
        assert_eq!(comparison("x >= 2.5").2, Value::Float(2.5));
        assert_eq!(comparison("x >= 10.25").2, Value::Float(10.25));
        assert_eq!(comparison("x = 0").2, Value::Integer(0));
    }

    #[test]
    fn test_parse_strings_and_booleans() {
        assert_eq!(
            comparison("color = 'BLUE'").2,
            Value::String("BLUE".to_string())
        );
        assert_eq!(
            comparison("color = \"A*\"").2,
            Value::String("A*".to_string())
        );
        assert_eq!(comparison("flag = TRUE").2, Value::Boolean(true));
    }

    #[test]
    fn test_parse_operators() {
        for (text, op) in [
            ("x > 1", Operator::Gt),
            ("x < 1", Operator::Lt),
            ("x >= 1", Operator::Ge),
            ("x <= 1", Operator::Le),
            ("x = 1", Operator::Eq),
            ("x == 1", Operator::Eq),
            ("x <> 1", Operator::Ne),
            ("x != 1", Operator::Ne),
        ] {
            assert_eq!(comparison(text).1, op, "{}", text);
        }
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a > %0 AND b < %1 OR c = 1").expect("valid");
        assert!(matches!(expr, Expression::Or(_, _)));

        let expr = parse_expression("(a > 1 OR b < 2) AND NOT c = 3").expect("valid");
        match expr {
            Expression::And(_, rhs) => assert!(matches!(*rhs, Expression::Not(_))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parameter_count() {
        assert_eq!(parse_expression("x > 1").expect("valid").parameter_count(), 0);
        assert_eq!(
            parse_expression("x > %0 AND y < %2").expect("valid").parameter_count(),
            3
        );
    }

    #[test]
    fn test_check_fields() {
        let ty = TypeDescriptor::new("Shape").field("x", FieldKind::Int);
        let expr = parse_expression("x > 1 AND y < 2").expect("valid");
        assert_eq!(
            expr.check_fields(&ty),
            Err(FilterError::UnknownField("y".to_string()))
        );
        assert!(parse_expression("x > 1").expect("valid").check_fields(&ty).is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_expression("   "),
            Err(FilterError::EmptyExpression)
        ));
        assert!(parse_expression("@@invalid").is_err());
        assert!(parse_expression("x >").is_err());
        assert!(parse_expression("x > 1 y").is_err());
        assert!(parse_expression("(x > 1").is_err());
        assert!(parse_expression("name = 'open").is_err());
        assert!(parse_expression("x > %").is_err());
        assert!(parse_expression("x LIKE 'a%'").is_err());
    }
}
