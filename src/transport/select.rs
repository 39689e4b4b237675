//! SimpleDB SELECT expressions for the in-memory store.
//!
//! ```text
//! SELECT <* | itemName() | count(*) | attr, ...> FROM <domain>
//!     [WHERE <expr>] [ORDER BY <attr | itemName()> [ASC | DESC]] [LIMIT <n>]
//! ```
//!
//! Predicates compare strings lexicographically. A predicate on a
//! multi-valued attribute holds if any value satisfies it, unless the
//! attribute is wrapped in `every()`.

use crate::error::StoreError;
use crate::query::lexer::{tokenize, LexMode, Token};
use crate::types::Attributes;
use std::cmp::Ordering;

/// Columns returned by a SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    ItemName,
    Count,
    Attributes(Vec<String>),
}

/// Left-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    ItemName,
    Attribute(String),
    /// `every(attr)`: all values must satisfy the predicate
    Every(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Boolean predicate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        operand: Operand,
        op: CompareOp,
        value: String,
    },
    Like {
        operand: Operand,
        pattern: String,
        negated: bool,
    },
    In {
        operand: Operand,
        values: Vec<String>,
    },
    Between {
        operand: Operand,
        low: String,
        high: String,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
}

/// Parsed SELECT expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub projection: Projection,
    pub domain: String,
    pub predicate: Option<Expr>,
    /// Sort key and whether it is descending
    pub order_by: Option<(Operand, bool)>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    /// Parse a SELECT expression.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidQuery` for anything outside the dialect.
    pub fn parse(sql: &str) -> Result<Self, StoreError> {
        let tokens = tokenize(sql, LexMode::Native)
            .map_err(|e| StoreError::InvalidQuery(e.to_string()))?
            .into_iter()
            .map(|s| s.token)
            .collect();
        SelectParser { tokens, pos: 0 }.query()
    }

    /// Whether the item satisfies the WHERE clause.
    pub fn matches(&self, name: &str, attributes: &Attributes) -> bool {
        self.predicate
            .as_ref()
            .map_or(true, |expr| expr.eval(name, attributes))
    }

    /// Apply the projection to a matching item.
    pub fn project(&self, attributes: &Attributes) -> Attributes {
        match &self.projection {
            Projection::All => attributes.clone(),
            Projection::ItemName | Projection::Count => Attributes::new(),
            Projection::Attributes(names) => {
                let mut projected = Attributes::new();
                for (name, values) in attributes.iter() {
                    if names.iter().any(|n| n == name) {
                        for value in values {
                            projected.add(name, value.clone());
                        }
                    }
                }
                projected
            }
        }
    }

    /// Compare two items by the ORDER BY key. Items without the key sort last.
    pub fn compare(
        &self,
        a: (&str, &Attributes),
        b: (&str, &Attributes),
    ) -> Ordering {
        let Some((operand, descending)) = &self.order_by else {
            return Ordering::Equal;
        };
        let key_a = sort_key(operand, a.0, a.1);
        let key_b = sort_key(operand, b.0, b.1);
        match (key_a, key_b) {
            (Some(x), Some(y)) => {
                let o = x.cmp(y);
                if *descending {
                    o.reverse()
                } else {
                    o
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

fn sort_key<'a>(operand: &Operand, name: &'a str, attributes: &'a Attributes) -> Option<&'a str> {
    match operand {
        Operand::ItemName => Some(name),
        Operand::Attribute(attr) | Operand::Every(attr) => attributes.get(attr),
    }
}

fn like(value: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return value == pattern;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !value.starts_with(first) || value.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &value[first.len()..];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(i) => rest = &rest[i + middle.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

impl Expr {
    fn eval(&self, name: &str, attributes: &Attributes) -> bool {
        match self {
            Expr::And(a, b) => a.eval(name, attributes) && b.eval(name, attributes),
            Expr::Or(a, b) => a.eval(name, attributes) || b.eval(name, attributes),
            Expr::Not(e) => !e.eval(name, attributes),
            Expr::IsNull { operand, negated } => {
                let present = match operand {
                    Operand::ItemName => true,
                    Operand::Attribute(a) | Operand::Every(a) => attributes.contains(a),
                };
                present == *negated
            }
            Expr::Compare { operand, op, value } => {
                test_values(operand, name, attributes, |v| {
                    op.holds(v.cmp(value.as_str()))
                })
            }
            Expr::Like {
                operand,
                pattern,
                negated,
            } => test_values(operand, name, attributes, |v| like(v, pattern) != *negated),
            Expr::In { operand, values } => {
                test_values(operand, name, attributes, |v| values.iter().any(|x| x == v))
            }
            Expr::Between { operand, low, high } => {
                test_values(operand, name, attributes, |v| {
                    v >= low.as_str() && v <= high.as_str()
                })
            }
        }
    }
}

fn test_values<F>(operand: &Operand, name: &str, attributes: &Attributes, test: F) -> bool
where
    F: Fn(&str) -> bool,
{
    match operand {
        Operand::ItemName => test(name),
        Operand::Attribute(attr) => attributes.get_all(attr).iter().any(|v| test(v)),
        Operand::Every(attr) => {
            let values = attributes.get_all(attr);
            !values.is_empty() && values.iter().all(|v| test(v))
        }
    }
}

struct SelectParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl SelectParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn fail(&self, message: impl Into<String>) -> StoreError {
        StoreError::InvalidQuery(message.into())
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn keyword(&mut self, kw: &str) -> Result<(), StoreError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.fail(format!("expected {}", kw)))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn query(mut self) -> Result<SelectQuery, StoreError> {
        self.keyword("SELECT")?;
        let projection = self.projection()?;
        self.keyword("FROM")?;
        let domain = match self.advance() {
            Some(t) => t
                .identifier()
                .map(str::to_string)
                .ok_or_else(|| self.fail("expected domain name"))?,
            None => return Err(self.fail("expected domain name")),
        };

        let predicate = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };

        let order_by = if self.eat_keyword("ORDER") {
            self.keyword("BY")?;
            let operand = self.operand()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            Some((operand, descending))
        } else {
            None
        };

        let limit = if self.eat_keyword("LIMIT") {
            match self.advance() {
                Some(Token::Number(n)) => Some(
                    n.parse::<usize>()
                        .map_err(|_| self.fail(format!("invalid LIMIT {}", n)))?,
                ),
                _ => return Err(self.fail("expected number after LIMIT")),
            }
        } else {
            None
        };

        self.eat(&Token::Semicolon);
        if let Some(t) = self.peek() {
            return Err(self.fail(format!("unexpected token {:?}", t)));
        }

        Ok(SelectQuery {
            projection,
            domain,
            predicate,
            order_by,
            limit,
        })
    }

    fn projection(&mut self) -> Result<Projection, StoreError> {
        if self.eat(&Token::Star) {
            return Ok(Projection::All);
        }
        if self.peek() == Some(&Token::ItemName) {
            self.pos += 1;
            return Ok(Projection::ItemName);
        }
        if self.peek().is_some_and(|t| t.is_keyword("count")) {
            self.pos += 1;
            if self.eat(&Token::LParen) && self.eat(&Token::Star) && self.eat(&Token::RParen) {
                return Ok(Projection::Count);
            }
            return Err(self.fail("expected count(*)"));
        }

        let mut names = Vec::new();
        loop {
            match self.advance() {
                Some(t) => match t.identifier() {
                    Some(name) => names.push(name.to_string()),
                    None => return Err(self.fail("expected attribute name")),
                },
                None => return Err(self.fail("expected attribute name")),
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Projection::Attributes(names))
    }

    fn operand(&mut self) -> Result<Operand, StoreError> {
        match self.advance() {
            Some(Token::ItemName) => Ok(Operand::ItemName),
            Some(t) if t.is_keyword("every") && self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let name = match self.advance() {
                    Some(t) => t.identifier().map(str::to_string),
                    None => None,
                }
                .ok_or_else(|| self.fail("expected attribute in every()"))?;
                if !self.eat(&Token::RParen) {
                    return Err(self.fail("expected ')' after every("));
                }
                Ok(Operand::Every(name))
            }
            Some(t) => t
                .identifier()
                .map(|name| Operand::Attribute(name.to_string()))
                .ok_or_else(|| self.fail(format!("expected attribute, found {:?}", t))),
            None => Err(self.fail("unexpected end of expression")),
        }
    }

    fn literal(&mut self) -> Result<String, StoreError> {
        match self.advance() {
            Some(Token::Str(v)) | Some(Token::Number(v)) => Ok(v),
            other => Err(self.fail(format!("expected literal, found {:?}", other))),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, StoreError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, StoreError> {
        let mut left = self.unary_expr()?;
        while self.eat_keyword("AND") {
            let right = self.unary_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, StoreError> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.unary_expr()?)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            if !self.eat(&Token::RParen) {
                return Err(self.fail("expected ')'"));
            }
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, StoreError> {
        let operand = self.operand()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.keyword("NULL")?;
            return Ok(Expr::IsNull { operand, negated });
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("LIKE") {
            let pattern = self.literal()?;
            return Ok(Expr::Like {
                operand,
                pattern,
                negated,
            });
        }
        if negated {
            return Err(self.fail("expected LIKE after NOT"));
        }

        if self.eat_keyword("IN") {
            if !self.eat(&Token::LParen) {
                return Err(self.fail("expected '(' after IN"));
            }
            let mut values = vec![self.literal()?];
            while self.eat(&Token::Comma) {
                values.push(self.literal()?);
            }
            if !self.eat(&Token::RParen) {
                return Err(self.fail("expected ')' after IN list"));
            }
            return Ok(Expr::In { operand, values });
        }

        if self.eat_keyword("BETWEEN") {
            let low = self.literal()?;
            self.keyword("AND")?;
            let high = self.literal()?;
            return Ok(Expr::Between { operand, low, high });
        }

        match self.advance() {
            Some(Token::Op(op)) => {
                let op = CompareOp::parse(&op)
                    .ok_or_else(|| self.fail(format!("unknown operator {}", op)))?;
                let value = self.literal()?;
                Ok(Expr::Compare { operand, op, value })
            }
            other => Err(self.fail(format!("expected comparison, found {:?}", other))),
        }
    }
}
