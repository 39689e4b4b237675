//! Translation of emulated SQL statements into attribute-store intents.
//!
//! SimpleDB has no INSERT, UPDATE or DELETE. This module parses the small
//! subset of those statements the model layer emits and turns each into a
//! [`Mutation`]: the target domain, the item key or key predicate, and the
//! attributes to write.
//!
//! Supported grammar:
//!
//! ```text
//! INSERT INTO <domain> (<col>, ...) VALUES (<value>, ...)
//! UPDATE <domain> SET <col> = <value> [, <col> = <value>]* [WHERE <predicate>]
//! DELETE FROM <domain> [WHERE <predicate>]
//! ```
//!
//! `<col>` may be `itemName()`, which names the item key. `<value>` is a
//! quoted literal, a number or `NULL`.

use crate::error::QueryError;
use crate::query::escape::escape_select;
use crate::query::lexer::{tokenize, LexMode, Spanned, Token};
use crate::types::Attributes;

/// Which items a mutation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single item, by key
    Item(String),
    /// Every item matching a SimpleDB predicate, or every item when `None`
    Matching(Option<String>),
}

/// Parsed INSERT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertIntent {
    pub domain: String,
    /// Explicit item key, if the `itemName()` column was given
    pub key: Option<String>,
    pub attributes: Attributes,
}

/// Parsed UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateIntent {
    pub domain: String,
    pub target: Target,
    /// Attributes to replace
    pub attributes: Attributes,
    /// Attributes set to NULL, to be deleted
    pub removed: Vec<String>,
}

/// Parsed DELETE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteIntent {
    pub domain: String,
    pub target: Target,
}

/// Structured form of an emulated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert(InsertIntent),
    Update(UpdateIntent),
    Delete(DeleteIntent),
}

impl Mutation {
    /// Domain the mutation writes to.
    pub fn domain(&self) -> &str {
        match self {
            Mutation::Insert(i) => &i.domain,
            Mutation::Update(u) => &u.domain,
            Mutation::Delete(d) => &d.domain,
        }
    }
}

/// Parse an INSERT, UPDATE or DELETE statement.
///
/// # Errors
///
/// Returns `QueryError::ParseFailure` if the statement is outside the
/// supported grammar or still contains unbound placeholders.
pub fn parse_mutation(sql: &str) -> Result<Mutation, QueryError> {
    let tokens = tokenize(sql, LexMode::Emulated).map_err(|e| QueryError::ParseFailure {
        message: e.to_string(),
        query: sql.to_string(),
    })?;

    if let Some(Token::Placeholder(name)) = tokens
        .iter()
        .map(|s| &s.token)
        .find(|t| matches!(t, Token::Placeholder(_)))
    {
        return Err(QueryError::ParseFailure {
            message: format!("unbound placeholder {}", name),
            query: sql.to_string(),
        });
    }

    let mut parser = Parser {
        sql,
        tokens,
        pos: 0,
    };

    match parser.peek() {
        Some(t) if t.is_keyword("INSERT") => parser.insert().map(Mutation::Insert),
        Some(t) if t.is_keyword("UPDATE") => parser.update().map(Mutation::Update),
        Some(t) if t.is_keyword("DELETE") => parser.delete().map(Mutation::Delete),
        _ => Err(parser.fail("expected INSERT, UPDATE or DELETE")),
    }
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn fail(&self, message: impl Into<String>) -> QueryError {
        QueryError::ParseFailure {
            message: message.into(),
            query: self.sql.to_string(),
        }
    }

    fn keyword(&mut self, kw: &str) -> Result<(), QueryError> {
        match self.advance() {
            Some(t) if t.is_keyword(kw) => Ok(()),
            _ => Err(self.fail(format!("expected {}", kw))),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), QueryError> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            _ => Err(self.fail(format!("expected {}", what))),
        }
    }

    fn domain(&mut self) -> Result<String, QueryError> {
        match self.advance() {
            Some(t) => t
                .identifier()
                .map(str::to_string)
                .ok_or_else(|| self.fail("expected domain name")),
            None => Err(self.fail("expected domain name")),
        }
    }

    /// Column name, `None` for the `itemName()` key column.
    fn column(&mut self) -> Result<Option<String>, QueryError> {
        match self.advance() {
            Some(Token::ItemName) => Ok(None),
            Some(t) => t
                .identifier()
                .map(|name| Some(name.to_string()))
                .ok_or_else(|| self.fail("expected column name")),
            None => Err(self.fail("expected column name")),
        }
    }

    /// Literal value, `None` for NULL.
    fn value(&mut self) -> Result<Option<String>, QueryError> {
        match self.advance() {
            Some(Token::Str(value)) | Some(Token::Number(value)) => Ok(Some(value)),
            Some(t) if t.is_keyword("NULL") => Ok(None),
            _ => Err(self.fail("expected a quoted value, number or NULL")),
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Semicolon))
    }

    fn finish(&mut self) -> Result<(), QueryError> {
        if self.peek() == Some(&Token::Semicolon) {
            self.pos += 1;
        }
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(self.fail(format!("unexpected trailing token {:?}", t))),
        }
    }

    fn insert(&mut self) -> Result<InsertIntent, QueryError> {
        self.keyword("INSERT")?;
        self.keyword("INTO")?;
        let domain = self.domain()?;

        self.expect(Token::LParen, "'(' before column list")?;
        let mut columns = vec![self.column()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            columns.push(self.column()?);
        }
        self.expect(Token::RParen, "')' after column list")?;

        self.keyword("VALUES")?;
        self.expect(Token::LParen, "'(' before value list")?;
        let mut values = vec![self.value()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            values.push(self.value()?);
        }
        self.expect(Token::RParen, "')' after value list")?;
        self.finish()?;

        if columns.len() != values.len() {
            return Err(self.fail(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }

        let mut key = None;
        let mut attributes = Attributes::new();
        for (column, value) in columns.into_iter().zip(values) {
            match (column, value) {
                (None, Some(k)) => key = Some(k),
                (None, None) => return Err(self.fail("itemName() cannot be NULL")),
                (Some(name), Some(v)) => attributes.add(name, v),
                (Some(_), None) => {}
            }
        }

        Ok(InsertIntent {
            domain,
            key,
            attributes,
        })
    }

    fn update(&mut self) -> Result<UpdateIntent, QueryError> {
        self.keyword("UPDATE")?;
        let domain = self.domain()?;
        self.keyword("SET")?;

        let mut attributes = Attributes::new();
        let mut removed = Vec::new();
        loop {
            let name = self
                .column()?
                .ok_or_else(|| self.fail("itemName() cannot be updated"))?;
            self.expect(Token::Op("=".to_string()), "'=' in SET clause")?;
            match self.value()? {
                Some(v) => attributes.set(name, v),
                None => removed.push(name),
            }
            if self.peek() != Some(&Token::Comma) {
                break;
            }
            self.pos += 1;
        }

        let target = self.where_clause()?;
        Ok(UpdateIntent {
            domain,
            target,
            attributes,
            removed,
        })
    }

    fn delete(&mut self) -> Result<DeleteIntent, QueryError> {
        self.keyword("DELETE")?;
        self.keyword("FROM")?;
        let domain = self.domain()?;
        let target = self.where_clause()?;
        Ok(DeleteIntent { domain, target })
    }

    fn where_clause(&mut self) -> Result<Target, QueryError> {
        if self.at_end() {
            self.finish()?;
            return Ok(Target::Matching(None));
        }
        self.keyword("WHERE")?;

        let mut end = self.tokens.len();
        if matches!(self.tokens.last().map(|s| &s.token), Some(Token::Semicolon)) {
            end -= 1;
        }
        let predicate = &self.tokens[self.pos..end];
        if predicate.is_empty() {
            return Err(self.fail("empty WHERE clause"));
        }
        if predicate.iter().any(|s| s.token == Token::Semicolon) {
            return Err(self.fail("multiple statements are not supported"));
        }

        let target = match predicate {
            [Spanned {
                token: Token::ItemName,
                ..
            }, Spanned {
                token: Token::Op(op),
                ..
            }, Spanned {
                token: Token::Str(key),
                ..
            }] if op == "=" => Target::Item(key.clone()),
            _ => Target::Matching(Some(render_native(self.sql, predicate))),
        };
        self.pos = self.tokens.len();
        Ok(target)
    }
}

/// Re-render tokens with SimpleDB's literal quoting.
///
/// Emulated statements quote with backslashes, SimpleDB doubles quotes, so a
/// predicate copied into a SELECT needs its literals rewritten.
fn render_native(sql: &str, tokens: &[Spanned]) -> String {
    let mut rendered = String::new();
    let mut last = None;
    for spanned in tokens {
        if let Some(prev_end) = last {
            rendered.push_str(&sql[prev_end..spanned.start]);
        }
        match &spanned.token {
            Token::Str(value) => {
                rendered.push('\'');
                rendered.push_str(&escape_select(value));
                rendered.push('\'');
            }
            _ => rendered.push_str(&sql[spanned.start..spanned.end]),
        }
        last = Some(spanned.end);
    }
    rendered
}

/// Quote a domain name for use in a SELECT.
pub fn quote_domain(domain: &str) -> String {
    format!("`{}`", domain.replace('`', "``"))
}

/// SELECT returning the keys of items matching `predicate`, in pages of `limit`.
pub fn key_selection_query(domain: &str, predicate: Option<&str>, limit: usize) -> String {
    match predicate {
        Some(p) => format!(
            "SELECT itemName() FROM {} WHERE {} LIMIT {}",
            quote_domain(domain),
            p,
            limit
        ),
        None => format!(
            "SELECT itemName() FROM {} LIMIT {}",
            quote_domain(domain),
            limit
        ),
    }
}

/// Strip relational alias syntax SimpleDB does not understand.
///
/// Removes `` `Alias`. `` qualifiers and `` AS `Alias` `` clauses outside
/// quoted literals. Other backtick identifiers are kept.
pub fn simplify(sql: &str, mode: LexMode) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut output = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' || c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() {
                if mode == LexMode::Emulated && chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == c {
                    if chars.get(i + 1) == Some(&c) {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            output.extend(&chars[start..i]);
            continue;
        }

        if c == '`' {
            let start = i;
            let mut j = i + 1;
            while j < chars.len() && chars[j] != '`' {
                j += 1;
            }
            let end = (j + 1).min(chars.len());

            if chars.get(end) == Some(&'.') {
                i = end + 1;
                continue;
            }

            let trimmed = output.trim_end();
            let before_as = trimmed.len().saturating_sub(2);
            let is_alias = trimmed.len() >= 2
                && trimmed.len() < output.len()
                && trimmed
                    .get(before_as..)
                    .is_some_and(|tail| tail.eq_ignore_ascii_case("AS"))
                && trimmed
                    .get(..before_as)
                    .is_some_and(|head| head.chars().last().map_or(true, char::is_whitespace));
            if is_alias {
                let kept = trimmed[..before_as].trim_end().len();
                output.truncate(kept);
                i = end;
                continue;
            }

            output.extend(&chars[start..end]);
            i = end;
            continue;
        }

        output.push(c);
        i += 1;
    }

    output
}
