//! SQL statement data container with named parameter binding.
//!
//! A `Statement` holds the query text and any deferred bindings. It never
//! talks to the store: execution goes through
//! [`Connection`](crate::connection::Connection).

use crate::error::QueryError;
use crate::query::escape::{escape_select, escape_write};
use crate::query::placeholder::{self, normalize};
use std::cell::OnceCell;
use std::fmt;

/// Kind of SQL statement, from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Insert,
    Update,
    Delete,
    Select,
}

impl StatementType {
    /// Classify `sql` by its first word, ignoring case.
    pub fn classify(sql: &str) -> Option<Self> {
        let word: String = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .chars()
            .take_while(|c| c.is_alphabetic())
            .collect();

        match word.to_ascii_uppercase().as_str() {
            "INSERT" => Some(StatementType::Insert),
            "UPDATE" => Some(StatementType::Update),
            "DELETE" => Some(StatementType::Delete),
            "SELECT" => Some(StatementType::Select),
            _ => None,
        }
    }

    /// Whether this statement is emulated rather than sent to SimpleDB as is.
    pub fn is_emulated(&self) -> bool {
        !matches!(self, StatementType::Select)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementType::Insert => "INSERT",
            StatementType::Update => "UPDATE",
            StatementType::Delete => "DELETE",
            StatementType::Select => "SELECT",
        };
        f.write_str(name)
    }
}

/// Value bound to a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Parameter {
    /// String form stored in SimpleDB, `None` for NULL.
    pub fn as_attribute_value(&self) -> Option<String> {
        match self {
            Parameter::Null => None,
            Parameter::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Parameter::Integer(i) => Some(i.to_string()),
            Parameter::Float(f) => Some(f.to_string()),
            Parameter::String(s) => Some(s.clone()),
        }
    }

    /// Render as a SQL literal using the escaping rule for `statement_type`.
    ///
    /// SELECT literals double single quotes. Every other statement uses the
    /// backslash escape table.
    pub fn to_literal(&self, statement_type: Option<StatementType>) -> String {
        let Some(value) = self.as_attribute_value() else {
            return "NULL".to_string();
        };
        let escaped = match statement_type {
            Some(StatementType::Select) => escape_select(&value),
            _ => escape_write(&value),
        };
        format!("'{}'", escaped)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::String(value.to_string())
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Parameter::String(value)
    }
}

impl From<&String> for Parameter {
    fn from(value: &String) -> Self {
        Parameter::String(value.clone())
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Parameter::Boolean(value)
    }
}

impl From<i32> for Parameter {
    fn from(value: i32) -> Self {
        Parameter::Integer(value.into())
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Parameter::Integer(value)
    }
}

impl From<u32> for Parameter {
    fn from(value: u32) -> Self {
        Parameter::Integer(value.into())
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Parameter::Float(value)
    }
}

impl<T: Into<Parameter>> From<Option<T>> for Parameter {
    fn from(value: Option<T>) -> Self {
        value.map_or(Parameter::Null, Into::into)
    }
}

type ValueProvider = Box<dyn FnOnce() -> Parameter + Send>;

/// SQL statement with named placeholders.
///
/// Placeholders are `:name` tokens (plus the special `:itemName()`). Values
/// are bound either immediately with [`bind_value`](Self::bind_value), or
/// lazily with [`bind_param`](Self::bind_param), whose provider runs once when
/// the statement is executed.
///
/// # Example
///
/// ```
/// use simpledb_record::Statement;
///
/// let mut stmt = Statement::new("SELECT * FROM cars WHERE brand = :brand");
/// stmt.bind_value(":brand", "O'Neil").unwrap();
/// assert_eq!(stmt.sql(), "SELECT * FROM cars WHERE brand = 'O''Neil'");
/// ```
pub struct Statement {
    /// Query text, rewritten by each bind
    sql: String,
    /// Deferred bindings in bind order
    pending: Vec<(String, ValueProvider)>,
    /// Cached classification of `sql`
    statement_type: OnceCell<Option<StatementType>>,
}

impl Statement {
    /// Create a statement from SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            pending: Vec::new(),
            statement_type: OnceCell::new(),
        }
    }

    /// Current query text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Statement type from the leading keyword, `None` if unrecognised.
    pub fn query_type(&self) -> Option<StatementType> {
        *self
            .statement_type
            .get_or_init(|| StatementType::classify(&self.sql))
    }

    fn backslash_escapes(&self) -> bool {
        self.query_type() != Some(StatementType::Select)
    }

    /// Distinct placeholders still present in the query, ignoring quoted text.
    pub fn placeholders(&self) -> Vec<String> {
        placeholder::placeholders(&self.sql, self.backslash_escapes())
    }

    /// Whether deferred bindings are waiting for execution.
    pub fn has_pending_bindings(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Replace every occurrence of `name` with the escaped literal for `value`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::ParameterBinding` if the placeholder does not occur
    /// in the query.
    pub fn bind_value(
        &mut self,
        name: &str,
        value: impl Into<Parameter>,
    ) -> Result<&mut Self, QueryError> {
        let placeholder = normalize(name);
        let parameter: Parameter = value.into();
        let literal = parameter.to_literal(self.query_type());
        let (sql, replaced) = placeholder::substitute(
            &self.sql,
            &placeholder,
            &literal,
            self.backslash_escapes(),
        );
        if replaced == 0 {
            return Err(QueryError::ParameterBinding(format!(
                "placeholder {} not found in query",
                placeholder
            )));
        }
        self.sql = sql;
        Ok(self)
    }

    /// Bind `name` to a value produced at execute time.
    ///
    /// The provider is called exactly once, when the statement is finalized,
    /// so it sees the latest state of whatever it captures.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::ParameterBinding` if the placeholder does not occur
    /// in the query.
    pub fn bind_param<F, P>(&mut self, name: &str, provider: F) -> Result<&mut Self, QueryError>
    where
        F: FnOnce() -> P + Send + 'static,
        P: Into<Parameter>,
    {
        let placeholder = normalize(name);
        if !self.placeholders().contains(&placeholder) {
            return Err(QueryError::ParameterBinding(format!(
                "placeholder {} not found in query",
                placeholder
            )));
        }
        self.pending.push((
            placeholder,
            Box::new(move || -> Parameter { provider().into() }),
        ));
        Ok(self)
    }

    /// Resolve every deferred binding.
    ///
    /// Called by the connection right before dispatch. Calling it again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::ParameterBinding` if a deferred placeholder has
    /// already been replaced by an immediate binding.
    pub fn finalize(&mut self) -> Result<(), QueryError> {
        for (placeholder, provider) in std::mem::take(&mut self.pending) {
            let value = provider();
            self.bind_value(&placeholder, value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field(
                "pending",
                &self.pending.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("query_type", &self.query_type())
            .finish()
    }
}
