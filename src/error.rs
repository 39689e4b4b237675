//! Error types for simpledb-record.
//!
//! Errors are layered the same way the crate is: the store reports
//! [`StoreError`], statement translation and execution report [`QueryError`],
//! configuration reports [`ConnectionError`] and model hydration reports
//! [`ConversionError`]. [`SimpleDbError`] wraps all of them for callers that
//! only want a single error type.

use thiserror::Error;

/// Top-level error type for the crate.
#[derive(Error, Debug)]
pub enum SimpleDbError {
    /// Connection configuration error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Statement translation or execution error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Attribute store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Attribute value conversion error
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

/// Errors raised while configuring a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A parameter has an invalid value
    #[error("Invalid parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The connection string could not be parsed
    #[error("Failed to parse connection string: {0}")]
    ParseError(String),
}

/// Errors raised while binding, translating or executing a statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The leading SQL keyword is not INSERT, UPDATE, DELETE or SELECT
    #[error("Unknown query type: {0}")]
    UnknownQueryType(String),

    /// The statement does not match the supported grammar
    #[error("Failed to parse statement ({message}): {query}")]
    ParseFailure { message: String, query: String },

    /// The hydration target is not registered
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// The store rejected a SELECT
    #[error("Fetch failed ({message}) for query: {query}")]
    FetchFailed { message: String, query: String },

    /// No free surrogate key was found within the retry bound
    #[error("Could not generate a free item key for domain '{domain}' after {attempts} attempts")]
    KeyGenerationExhausted { domain: String, attempts: u32 },

    /// A placeholder could not be bound
    #[error("Parameter binding error: {0}")]
    ParameterBinding(String),

    /// The store rejected a mutation
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A store call did not finish in time
    #[error("Store call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

/// Errors reported by an attribute store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced domain does not exist
    #[error("The specified domain does not exist: {0}")]
    NoSuchDomain(String),

    /// The SELECT expression is not valid for the store
    #[error("Invalid query expression: {0}")]
    InvalidQuery(String),

    /// The store refused the request
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },
}

/// Errors raised while converting attribute values to typed fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// A required attribute is absent
    #[error("Missing attribute '{0}'")]
    MissingAttribute(String),

    /// An attribute value could not be parsed into the requested type
    #[error("Invalid value for attribute '{attribute}': {message}")]
    InvalidValue { attribute: String, message: String },
}
