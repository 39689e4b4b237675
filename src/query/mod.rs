//! Statement handling.
//!
//! Statement is a pure data container. Execution is performed by
//! [`Connection`](crate::connection::Connection).
//!
//! The query module is organized into:
//! - `statement` - SQL statement data container with parameter binding
//! - `placeholder` - quote-aware placeholder scanning and substitution
//! - `escape` - literal escaping for SELECT and emulated statements
//! - `lexer` - tokenizer shared by the translator and the SELECT evaluator
//! - `translate` - INSERT/UPDATE/DELETE to attribute intents
//! - `results` - model hydration

pub mod escape;
pub mod lexer;
pub mod placeholder;
pub mod results;
pub mod statement;
pub mod translate;

// Re-export commonly used types
pub use results::{DynModel, Model, ModelRegistry, Record, Records};
pub use statement::{Parameter, Statement, StatementType};
pub use translate::{parse_mutation, Mutation, Target};
