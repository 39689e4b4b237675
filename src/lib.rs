//! # simpledb-record
//!
//! Persistence core for ActiveRecord-style models stored in Amazon SimpleDB.
//!
//! SimpleDB is a schemaless key-attribute store that only understands a
//! restricted SELECT dialect. This library lets a model layer speak ordinary
//! SQL anyway: INSERT, UPDATE and DELETE statements are parsed and emulated
//! with attribute calls, SELECT statements are run natively and hydrated into
//! model instances.
//!
//! ## Features
//!
//! - **Placeholder binding**: named `:placeholders` with escaping that matches
//!   the statement type, immediate or deferred to execute time
//! - **SQL emulation**: INSERT, UPDATE and DELETE translated to put, delete
//!   and batch-delete calls
//! - **Surrogate keys**: random item keys with bounded collision retries
//! - **Read consistency**: per-model or per-connection consistent reads
//! - **In-memory store**: a SimpleDB emulation with eventual consistency
//!   and paging, for tests and embedded use
//!
//! ## Example
//!
//! ```
//! use simpledb_record::*;
//!
//! #[derive(Default)]
//! struct Car {
//!     id: String,
//!     brand: String,
//!     doors: i64,
//! }
//!
//! impl Model for Car {
//!     fn set_item_name(&mut self, name: &str) {
//!         self.id = name.to_string();
//!     }
//!
//!     fn assign_attributes(&mut self, attributes: Attributes) {
//!         self.brand = attributes.get("brand").unwrap_or_default().to_string();
//!         self.doors = attributes.get_as("doors").unwrap_or_default();
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut connection = Connection::open(MemoryStore::new(), ConnectionParams::default())?;
//!
//! let mut insert = connection.create_statement(
//!     "INSERT INTO cars (brand, colour, doors) VALUES (:brand, :colour, :doors)",
//! );
//! insert
//!     .bind_value(":brand", "Ford")?
//!     .bind_value(":colour", "Black")?
//!     .bind_value(":doors", 2)?;
//! connection.execute_statement(&mut insert).await?;
//!
//! let mut select = connection.create_statement("SELECT * FROM cars WHERE brand = :brand");
//! select.bind_value(":brand", "Ford")?;
//! let cars: Records<Car> = connection.fetch_all_into(&mut select).await?;
//!
//! let car = &cars[connection.last_insert_id().unwrap_or_default()];
//! assert_eq!(car.doors, 2);
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod connection;
pub mod error;
pub mod query;
pub mod transport;
pub mod types;

// =============================================================================
// Connection Types
// =============================================================================

/// Re-export the executor and its configuration.
pub use connection::{Connection, ConnectionBuilder, ConnectionParams, Session};

// =============================================================================
// Error Types
// =============================================================================

/// Re-export error types for convenient error handling.
pub use error::{ConnectionError, ConversionError, QueryError, SimpleDbError, StoreError};

// =============================================================================
// Statements and Results
// =============================================================================

pub use query::{
    DynModel, Model, ModelRegistry, Mutation, Parameter, Record, Records, Statement,
    StatementType,
};

// =============================================================================
// Store Types
// =============================================================================

pub use transport::{AttributeStore, Item, MemoryStore, SelectOptions, SelectPage};

// =============================================================================
// Type System
// =============================================================================

pub use types::{Attributes, FromAttribute};
