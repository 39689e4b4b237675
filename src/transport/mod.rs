//! Attribute store abstraction and the in-memory backend.
//!
//! - `protocol` - the [`AttributeStore`] trait and its request/response types
//! - `memory` - [`MemoryStore`], an in-process SimpleDB emulation
//! - `select` - SimpleDB SELECT parsing and evaluation used by `memory`

pub mod memory;
pub mod protocol;
pub mod select;

pub use memory::{MemoryStore, StoreStats};
pub use protocol::{
    AttributeStore, Item, SelectOptions, SelectPage, DEFAULT_SELECT_LIMIT,
    MAX_BATCH_DELETE_ITEMS, MAX_SELECT_LIMIT,
};
pub use select::SelectQuery;
