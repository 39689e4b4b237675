//! Attribute values and their conversion to typed model fields.

mod attributes;
pub mod conversion;

pub use attributes::Attributes;
pub use conversion::{pad_integer, unpad_integer, FromAttribute};
