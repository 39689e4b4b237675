//! Conversions between typed model fields and SimpleDB string values.
//!
//! SimpleDB stores every value as a string and compares values
//! lexicographically. Models that need range queries on numbers store them
//! zero-padded with an offset, so that string order matches numeric order.

use crate::error::ConversionError;

/// Parse a typed value out of a stored attribute string.
pub trait FromAttribute: Sized {
    /// Convert `value`, stored under attribute `name`.
    fn from_attribute(name: &str, value: &str) -> Result<Self, ConversionError>;
}

fn invalid(name: &str, message: impl Into<String>) -> ConversionError {
    ConversionError::InvalidValue {
        attribute: name.to_string(),
        message: message.into(),
    }
}

impl FromAttribute for String {
    fn from_attribute(_name: &str, value: &str) -> Result<Self, ConversionError> {
        Ok(value.to_string())
    }
}

impl FromAttribute for bool {
    fn from_attribute(name: &str, value: &str) -> Result<Self, ConversionError> {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => Err(invalid(name, format!("'{}' is not a boolean", other))),
        }
    }
}

macro_rules! from_attribute_via_parse {
    ($($ty:ty),*) => {
        $(
            impl FromAttribute for $ty {
                fn from_attribute(name: &str, value: &str) -> Result<Self, ConversionError> {
                    value
                        .trim()
                        .parse::<$ty>()
                        .map_err(|e| invalid(name, format!("'{}': {}", value, e)))
                }
            }
        )*
    };
}

from_attribute_via_parse!(i32, i64, u32, u64, f64);

/// Encode an integer so that lexicographic order matches numeric order.
///
/// `offset` is added first so negative values stay non-negative, then the
/// result is zero-padded to `width` digits.
///
/// # Errors
///
/// Returns `ConversionError::InvalidValue` if `value + offset` is negative or
/// needs more than `width` digits.
///
/// # Example
///
/// ```
/// use simpledb_record::types::pad_integer;
///
/// assert_eq!(pad_integer(42, 5, 0).unwrap(), "00042");
/// assert_eq!(pad_integer(-3, 3, 100).unwrap(), "097");
/// ```
pub fn pad_integer(value: i64, width: usize, offset: i64) -> Result<String, ConversionError> {
    let shifted = value
        .checked_add(offset)
        .filter(|v| *v >= 0)
        .ok_or_else(|| invalid("<padded>", format!("{} is below the offset {}", value, -offset)))?;

    let encoded = format!("{:0width$}", shifted, width = width);
    if encoded.len() > width {
        return Err(invalid(
            "<padded>",
            format!("{} does not fit in {} digits", value, width),
        ));
    }
    Ok(encoded)
}

/// Decode a value produced by [`pad_integer`] with the same `offset`.
pub fn unpad_integer(text: &str, offset: i64) -> Result<i64, ConversionError> {
    let shifted = i64::from_attribute("<padded>", text)?;
    shifted
        .checked_sub(offset)
        .ok_or_else(|| invalid("<padded>", format!("{} underflows offset {}", text, offset)))
}
