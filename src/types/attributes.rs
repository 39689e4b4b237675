//! Attribute bag held by a SimpleDB item.

use crate::error::ConversionError;
use crate::types::conversion::FromAttribute;
use indexmap::IndexMap;

/// Attributes of a single item.
///
/// Every attribute may carry several string values, as in SimpleDB. Attribute
/// order is the order in which names were first written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    values: IndexMap<String, Vec<String>>,
}

impl Attributes {
    /// Create an empty attribute bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), vec![value.into()]);
    }

    /// Add a value to `name`, keeping existing values.
    ///
    /// A name/value pair is stored at most once.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let values = self.values.entry(name.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `name`, empty if the attribute is absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parse the first value of `name` into `T`.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::MissingAttribute` if the attribute is absent, or
    /// `ConversionError::InvalidValue` if it cannot be parsed.
    pub fn get_as<T: FromAttribute>(&self, name: &str) -> Result<T, ConversionError> {
        let value = self
            .get(name)
            .ok_or_else(|| ConversionError::MissingAttribute(name.to_string()))?;
        T::from_attribute(name, value)
    }

    /// Parse the first value of `name` into `T`, or `None` if absent.
    pub fn get_opt<T: FromAttribute>(&self, name: &str) -> Result<Option<T>, ConversionError> {
        self.get(name)
            .map(|value| T::from_attribute(name, value))
            .transpose()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove an attribute and return its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.values.shift_remove(name)
    }

    /// Number of distinct attribute names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attribute names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate over `(name, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Merge `other` into this bag.
    ///
    /// With `replace` every attribute named in `other` loses its previous
    /// values. Without it the values are added next to the existing ones.
    pub fn merge(&mut self, other: &Attributes, replace: bool) {
        for (name, values) in other.iter() {
            if replace {
                self.values.insert(name.to_string(), Vec::new());
            }
            for value in values {
                self.add(name, value.clone());
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.add(name, value);
        }
        attributes
    }
}
