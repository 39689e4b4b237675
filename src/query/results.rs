//! Hydration of store responses into model instances.
//!
//! The executor hands the materializer an ordered list of items. Each item
//! becomes one model: the type is constructed with `Default`, receives the
//! item key, then receives its attributes in bulk.

use crate::error::QueryError;
use crate::transport::Item;
use crate::types::Attributes;
use indexmap::IndexMap;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// A type that can be hydrated from a SimpleDB item.
///
/// # Example
///
/// ```
/// use simpledb_record::{Attributes, Model};
///
/// #[derive(Default)]
/// struct Car {
///     id: String,
///     brand: String,
///     doors: i64,
/// }
///
/// impl Model for Car {
///     fn enforce_read_consistency() -> bool {
///         true
///     }
///
///     fn set_item_name(&mut self, name: &str) {
///         self.id = name.to_string();
///     }
///
///     fn assign_attributes(&mut self, attributes: Attributes) {
///         self.brand = attributes.get("brand").unwrap_or_default().to_string();
///         self.doors = attributes.get_as("doors").unwrap_or_default();
///     }
/// }
/// ```
pub trait Model: Default + Send {
    /// Whether reads for this type must see the most recent write.
    fn enforce_read_consistency() -> bool {
        false
    }

    /// Receive the item key.
    fn set_item_name(&mut self, name: &str);

    /// Receive the item attributes.
    fn assign_attributes(&mut self, attributes: Attributes);
}

/// Hydrated models keyed by item key, in store response order.
pub type Records<T> = IndexMap<String, T>;

/// Build one model from an item.
pub fn hydrate<T: Model>(item: Item) -> T {
    let mut model = T::default();
    model.set_item_name(&item.name);
    model.assign_attributes(item.attributes);
    model
}

/// Build models for every item, keyed by item key.
pub fn hydrate_all<T: Model>(items: Vec<Item>) -> Records<T> {
    items
        .into_iter()
        .map(|item| (item.name.clone(), hydrate(item)))
        .collect()
}

/// Untyped item as a model: key plus raw attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub item_name: String,
    pub attributes: Attributes,
}

impl Model for Record {
    fn set_item_name(&mut self, name: &str) {
        self.item_name = name.to_string();
    }

    fn assign_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }
}

/// Object-safe view of a [`Model`], used for hydration by type name.
pub trait DynModel: Any + Send {
    fn set_item_name(&mut self, name: &str);
    fn assign_attributes(&mut self, attributes: Attributes);
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Model + 'static> DynModel for T {
    fn set_item_name(&mut self, name: &str) {
        Model::set_item_name(self, name);
    }

    fn assign_attributes(&mut self, attributes: Attributes) {
        Model::assign_attributes(self, attributes);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

struct ModelEntry {
    factory: fn() -> Box<dyn DynModel>,
    consistent_read: bool,
}

fn construct<T: Model + 'static>() -> Box<dyn DynModel> {
    Box::new(T::default())
}

/// Registry of model types addressable by name.
///
/// The model layer refers to target types by name; unknown names fail with
/// `QueryError::ClassNotFound`.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`, replacing any previous registration.
    pub fn register<T: Model + 'static>(&mut self, name: impl Into<String>) -> &mut Self {
        self.models.insert(
            name.into(),
            ModelEntry {
                factory: construct::<T>,
                consistent_read: T::enforce_read_consistency(),
            },
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Read-consistency requirement of the model registered as `name`.
    pub fn enforce_read_consistency(&self, name: &str) -> Result<bool, QueryError> {
        self.entry(name).map(|e| e.consistent_read)
    }

    fn entry(&self, name: &str) -> Result<&ModelEntry, QueryError> {
        self.models
            .get(name)
            .ok_or_else(|| QueryError::ClassNotFound(name.to_string()))
    }

    /// Hydrate `item` as the model registered under `name`.
    pub fn hydrate(&self, name: &str, item: Item) -> Result<Box<dyn DynModel>, QueryError> {
        let entry = self.entry(name)?;
        let mut model = (entry.factory)();
        model.set_item_name(&item.name);
        model.assign_attributes(item.attributes);
        Ok(model)
    }

    /// Hydrate every item as the model registered under `name`.
    pub fn hydrate_all(
        &self,
        name: &str,
        items: Vec<Item>,
    ) -> Result<Records<Box<dyn DynModel>>, QueryError> {
        let mut records = Records::with_capacity(items.len());
        for item in items {
            let key = item.name.clone();
            records.insert(key, self.hydrate(name, item)?);
        }
        Ok(records)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}
