//! Attribute store protocol.
//!
//! This is the capability set the executor needs from SimpleDB. Any backend
//! that can put, get, delete and select attribute bags by domain and item key
//! can sit behind a [`Connection`](crate::connection::Connection).

use crate::error::StoreError;
use crate::types::Attributes;
use async_trait::async_trait;

/// Largest number of items SimpleDB accepts in one batch delete.
pub const MAX_BATCH_DELETE_ITEMS: usize = 25;

/// Default and maximum page sizes of a SimpleDB SELECT.
pub const DEFAULT_SELECT_LIMIT: usize = 100;
pub const MAX_SELECT_LIMIT: usize = 2500;

/// A keyed attribute bag, as returned by SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// Item key, unique within its domain
    pub name: String,
    pub attributes: Attributes,
}

impl Item {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

/// Options for a single SELECT round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Whether the read must reflect every completed write
    pub consistent_read: bool,
    /// Continuation token from the previous page
    pub next_token: Option<String>,
}

impl SelectOptions {
    pub fn new(consistent_read: bool) -> Self {
        Self {
            consistent_read,
            next_token: None,
        }
    }

    pub fn with_next_token(mut self, token: Option<String>) -> Self {
        self.next_token = token;
        self
    }
}

/// One page of SELECT results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectPage {
    pub items: Vec<Item>,
    /// Token for the next page, `None` when the result is exhausted
    pub next_token: Option<String>,
}

/// Key-attribute store operations used by the executor.
///
/// Methods take `&mut self`; the connection serializes access through a
/// mutex.
#[async_trait]
pub trait AttributeStore: Send {
    /// Write attributes to an item, creating it if needed.
    ///
    /// With `replace` every named attribute loses its previous values first.
    async fn put_attributes(
        &mut self,
        domain: &str,
        item_name: &str,
        attributes: &Attributes,
        replace: bool,
    ) -> Result<(), StoreError>;

    /// Read all attributes of an item, `None` if it does not exist.
    async fn get_attributes(
        &mut self,
        domain: &str,
        item_name: &str,
        consistent_read: bool,
    ) -> Result<Option<Attributes>, StoreError>;

    /// Delete the named attributes of an item, or the whole item for `None`.
    async fn delete_attributes(
        &mut self,
        domain: &str,
        item_name: &str,
        attribute_names: Option<&[String]>,
    ) -> Result<(), StoreError>;

    /// Delete up to [`MAX_BATCH_DELETE_ITEMS`] whole items.
    async fn batch_delete_attributes(
        &mut self,
        domain: &str,
        item_names: &[String],
    ) -> Result<(), StoreError>;

    /// Run a SimpleDB SELECT expression and return one page.
    async fn select(
        &mut self,
        query: &str,
        options: &SelectOptions,
    ) -> Result<SelectPage, StoreError>;
}
