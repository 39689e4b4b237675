//! In-process SimpleDB emulation.
//!
//! [`MemoryStore`] keeps domains in memory and evaluates SELECT expressions
//! with [`SelectQuery`]. It can emulate eventual consistency: in eventual
//! mode, reads without `consistent_read` see a snapshot that only catches up
//! with the latest writes when [`MemoryStore::settle`] is called.

use crate::error::StoreError;
use crate::transport::protocol::{
    AttributeStore, Item, SelectOptions, SelectPage, DEFAULT_SELECT_LIMIT,
    MAX_BATCH_DELETE_ITEMS, MAX_SELECT_LIMIT,
};
use crate::transport::select::{Projection, SelectQuery};
use crate::types::Attributes;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::BTreeMap;

type Domain = IndexMap<String, Attributes>;
type Domains = BTreeMap<String, Domain>;

const TOKEN_PREFIX: &str = "mem:";

/// Number of calls made against a [`MemoryStore`], per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub puts: usize,
    pub gets: usize,
    pub deletes: usize,
    pub batch_deletes: usize,
    pub selects: usize,
}

/// In-memory attribute store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    latest: Domains,
    /// Snapshot served to non-consistent reads, `None` in strong mode
    visible: Option<Domains>,
    page_size: usize,
    stats: StoreStats,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store where every read sees the latest write.
    pub fn new() -> Self {
        Self {
            latest: Domains::new(),
            visible: None,
            page_size: DEFAULT_SELECT_LIMIT,
            stats: StoreStats::default(),
        }
    }

    /// Create a store that serves stale data to non-consistent reads.
    pub fn eventual() -> Self {
        Self {
            visible: Some(Domains::new()),
            ..Self::new()
        }
    }

    /// Set the largest page a SELECT returns.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_SELECT_LIMIT);
        self
    }

    /// Make every write so far visible to non-consistent reads.
    pub fn settle(&mut self) {
        if let Some(visible) = self.visible.as_mut() {
            *visible = self.latest.clone();
        }
    }

    /// Create an empty domain. Existing domains are left untouched.
    pub fn create_domain(&mut self, domain: &str) {
        self.latest.entry(domain.to_string()).or_default();
        if let Some(visible) = self.visible.as_mut() {
            visible.entry(domain.to_string()).or_default();
        }
    }

    /// Names of all domains.
    pub fn domains(&self) -> Vec<&str> {
        self.latest.keys().map(String::as_str).collect()
    }

    /// Number of items in `domain`, zero if it does not exist.
    pub fn item_count(&self, domain: &str) -> usize {
        self.latest.get(domain).map_or(0, IndexMap::len)
    }

    /// Latest attributes of an item.
    pub fn item(&self, domain: &str, item_name: &str) -> Option<&Attributes> {
        self.latest.get(domain)?.get(item_name)
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    fn view(&self, consistent_read: bool) -> &Domains {
        match &self.visible {
            Some(visible) if !consistent_read => visible,
            _ => &self.latest,
        }
    }

    fn domain_mut(&mut self, domain: &str) -> Result<&mut Domain, StoreError> {
        self.latest
            .get_mut(domain)
            .ok_or_else(|| StoreError::NoSuchDomain(domain.to_string()))
    }

    fn run_select(&self, query: &str, options: &SelectOptions) -> Result<SelectPage, StoreError> {
        let select = SelectQuery::parse(query)?;
        let empty = Domain::new();
        let domain = match self.view(options.consistent_read).get(&select.domain) {
            Some(domain) => domain,
            // created since the last settle
            None if self.latest.contains_key(&select.domain) => &empty,
            None => return Err(StoreError::NoSuchDomain(select.domain.clone())),
        };

        let mut matching: Vec<(&String, &Attributes)> = domain
            .iter()
            .filter(|(name, attributes)| select.matches(name, attributes))
            .collect();

        if select.projection == Projection::Count {
            let mut count = Attributes::new();
            count.set("Count", matching.len().to_string());
            return Ok(SelectPage {
                items: vec![Item::new("Domain", count)],
                next_token: None,
            });
        }

        if select.order_by.is_some() {
            matching.sort_by(|a, b| select.compare((a.0.as_str(), a.1), (b.0.as_str(), b.1)));
        }

        let offset = match &options.next_token {
            Some(token) => decode_token(token)
                .filter(|offset| *offset <= matching.len())
                .ok_or_else(|| invalid_token(token))?,
            None => 0,
        };
        let page_len = select
            .limit
            .unwrap_or(DEFAULT_SELECT_LIMIT)
            .clamp(1, MAX_SELECT_LIMIT)
            .min(self.page_size);

        let end = offset.saturating_add(page_len).min(matching.len());
        let items = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|(name, attributes)| Item::new(name.as_str(), select.project(attributes)))
            .collect();

        let next_token = (end < matching.len()).then(|| encode_token(end));
        Ok(SelectPage { items, next_token })
    }
}

fn encode_token(offset: usize) -> String {
    format!("{}{:08x}", TOKEN_PREFIX, offset)
}

fn decode_token(token: &str) -> Option<usize> {
    token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|hex| usize::from_str_radix(hex, 16).ok())
}

fn invalid_token(token: &str) -> StoreError {
    StoreError::Rejected {
        code: "InvalidNextToken".to_string(),
        message: format!("The specified next token is not valid: {}", token),
    }
}

#[async_trait]
impl AttributeStore for MemoryStore {
    async fn put_attributes(
        &mut self,
        domain: &str,
        item_name: &str,
        attributes: &Attributes,
        replace: bool,
    ) -> Result<(), StoreError> {
        self.stats.puts += 1;
        if attributes.is_empty() {
            return Err(StoreError::Rejected {
                code: "MissingParameter".to_string(),
                message: "No attributes for item".to_string(),
            });
        }

        let item = self
            .latest
            .entry(domain.to_string())
            .or_default()
            .entry(item_name.to_string())
            .or_default();
        item.merge(attributes, replace);
        Ok(())
    }

    async fn get_attributes(
        &mut self,
        domain: &str,
        item_name: &str,
        consistent_read: bool,
    ) -> Result<Option<Attributes>, StoreError> {
        self.stats.gets += 1;
        let view = self.view(consistent_read);
        match view.get(domain) {
            Some(items) => Ok(items.get(item_name).cloned()),
            None if consistent_read || !self.latest.contains_key(domain) => {
                Err(StoreError::NoSuchDomain(domain.to_string()))
            }
            None => Ok(None),
        }
    }

    async fn delete_attributes(
        &mut self,
        domain: &str,
        item_name: &str,
        attribute_names: Option<&[String]>,
    ) -> Result<(), StoreError> {
        self.stats.deletes += 1;
        let items = self.domain_mut(domain)?;

        match attribute_names {
            None => {
                items.shift_remove(item_name);
            }
            Some(names) => {
                if let Some(attributes) = items.get_mut(item_name) {
                    for name in names {
                        attributes.remove(name);
                    }
                    if attributes.is_empty() {
                        items.shift_remove(item_name);
                    }
                }
            }
        }
        Ok(())
    }

    async fn batch_delete_attributes(
        &mut self,
        domain: &str,
        item_names: &[String],
    ) -> Result<(), StoreError> {
        self.stats.batch_deletes += 1;
        if item_names.len() > MAX_BATCH_DELETE_ITEMS {
            return Err(StoreError::Rejected {
                code: "NumberSubmittedItemsExceeded".to_string(),
                message: format!(
                    "Too many items in a single call. Up to {} items per call allowed.",
                    MAX_BATCH_DELETE_ITEMS
                ),
            });
        }

        let items = self.domain_mut(domain)?;
        for name in item_names {
            items.shift_remove(name);
        }
        Ok(())
    }

    async fn select(
        &mut self,
        query: &str,
        options: &SelectOptions,
    ) -> Result<SelectPage, StoreError> {
        self.stats.selects += 1;
        self.run_select(query, options)
    }
}
