//! Per-connection session state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// State carried by a connection between statements.
#[derive(Debug)]
pub struct Session {
    /// Key used by the most recent INSERT
    last_insert_id: Option<String>,
    statements: AtomicU64,
    store_calls: AtomicU64,
    opened_at: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            last_insert_id: None,
            statements: AtomicU64::new(0),
            store_calls: AtomicU64::new(0),
            opened_at: Instant::now(),
        }
    }

    /// Key of the most recent INSERT on this connection.
    pub fn last_insert_id(&self) -> Option<&str> {
        self.last_insert_id.as_deref()
    }

    pub(crate) fn set_last_insert_id(&mut self, key: impl Into<String>) {
        self.last_insert_id = Some(key.into());
    }

    /// Number of statements executed or fetched.
    pub fn statement_count(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_statement_count(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of round trips made to the store.
    pub fn store_call_count(&self) -> u64 {
        self.store_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_store_calls(&self) {
        self.store_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }
}
