//! Statement execution against an attribute store.
//!
//! [`Connection`] owns the store handle. Statements are plain data: the
//! connection finalizes their bindings, translates emulated INSERT, UPDATE
//! and DELETE statements into attribute calls, and runs SELECT statements
//! natively, hydrating the results into models.

use crate::connection::params::ConnectionParams;
use crate::connection::session::Session;
use crate::error::{ConnectionError, QueryError, StoreError};
use crate::query::lexer::LexMode;
use crate::query::results::{hydrate, hydrate_all, DynModel, Model, ModelRegistry, Records};
use crate::query::statement::{Parameter, Statement, StatementType};
use crate::query::translate::{
    key_selection_query, parse_mutation, simplify, DeleteIntent, InsertIntent, Mutation, Target,
    UpdateIntent,
};
use crate::transport::{AttributeStore, Item, SelectOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Shared runtime for the blocking API.
///
/// Built on first use. Blocking methods must not be called from inside
/// another tokio runtime.
fn blocking_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime for blocking operations")
    })
}

fn execution_failed(err: StoreError) -> QueryError {
    QueryError::ExecutionFailed(err.to_string())
}

/// Connection to a SimpleDB-style attribute store.
///
/// # Consistency
///
/// UPDATE and DELETE statements with a general WHERE clause first collect
/// the matching keys, then write each key separately. They are not atomic:
/// a failure part way leaves earlier keys written, and re-running the
/// statement is safe.
///
/// # Example
///
/// ```
/// use simpledb_record::{Connection, ConnectionParams, MemoryStore, Record, Statement};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = Connection::open(MemoryStore::new(), ConnectionParams::default())?;
///
/// let mut insert = Statement::new("INSERT INTO cars (brand, doors) VALUES (:brand, :doors)");
/// insert.bind_value(":brand", "Ford")?.bind_value(":doors", 2)?;
/// conn.execute_statement(&mut insert).await?;
///
/// let key = conn.last_insert_id().unwrap_or_default().to_string();
/// let mut select = Statement::new("SELECT * FROM cars WHERE itemName() = :key");
/// select.bind_value(":key", key)?;
/// let car: Option<Record> = conn.fetch_into(&mut select).await?;
/// assert_eq!(car.unwrap().attributes.get("brand"), Some("Ford"));
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    /// Store handle (owned by Connection)
    store: Arc<Mutex<dyn AttributeStore>>,
    session: Session,
    params: ConnectionParams,
    /// Source of surrogate keys
    rng: StdRng,
}

impl Connection {
    /// Open a connection over `store`.
    ///
    /// # Arguments
    ///
    /// * `store` - Attribute store backend
    /// * `params` - Connection parameters
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::InvalidParameter` if `params` does not validate.
    pub fn open<S>(store: S, params: ConnectionParams) -> Result<Self, ConnectionError>
    where
        S: AttributeStore + 'static,
    {
        Self::from_shared(Arc::new(Mutex::new(store)), params)
    }

    /// Open a connection over a store handle shared with the caller.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::InvalidParameter` if `params` does not validate.
    pub fn from_shared(
        store: Arc<Mutex<dyn AttributeStore>>,
        params: ConnectionParams,
    ) -> Result<Self, ConnectionError> {
        params.validate()?;
        let rng = match params.key_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!(
            endpoint = params.endpoint.as_deref().unwrap_or("memory"),
            consistent_read = params.consistent_read,
            "opened connection"
        );
        Ok(Self {
            store,
            session: Session::new(),
            params,
            rng,
        })
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> Arc<Mutex<dyn AttributeStore>> {
        Arc::clone(&self.store)
    }

    /// Key used by the most recent INSERT on this connection.
    pub fn last_insert_id(&self) -> Option<&str> {
        self.session.last_insert_id()
    }

    // ========================================================================
    // Statement Creation
    // ========================================================================

    /// Create a new statement for `sql`.
    pub fn create_statement(&self, sql: impl Into<String>) -> Statement {
        Statement::new(sql)
    }

    // ========================================================================
    // Statement Execution Methods
    // ========================================================================

    /// Execute a statement.
    ///
    /// Deferred bindings are resolved first. INSERT, UPDATE and DELETE are
    /// translated into attribute calls; a SELECT is only finalized, use the
    /// fetch methods to read its results.
    ///
    /// # Arguments
    ///
    /// * `stmt` - Statement to execute
    ///
    /// # Returns
    ///
    /// `true` once the statement has been applied.
    ///
    /// # Errors
    ///
    /// - `QueryError::UnknownQueryType` if the statement is not INSERT,
    ///   UPDATE, DELETE or SELECT
    /// - `QueryError::ParseFailure` if the statement cannot be translated
    /// - `QueryError::KeyGenerationExhausted` if no free key is found
    /// - `QueryError::ExecutionFailed` if the store rejects a call
    /// - `QueryError::Timeout` if a store call does not finish in time
    pub async fn execute_statement(&mut self, stmt: &mut Statement) -> Result<bool, QueryError> {
        self.session.increment_statement_count();
        stmt.finalize()?;

        let statement_type = stmt.query_type().ok_or_else(|| unknown_query_type(stmt))?;
        if statement_type == StatementType::Select {
            debug!(sql = stmt.sql(), "SELECT finalized without dispatch");
            return Ok(true);
        }

        let sql = simplify(stmt.sql(), LexMode::Emulated);
        let mutation = parse_mutation(&sql)?;
        debug!(%statement_type, domain = mutation.domain(), "dispatching emulated statement");

        match mutation {
            Mutation::Insert(intent) => self.insert(intent).await?,
            Mutation::Update(intent) => self.update(intent).await?,
            Mutation::Delete(intent) => self.delete(intent).await?,
        }
        Ok(true)
    }

    /// Bind `values` and execute the statement.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::ParameterBinding` if a placeholder is missing,
    /// otherwise the errors of [`execute_statement`](Self::execute_statement).
    pub async fn execute_with<I, N, P>(
        &mut self,
        stmt: &mut Statement,
        values: I,
    ) -> Result<bool, QueryError>
    where
        I: IntoIterator<Item = (N, P)>,
        N: AsRef<str>,
        P: Into<Parameter>,
    {
        for (name, value) in values {
            stmt.bind_value(name.as_ref(), value)?;
        }
        self.execute_statement(stmt).await
    }

    /// Execute SQL text without placeholders.
    ///
    /// # Errors
    ///
    /// See [`execute_statement`](Self::execute_statement).
    pub async fn execute(&mut self, sql: impl Into<String>) -> Result<bool, QueryError> {
        let mut stmt = Statement::new(sql);
        self.execute_statement(&mut stmt).await
    }

    /// Run a SELECT and return every matching item.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::FetchFailed` if the store rejects the query.
    pub async fn query(&mut self, sql: impl Into<String>) -> Result<Vec<Item>, QueryError> {
        let mut stmt = Statement::new(sql);
        let consistent_read = self.params.consistent_read;
        self.fetch_items(&mut stmt, consistent_read, false).await
    }

    // ========================================================================
    // Fetch Methods
    // ========================================================================

    /// Fetch the first item matching a SELECT into a `T`.
    ///
    /// The read is consistent if `T` demands it or the connection is
    /// configured for consistent reads.
    ///
    /// # Returns
    ///
    /// `None` if nothing matches.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::FetchFailed` carrying the query text if the store
    /// rejects the SELECT.
    pub async fn fetch_into<T: Model>(
        &mut self,
        stmt: &mut Statement,
    ) -> Result<Option<T>, QueryError> {
        let consistent_read = T::enforce_read_consistency() || self.params.consistent_read;
        let items = self.fetch_items(stmt, consistent_read, true).await?;
        Ok(items.into_iter().next().map(hydrate))
    }

    /// Fetch the first matching item as the model registered under `class`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::ClassNotFound` before touching the store if
    /// `class` is not registered, otherwise the errors of
    /// [`fetch_into`](Self::fetch_into).
    pub async fn fetch_into_class(
        &mut self,
        stmt: &mut Statement,
        registry: &ModelRegistry,
        class: &str,
    ) -> Result<Option<Box<dyn DynModel>>, QueryError> {
        let consistent_read =
            registry.enforce_read_consistency(class)? || self.params.consistent_read;
        let items = self.fetch_items(stmt, consistent_read, true).await?;
        items
            .into_iter()
            .next()
            .map(|item| registry.hydrate(class, item))
            .transpose()
    }

    /// Fetch every item matching a SELECT, following continuation tokens.
    ///
    /// # Returns
    ///
    /// Models keyed by item key in store order; empty if nothing matches.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::FetchFailed` if any page is rejected.
    pub async fn fetch_all_into<T: Model>(
        &mut self,
        stmt: &mut Statement,
    ) -> Result<Records<T>, QueryError> {
        let consistent_read = T::enforce_read_consistency() || self.params.consistent_read;
        let items = self.fetch_items(stmt, consistent_read, false).await?;
        Ok(hydrate_all(items))
    }

    /// Fetch every matching item as the model registered under `class`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::ClassNotFound` if `class` is not registered,
    /// otherwise the errors of [`fetch_all_into`](Self::fetch_all_into).
    pub async fn fetch_all_into_class(
        &mut self,
        stmt: &mut Statement,
        registry: &ModelRegistry,
        class: &str,
    ) -> Result<Records<Box<dyn DynModel>>, QueryError> {
        let consistent_read =
            registry.enforce_read_consistency(class)? || self.params.consistent_read;
        let items = self.fetch_items(stmt, consistent_read, false).await?;
        registry.hydrate_all(class, items)
    }

    // ========================================================================
    // Blocking Wrappers
    // ========================================================================

    /// Blocking version of [`execute_statement`](Self::execute_statement).
    ///
    /// # Errors
    ///
    /// Same as the async version.
    pub fn blocking_execute_statement(&mut self, stmt: &mut Statement) -> Result<bool, QueryError> {
        blocking_runtime().block_on(self.execute_statement(stmt))
    }

    /// Blocking version of [`fetch_into`](Self::fetch_into).
    ///
    /// # Errors
    ///
    /// Same as the async version.
    pub fn blocking_fetch_into<T: Model>(
        &mut self,
        stmt: &mut Statement,
    ) -> Result<Option<T>, QueryError> {
        blocking_runtime().block_on(self.fetch_into(stmt))
    }

    /// Blocking version of [`fetch_all_into`](Self::fetch_all_into).
    ///
    /// # Errors
    ///
    /// Same as the async version.
    pub fn blocking_fetch_all_into<T: Model>(
        &mut self,
        stmt: &mut Statement,
    ) -> Result<Records<T>, QueryError> {
        blocking_runtime().block_on(self.fetch_all_into(stmt))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    async fn insert(&mut self, intent: InsertIntent) -> Result<(), QueryError> {
        let InsertIntent {
            domain,
            key,
            attributes,
        } = intent;
        let key = match key {
            Some(key) => key,
            None => self.generate_key(&domain).await?,
        };

        self.store_call(
            async {
                self.store
                    .lock()
                    .await
                    .put_attributes(&domain, &key, &attributes, true)
                    .await
            },
        )
        .await?
        .map_err(execution_failed)?;

        debug!(domain = %domain, key = %key, attributes = attributes.len(), "inserted item");
        self.session.set_last_insert_id(key);
        Ok(())
    }

    async fn update(&mut self, intent: UpdateIntent) -> Result<(), QueryError> {
        let UpdateIntent {
            domain,
            target,
            attributes,
            removed,
        } = intent;
        let keys = self.resolve_target(&domain, target).await?;

        for key in &keys {
            if !attributes.is_empty() {
                self.store_call(
                    async {
                        self.store
                            .lock()
                            .await
                            .put_attributes(&domain, key, &attributes, true)
                            .await
                    },
                )
                .await?
                .map_err(execution_failed)?;
            }
            if !removed.is_empty() {
                self.store_call(
                    async {
                        match self
                            .store
                            .lock()
                            .await
                            .delete_attributes(&domain, key, Some(removed.as_slice()))
                            .await
                        {
                            Err(StoreError::NoSuchDomain(_)) => Ok(()),
                            other => other,
                        }
                    },
                )
                .await?
                .map_err(execution_failed)?;
            }
        }

        debug!(domain = %domain, items = keys.len(), "updated items");
        Ok(())
    }

    async fn delete(&mut self, intent: DeleteIntent) -> Result<(), QueryError> {
        let DeleteIntent { domain, target } = intent;

        if let Target::Item(key) = &target {
            self.store_call(
                async {
                    match self
                        .store
                        .lock()
                        .await
                        .delete_attributes(&domain, key, None)
                        .await
                    {
                        Err(StoreError::NoSuchDomain(_)) => Ok(()),
                        other => other,
                    }
                },
            )
            .await?
            .map_err(execution_failed)?;
            debug!(domain = %domain, key = %key, "deleted item");
            return Ok(());
        }

        let keys = self.resolve_target(&domain, target).await?;
        for batch in keys.chunks(self.params.delete_batch_size) {
            self.store_call(
                async {
                    self.store
                        .lock()
                        .await
                        .batch_delete_attributes(&domain, batch)
                        .await
                },
            )
            .await?
            .map_err(execution_failed)?;
        }

        debug!(domain = %domain, items = keys.len(), "deleted items");
        Ok(())
    }

    /// Keys a mutation applies to.
    ///
    /// Predicates are resolved with consistent reads, so items written just
    /// before are included. A missing domain has no keys.
    async fn resolve_target(
        &self,
        domain: &str,
        target: Target,
    ) -> Result<Vec<String>, QueryError> {
        let predicate = match target {
            Target::Item(key) => return Ok(vec![key]),
            Target::Matching(predicate) => predicate,
        };

        let query = key_selection_query(domain, predicate.as_deref(), self.params.select_limit);
        match self.select_pages(&query, true, false).await? {
            Ok(items) => Ok(items.into_iter().map(|item| item.name).collect()),
            Err(StoreError::NoSuchDomain(_)) => Ok(Vec::new()),
            Err(e) => Err(execution_failed(e)),
        }
    }

    /// Draw a surrogate key not yet used in `domain`.
    async fn generate_key(&mut self, domain: &str) -> Result<String, QueryError> {
        let attempts = self.params.key_retry_limit;

        for attempt in 1..=attempts {
            let candidate = self.rng.gen_range(1..=self.params.key_space).to_string();
            let existing = self
                .store_call(
                    async {
                        match self
                            .store
                            .lock()
                            .await
                            .get_attributes(domain, &candidate, true)
                            .await
                        {
                            Err(StoreError::NoSuchDomain(_)) => Ok(None),
                            other => other,
                        }
                    },
                )
                .await?
                .map_err(execution_failed)?;

            if existing.is_none() {
                trace!(domain, key = %candidate, attempt, "generated surrogate key");
                return Ok(candidate);
            }
            warn!(domain, key = %candidate, attempt, "surrogate key collision");
        }

        Err(QueryError::KeyGenerationExhausted {
            domain: domain.to_string(),
            attempts,
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Finalize a SELECT and read its items.
    ///
    /// With `first_only` reading stops at the first page holding an item.
    async fn fetch_items(
        &mut self,
        stmt: &mut Statement,
        consistent_read: bool,
        first_only: bool,
    ) -> Result<Vec<Item>, QueryError> {
        self.session.increment_statement_count();
        stmt.finalize()?;

        match stmt.query_type() {
            Some(StatementType::Select) => {}
            Some(other) => {
                return Err(QueryError::ParseFailure {
                    message: format!("expected a SELECT statement, found {}", other),
                    query: stmt.sql().to_string(),
                })
            }
            None => return Err(unknown_query_type(stmt)),
        }

        let sql = simplify(stmt.sql(), LexMode::Native);
        debug!(sql = %sql, consistent_read, "fetching");

        self.select_pages(&sql, consistent_read, first_only)
            .await?
            .map_err(|e| QueryError::FetchFailed {
                message: e.to_string(),
                query: stmt.sql().to_string(),
            })
    }

    /// Run a SELECT, following continuation tokens.
    ///
    /// The outer error is a timeout, the inner one the store's rejection.
    async fn select_pages(
        &self,
        query: &str,
        consistent_read: bool,
        first_only: bool,
    ) -> Result<Result<Vec<Item>, StoreError>, QueryError> {
        let mut items = Vec::new();
        let mut options = SelectOptions::new(consistent_read);
        let mut seen = HashSet::new();

        loop {
            let page = match self
                .store_call(async { self.store.lock().await.select(query, &options).await })
                .await?
            {
                Ok(page) => page,
                Err(e) => return Ok(Err(e)),
            };
            trace!(items = page.items.len(), more = page.next_token.is_some(), "select page");
            items.extend(page.items);

            if first_only && !items.is_empty() {
                break;
            }
            match page.next_token {
                Some(token) if !seen.insert(token.clone()) => {
                    warn!(query, token = %token, "store repeated a continuation token");
                    break;
                }
                Some(token) => options.next_token = Some(token),
                None => break,
            }
        }
        Ok(Ok(items))
    }

    /// Run a store call under the query timeout.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Timeout` if the call does not finish in time; the
    /// store's own result is passed through.
    async fn store_call<T, F>(&self, call: F) -> Result<Result<T, StoreError>, QueryError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.session.increment_store_calls();
        timeout(self.params.query_timeout, call).await.map_err(|_| {
            warn!(timeout_ms = self.params.query_timeout_ms(), "store call timed out");
            QueryError::Timeout {
                timeout_ms: self.params.query_timeout_ms(),
            }
        })
    }
}

fn unknown_query_type(stmt: &Statement) -> QueryError {
    let leading = stmt.sql().split_whitespace().next().unwrap_or_default();
    QueryError::UnknownQueryType(leading.to_string())
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("params", &self.params)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
