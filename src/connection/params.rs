//! Connection parameters.
//!
//! Parameters can be built fluently with [`ConnectionBuilder`], parsed from a
//! connection string, or deserialized from application configuration.
//!
//! Connection string format:
//!
//! ```text
//! simpledb://[endpoint][?consistent_read=true&key_retries=10&key_space=1000000
//!     &delete_batch_size=25&select_limit=100&query_timeout_ms=30000&key_seed=7]
//! ```

use crate::error::ConnectionError;
use crate::transport::{DEFAULT_SELECT_LIMIT, MAX_BATCH_DELETE_ITEMS, MAX_SELECT_LIMIT};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::time::Duration;

const SCHEME: &str = "simpledb://";

/// Default number of attempts to find a free surrogate key.
pub const DEFAULT_KEY_RETRY_LIMIT: u32 = 10;

/// Default upper bound of generated surrogate keys.
pub const DEFAULT_KEY_SPACE: u64 = 2_147_483_647;

/// Default timeout of a single store call.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of a [`Connection`](crate::connection::Connection).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Store endpoint, informational for the in-memory store
    pub endpoint: Option<String>,
    /// Force consistent reads for every fetch
    pub consistent_read: bool,
    /// Attempts to find a free surrogate key before giving up
    #[serde(alias = "key_retries")]
    pub key_retry_limit: u32,
    /// Surrogate keys are drawn from `1..=key_space`
    pub key_space: u64,
    /// Keys per batch delete call
    pub delete_batch_size: usize,
    /// Page size of key-selection queries
    pub select_limit: usize,
    /// Timeout of a single store call
    #[serde(rename = "query_timeout_ms", deserialize_with = "duration_from_millis")]
    pub query_timeout: Duration,
    /// Seed for surrogate key generation, random when unset
    pub key_seed: Option<u64>,
}

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            endpoint: None,
            consistent_read: false,
            key_retry_limit: DEFAULT_KEY_RETRY_LIMIT,
            key_space: DEFAULT_KEY_SPACE,
            delete_batch_size: MAX_BATCH_DELETE_ITEMS,
            select_limit: DEFAULT_SELECT_LIMIT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            key_seed: None,
        }
    }
}

fn invalid(parameter: &str, message: impl Into<String>) -> ConnectionError {
    ConnectionError::InvalidParameter {
        parameter: parameter.to_string(),
        message: message.into(),
    }
}

impl ConnectionParams {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Check that every value is within the range the store accepts.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::InvalidParameter` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.key_retry_limit == 0 {
            return Err(invalid("key_retry_limit", "must be at least 1"));
        }
        if self.key_space == 0 {
            return Err(invalid("key_space", "must be at least 1"));
        }
        if self.delete_batch_size == 0 || self.delete_batch_size > MAX_BATCH_DELETE_ITEMS {
            return Err(invalid(
                "delete_batch_size",
                format!("must be between 1 and {}", MAX_BATCH_DELETE_ITEMS),
            ));
        }
        if self.select_limit == 0 || self.select_limit > MAX_SELECT_LIMIT {
            return Err(invalid(
                "select_limit",
                format!("must be between 1 and {}", MAX_SELECT_LIMIT),
            ));
        }
        if self.query_timeout.is_zero() {
            return Err(invalid("query_timeout", "must be greater than zero"));
        }
        Ok(())
    }

    /// Timeout of a single store call in milliseconds.
    pub fn query_timeout_ms(&self) -> u64 {
        self.query_timeout.as_millis() as u64
    }
}

fn parse_value<T: FromStr>(parameter: &str, value: &str) -> Result<T, ConnectionError> {
    value
        .parse()
        .map_err(|_| invalid(parameter, format!("cannot parse '{}'", value)))
}

fn parse_bool(parameter: &str, value: &str) -> Result<bool, ConnectionError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(parameter, format!("cannot parse '{}'", value))),
    }
}

impl FromStr for ConnectionParams {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.trim().strip_prefix(SCHEME).ok_or_else(|| {
            ConnectionError::ParseError(format!("expected a {} connection string", SCHEME))
        })?;

        let (endpoint, query) = match rest.split_once('?') {
            Some((endpoint, query)) => (endpoint, Some(query)),
            None => (rest, None),
        };

        let mut builder = ConnectionBuilder::new();
        if !endpoint.is_empty() {
            builder = builder.endpoint(endpoint);
        }

        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ConnectionError::ParseError(format!("expected key=value, found '{}'", pair))
            })?;
            builder = match key {
                "consistent_read" => builder.consistent_read(parse_bool(key, value)?),
                "key_retries" | "key_retry_limit" => {
                    builder.key_retry_limit(parse_value(key, value)?)
                }
                "key_space" => builder.key_space(parse_value(key, value)?),
                "delete_batch_size" => builder.delete_batch_size(parse_value(key, value)?),
                "select_limit" => builder.select_limit(parse_value(key, value)?),
                "query_timeout_ms" => {
                    builder.query_timeout(Duration::from_millis(parse_value(key, value)?))
                }
                "key_seed" => builder.key_seed(parse_value(key, value)?),
                _ => {
                    return Err(ConnectionError::ParseError(format!(
                        "unknown parameter '{}'",
                        key
                    )))
                }
            };
        }

        builder.build()
    }
}

/// Fluent builder for [`ConnectionParams`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    params: ConnectionParams,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.params.endpoint = Some(endpoint.to_string());
        self
    }

    /// Force consistent reads for every fetch.
    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.params.consistent_read = consistent_read;
        self
    }

    pub fn key_retry_limit(mut self, limit: u32) -> Self {
        self.params.key_retry_limit = limit;
        self
    }

    pub fn key_space(mut self, key_space: u64) -> Self {
        self.params.key_space = key_space;
        self
    }

    pub fn delete_batch_size(mut self, size: usize) -> Self {
        self.params.delete_batch_size = size;
        self
    }

    pub fn select_limit(mut self, limit: usize) -> Self {
        self.params.select_limit = limit;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.params.query_timeout = timeout;
        self
    }

    /// Seed surrogate key generation for reproducible keys.
    pub fn key_seed(mut self, seed: u64) -> Self {
        self.params.key_seed = Some(seed);
        self
    }

    /// Validate and return the parameters.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::InvalidParameter` if a value is out of range.
    pub fn build(self) -> Result<ConnectionParams, ConnectionError> {
        self.params.validate()?;
        Ok(self.params)
    }
}
