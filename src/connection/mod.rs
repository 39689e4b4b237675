//! Connection management.
//!
//! This module provides connection parameter parsing, per-connection session
//! state and the statement executor.

mod executor;
pub mod params;
pub mod session;

pub use executor::Connection;
pub use params::{ConnectionBuilder, ConnectionParams};
pub use session::Session;
