//! Configuration module.
//!
//! This module provides the inputs of a run that come from outside the
//! probing engine: the domain list, the category display order, and the
//! DNS server address.

pub mod categories;
pub mod loader;
pub mod system_dns;

pub use categories::CategoryConfig;
pub use loader::{ensure_dns_port, ConfigLoader};
