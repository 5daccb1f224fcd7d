//! Probe module.
//!
//! This module provides the per-domain probers and the rule that merges
//! their verdicts:
//! - DNS resolution checks (sinkholes, empty or negative answers)
//! - HTTPS checks (block pages and blocklist status codes)
//! - Core data types

pub mod classify;
pub mod dns;
pub mod http;
pub mod types;

pub use classify::{classify, merge};
pub use dns::DnsProber;
pub use http::HttpProber;
pub use types::*;
