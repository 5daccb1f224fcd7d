//! blockcheck - Ad and tracker blocking tester.
//!
//! This crate provides both a library API and a CLI tool for:
//! - Probing domains over DNS (sinkholes, empty or negative answers)
//! - Probing domains over HTTPS (blocklist status codes)
//! - Running those probes over a domain list with bounded concurrency
//! - Summarising results per category, with a recommendation
//!
//! # Library Usage
//!
//! ```ignore
//! use blockcheck::{BlockTester, ConfigLoader, Report, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! let tester = BlockTester::new(&Settings::default())?;
//! let token = CancellationToken::new();
//! let results = tester.run(&token, &ConfigLoader::default_domains(), None).await;
//! let report = Report::build(&results, &ConfigLoader::default_categories(), None);
//! println!("{}", report.recommendation);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Test the default domain list with the system resolver
//! blockcheck
//!
//! # Custom list, specific DNS server, more workers
//! blockcheck run --domains domains.json --dns 1.1.1.1 --workers 10
//!
//! # Single domain
//! blockcheck check doubleclick.net
//!
//! # Show the list that would be tested
//! blockcheck list
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod probe;
pub mod report;

// Re-export commonly used types
pub use cli::{Cli, Commands, OutputFormat};
pub use config::{CategoryConfig, ConfigLoader};
pub use engine::{BlockTester, Settings};
pub use error::{Error, ProbeError, Result};
pub use pool::WorkerPool;
pub use probe::types::{ClassifiedResult, DomainEntry, ProbeResult, ProbeStatus};
pub use probe::{DnsProber, HttpProber};
pub use report::{group_by_category, recommend, CategoryGroup, Report, Stats};
