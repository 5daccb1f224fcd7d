//! Command-line interface (CLI) argument parsing module.
//!
//! This module provides CLI argument parsing using `clap`.
//! It supports three commands: a full block test run (the default), a
//! single-domain check, and listing the domains that would be tested.

use crate::engine::Settings;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// CLI argument parser using clap derive macro.
///
/// # Example
///
/// ```ignore
/// let cli = Cli::parse();
/// match cli.command {
///     Some(Commands::Check { domain, .. }) => { /* ... */ }
///     Some(Commands::Run(args)) | None => { /* full run */ }
///     _ => {}
/// }
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "blockcheck",
    version,
    about = "Ad and tracker blocking tester",
    long_about = "Checks whether advertising and tracking domains are filtered on the current network, via DNS or HTTP",
    infer_subcommands = true
)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for CLI commands.
///
/// This enum represents different output formats that can be used
/// when displaying test results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default, human-readable)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
    /// TSV format (tab-separated)
    Tsv,
}

impl OutputFormat {
    /// Get all available output format names.
    #[must_use]
    pub fn names() -> &'static [&'static str] {
        &["table", "json", "csv", "tsv"]
    }

    /// Field separator for the delimited formats.
    #[must_use]
    pub fn separator(self) -> Option<char> {
        match self {
            Self::Csv => Some(','),
            Self::Tsv => Some('\t'),
            Self::Table | Self::Json => None,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            _ => Err(format!(
                "Unknown format: {}. Valid options are: {:?}",
                s,
                Self::names()
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Tsv => write!(f, "tsv"),
        }
    }
}

/// Options shared by the commands that probe domains.
#[derive(Debug, Clone, Args)]
pub struct ProbeArgs {
    /// DNS server to query (IP, IP:port or hostname); system resolver when omitted
    #[arg(long, env = "BLOCKCHECK_DNS", default_value = "")]
    pub dns: String,

    /// Timeout per attempt in seconds
    #[arg(short, long, default_value = "5")]
    pub timeout: u64,

    /// HTTP retries after a failed request
    #[arg(long = "http-retries", default_value = "2")]
    pub http_retries: usize,
}

/// Arguments of the `run` command.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Domain list file (.json, .txt or .csv)
    #[arg(short, long)]
    pub domains: Option<PathBuf>,

    /// Category order file (JSON, `//` comments allowed)
    #[arg(short, long)]
    pub categories: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "5")]
    pub workers: usize,

    #[command(flatten)]
    pub probe: ProbeArgs,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            domains: None,
            categories: None,
            workers: crate::pool::DEFAULT_WORKERS,
            probe: ProbeArgs {
                dns: String::new(),
                timeout: 5,
                http_retries: 2,
            },
        }
    }
}

impl ProbeArgs {
    /// Engine settings for these options.
    #[must_use]
    pub fn settings(&self, workers: usize) -> Settings {
        Settings {
            dns_server: self.dns.trim().to_string(),
            timeout: Duration::from_secs(self.timeout.max(1)),
            http_retries: self.http_retries,
            workers,
        }
    }
}

/// Available commands for the blockcheck CLI.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Test every domain of the list (default)
    ///
    /// Probes each domain over DNS and HTTP with a bounded number of
    /// workers, then prints the results grouped by category with a summary.
    #[command(alias = "r")]
    Run(RunArgs),

    /// Test a single domain
    ///
    /// Runs the DNS and HTTP probes against one domain and prints the
    /// merged verdict.
    #[command(alias = "c")]
    Check {
        /// Domain to check
        domain: String,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// List the domains that would be tested
    #[command(alias = "l")]
    List {
        /// Domain list file (.json, .txt or .csv)
        #[arg(short, long)]
        domains: Option<PathBuf>,

        /// Category order file
        #[arg(short, long)]
        categories: Option<PathBuf>,
    },
}

/// Parse CLI arguments and return verbose flag.
///
/// # Returns
///
/// Returns a tuple of `(Cli, verbose)` where `verbose` indicates
/// whether verbose logging was enabled.
#[must_use]
pub fn parse_verbose() -> (Cli, bool) {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    (cli, verbose)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("csv".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("tsv".parse::<OutputFormat>(), Ok(OutputFormat::Tsv));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
        assert_eq!(OutputFormat::Tsv.to_string(), "tsv");
        assert_eq!(OutputFormat::Tsv.separator(), Some('\t'));
        assert_eq!(OutputFormat::Table.separator(), None);
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["blockcheck", "run"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.workers, 5);
        let settings = args.probe.settings(args.workers);
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.http_retries, 2);
    }

    #[test]
    fn test_check_with_options() {
        let cli = Cli::try_parse_from([
            "blockcheck",
            "--format",
            "json",
            "check",
            "doubleclick.net",
            "--dns",
            "1.1.1.1",
            "--timeout",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Some(Commands::Check { domain, probe }) => {
                assert_eq!(domain, "doubleclick.net");
                assert_eq!(probe.dns, "1.1.1.1");
                assert_eq!(probe.timeout, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_command_is_allowed() {
        let cli = Cli::try_parse_from(["blockcheck", "-q"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.quiet);
    }
}
