//! Domain list and category configuration loader.
//!
//! This module provides functionality to load the domains under test and
//! their display order from files, default locations, or the built-in list.

use crate::config::categories::CategoryConfig;
use crate::error::{Error, Result};
use crate::probe::types::DomainEntry;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// DNS server used when a configured address cannot be understood.
pub const FALLBACK_DNS: &str = "8.8.8.8:53";

/// Standard DNS port.
const DNS_PORT: u16 = 53;

/// File name of the domain list in default locations.
const DOMAINS_FILE: &str = "domains.json";

/// File name of the category config in default locations.
const CATEGORIES_FILE: &str = "categories.json";

/// Built-in domains: (category, subcategory, domains).
const BUILT_IN: &[(&str, &str, &[&str])] = &[
    (
        "Advertising",
        "Google Ads",
        &[
            "googleads.g.doubleclick.net",
            "pagead2.googlesyndication.com",
            "doubleclick.net",
            "securepubads.g.doubleclick.net",
            "googlesyndication.com",
            "googleadservices.com",
            "googletagservices.com",
        ],
    ),
    ("Advertising", "Amazon", &["amazon-adsystem.com"]),
    ("Advertising", "Yahoo", &["ads.yahoo.com"]),
    ("Advertising", "Content Recommendation", &["outbrain.com", "taboola.com"]),
    (
        "Analytics",
        "Google Analytics",
        &[
            "analytics.google.com",
            "www.google-analytics.com",
            "googletagmanager.com",
        ],
    ),
    ("Analytics", "Audience Measurement", &["scorecardresearch.com"]),
    (
        "Social Media",
        "Facebook",
        &["ads.facebook.com", "connect.facebook.net"],
    ),
    ("Social Media", "Twitter", &["ads.twitter.com"]),
    ("Social Media", "Pinterest", &["ads.pinterest.com"]),
    ("Social Media", "LinkedIn", &["ads.linkedin.com"]),
];

/// Domain list and category configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a domain list, choosing the format from the file extension.
    ///
    /// - `.json`: a flat array of entries (objects or plain names), or a
    ///   grouped object `{category: {subcategory: [domain, ...]}}`
    /// - `.txt`: one domain per line, `#` starts a comment
    /// - `.csv`: the first column of each row
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty, the extension is unsupported,
    /// or the file cannot be read or parsed.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let domains = ConfigLoader::load_domains("data/domains.json")?;
    /// println!("{} domains", domains.len());
    /// ```
    pub fn load_domains<P: AsRef<Path>>(path: P) -> Result<Vec<DomainEntry>> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::config("Domain list path cannot be empty"));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let content = std::fs::read_to_string(path)?;
        let domains = match extension.as_str() {
            "json" | "jsonc" => parse_json_domains(&strip_line_comments(&content))?,
            "txt" => parse_txt_domains(&content),
            "csv" => parse_csv_domains(&content),
            _ => {
                return Err(Error::config(format!(
                    "Unsupported file type for {}: must be .txt, .csv, or .json",
                    path.display()
                )))
            }
        };

        debug!(path = %path.display(), count = domains.len(), "loaded domain list");
        Ok(domains)
    }

    /// Load the category order from a JSON file (`//` comments allowed).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_categories<P: AsRef<Path>>(path: P) -> Result<CategoryConfig> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&strip_line_comments(&content))?;
        Ok(config)
    }

    /// The built-in fallback domain list.
    #[must_use]
    pub fn default_domains() -> Vec<DomainEntry> {
        BUILT_IN
            .iter()
            .flat_map(|(category, subcategory, names)| {
                names
                    .iter()
                    .map(move |name| DomainEntry::categorized(*name, *category, *subcategory))
            })
            .collect()
    }

    /// Category order matching the built-in domain list.
    #[must_use]
    pub fn default_categories() -> CategoryConfig {
        let mut config = CategoryConfig::default();
        for (category, subcategory, _) in BUILT_IN {
            if !config.category_order.iter().any(|c| c == category) {
                config.category_order.push((*category).to_string());
            }
            config
                .subcategory_order
                .entry((*category).to_string())
                .or_default()
                .push((*subcategory).to_string());
        }
        config
    }

    /// Load the domain list from the default locations.
    ///
    /// Searches in the following order:
    /// 1. `$CONFIG_DIR/blockcheck/domains.json`
    /// 2. `domains.json` in current directory
    /// 3. the built-in list
    #[must_use]
    pub fn load_default_domains() -> Vec<DomainEntry> {
        Self::first_readable(DOMAINS_FILE, |p| Self::load_domains(p)).unwrap_or_else(|| {
            debug!("no domain list found, using built-in list");
            Self::default_domains()
        })
    }

    /// Load the category order from the default locations, falling back to
    /// the order of the built-in list.
    #[must_use]
    pub fn load_default_categories() -> CategoryConfig {
        Self::first_readable(CATEGORIES_FILE, |p| Self::load_categories(p))
            .unwrap_or_else(Self::default_categories)
    }

    /// Get the config directory path.
    #[must_use]
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blockcheck")
    }

    fn first_readable<T>(file: &str, load: impl Fn(&Path) -> Result<T>) -> Option<T> {
        [Self::config_dir().join(file), PathBuf::from(file)]
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| match load(path) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring {}: {e}", path.display());
                    None
                }
            })
    }
}

/// Normalise a DNS server address to `host:port`.
///
/// A bare IP or hostname gets port 53. Anything unusable falls back to
/// [`FALLBACK_DNS`].
#[must_use]
pub fn ensure_dns_port(addr: &str) -> String {
    let addr = addr.trim();
    if addr.is_empty() {
        return FALLBACK_DNS.to_string();
    }

    if let Ok(socket) = addr.parse::<SocketAddr>() {
        if socket.port() != 0 {
            return socket.to_string();
        }
    }

    if let Ok(ip) = addr.parse::<IpAddr>() {
        return SocketAddr::new(ip, DNS_PORT).to_string();
    }

    if let Some((host, port)) = addr.rsplit_once(':') {
        let port_ok = port.parse::<u16>().is_ok_and(|p| p > 0);
        if port_ok && is_valid_hostname(host) {
            return format!("{host}:{port}");
        }
        return FALLBACK_DNS.to_string();
    }

    if is_valid_hostname(addr) {
        return format!("{addr}:{DNS_PORT}");
    }

    FALLBACK_DNS.to_string()
}

/// Check RFC 1123 hostname syntax.
#[must_use]
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }

    let labels_ok = hostname.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    });
    if !labels_ok {
        return false;
    }

    // Single-label names with dashes are almost always typos.
    if !hostname.contains('.') && hostname.contains('-') {
        return hostname.len() <= 15 && hostname.matches('-').count() <= 2;
    }

    true
}

fn strip_line_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_json_domains(content: &str) -> Result<Vec<DomainEntry>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(DomainEntry::new(name)),
                other => Ok(serde_json::from_value(other)?),
            })
            .collect(),
        Value::Object(categories) => {
            let mut entries = Vec::new();
            for (category, subcategories) in categories {
                let Value::Object(subcategories) = subcategories else {
                    return Err(Error::config(format!(
                        "Category {category:?} must map subcategories to domain lists"
                    )));
                };
                for (subcategory, names) in subcategories {
                    let names: Vec<String> = serde_json::from_value(names)?;
                    entries.extend(
                        names
                            .into_iter()
                            .map(|name| DomainEntry::categorized(name, &category, &subcategory)),
                    );
                }
            }
            Ok(entries)
        }
        _ => Err(Error::config(
            "Domain list must be a JSON array or a grouped object",
        )),
    }
}

fn parse_txt_domains(content: &str) -> Vec<DomainEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(DomainEntry::new)
        .collect()
}

fn parse_csv_domains(content: &str) -> Vec<DomainEntry> {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| line.split(',').next())
        .map(|field| field.trim().trim_matches('"').trim())
        .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("domain"))
        .map(DomainEntry::new)
        .collect()
}
