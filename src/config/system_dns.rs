//! Discovery of the platform's configured DNS server.
//!
//! Only used to tell the user which resolver answered; probing with the
//! platform default never needs the address itself.

use std::path::Path;

/// Location of the resolver configuration on Unix systems.
const RESOLV_CONF: &str = "/etc/resolv.conf";

/// First configured nameserver as `ip:53`, if one can be found.
#[must_use]
pub fn detect() -> Option<String> {
    detect_from(Path::new(RESOLV_CONF))
}

/// Like [`detect`], reading an arbitrary resolv.conf-style file.
#[must_use]
pub fn detect_from(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_resolv_conf(&content),
        Err(e) => {
            tracing::debug!("cannot read {}: {e}", path.display());
            None
        }
    }
}

fn parse_resolv_conf(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => Some(super::loader::ensure_dns_port(addr)),
                _ => None,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_resolv_conf() {
        let content = "# generated\nsearch lan\n;nameserver 9.9.9.9\nnameserver 192.168.1.1\nnameserver 1.1.1.1\n";
        assert_eq!(parse_resolv_conf(content), Some("192.168.1.1:53".into()));
        assert_eq!(parse_resolv_conf("search lan\n"), None);
        assert_eq!(
            parse_resolv_conf("nameserver fe80::1\n"),
            Some("[fe80::1]:53".into())
        );
    }

    #[test]
    fn test_detect_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nameserver 10.0.0.1").unwrap();
        assert_eq!(detect_from(file.path()), Some("10.0.0.1:53".into()));
        assert_eq!(detect_from(Path::new("/nonexistent/resolv.conf")), None);
    }
}
