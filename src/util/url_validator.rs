use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during feed URL validation.
///
/// Validation always happens before any cache or network access, so each of
/// these surfaces to callers as a configuration problem.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL is empty or whitespace only.
    #[error("Feed URL is empty")]
    Empty,
    /// The URL string could not be parsed.
    #[error("Invalid URL")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL string for use as a feed source.
///
/// Rejects empty input, unparseable URLs and non-HTTP(S) schemes
/// (e.g. `file://`, `ftp://`). When `block_private_hosts` is set, localhost
/// and private IP ranges (RFC 1918, link-local, unique local IPv6) are
/// rejected as well, which keeps a publicly served proxy from being pointed
/// at internal services.
///
/// # Examples
///
/// ```
/// use feedjson::util::validate_feed_url;
///
/// let url = validate_feed_url("https://example.com/feed.xml", true).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("", false).is_err());
/// assert!(validate_feed_url("file:///etc/passwd", false).is_err());
/// assert!(validate_feed_url("http://192.168.1.1/feed", true).is_err());
/// assert!(validate_feed_url("http://192.168.1.1/feed", false).is_ok());
/// ```
pub fn validate_feed_url(url_str: &str, block_private_hosts: bool) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = Url::parse(trimmed)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if block_private_hosts {
        check_public_host(&url)?;
    }

    Ok(url)
}

fn check_public_host(url: &Url) -> Result<(), UrlValidationError> {
    let Some(host) = url.host_str() else {
        return Ok(());
    };

    if host == "localhost" {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml", true).is_ok());
        assert!(validate_feed_url("http://news.example.org/rss", true).is_ok());
    }

    #[test]
    fn test_empty_and_blank_rejected() {
        assert!(matches!(
            validate_feed_url("", false),
            Err(UrlValidationError::Empty)
        ));
        assert!(matches!(
            validate_feed_url("   \t", false),
            Err(UrlValidationError::Empty)
        ));
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let url = validate_feed_url("  https://example.com/rss  ", false).unwrap();
        assert_eq!(url.as_str(), "https://example.com/rss");
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(matches!(
            validate_feed_url("not a url", false),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd", false),
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "file"
        ));
        assert!(validate_feed_url("ftp://example.com", false).is_err());
    }

    #[test]
    fn test_localhost_allowed_unless_blocked() {
        assert!(validate_feed_url("http://127.0.0.1:8080/feed", false).is_ok());
        assert!(validate_feed_url("http://localhost/feed", true).is_err());
        assert!(validate_feed_url("http://127.0.0.1/feed", true).is_err());
        assert!(validate_feed_url("http://[::1]/feed", true).is_err());
    }

    #[test]
    fn test_private_ips_rejected_when_blocked() {
        assert!(validate_feed_url("http://192.168.1.1/feed", true).is_err());
        assert!(validate_feed_url("http://10.0.0.1:3000/feed", true).is_err());
        assert!(validate_feed_url("http://172.16.0.1/feed", true).is_err());
        assert!(validate_feed_url("http://169.254.1.1/feed", true).is_err());
        assert!(validate_feed_url("http://[fe80::1]/feed", true).is_err());
        assert!(validate_feed_url("http://0.0.0.0/feed", true).is_err());
    }
}
