use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// http(s) URL without a host, e.g. `https:///feed`
    #[error("URL has no host")]
    MissingHost,
    #[error("URL is empty")]
    Empty,
}

/// Validates a URL string for use as a feed source.
///
/// Accepts absolute `http`/`https` URLs with a host. Surrounding whitespace
/// is ignored. Local and private addresses are allowed so self-hosted feeds
/// work.
///
/// # Examples
///
/// ```
/// use lazyrss::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// assert!(validate_url("example.com/feed").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = Url::parse(trimmed)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}

/// Validates a URL before handing it to the system browser.
///
/// Same policy as [`validate_url`]; feed content is untrusted and must not
/// be able to launch `file:` or custom scheme handlers.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    validate_url(url_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://news.example.org").is_ok());
        assert!(validate_url("https://example.com:8443/feed.xml").is_ok());
    }

    #[test]
    fn test_whitespace_trimmed() {
        let url = validate_url("  https://example.com/rss \n").unwrap();
        assert_eq!(url.as_str(), "https://example.com/rss");
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_relative_and_empty_rejected() {
        assert!(matches!(
            validate_url("example.com/feed"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
        assert!(matches!(validate_url("   "), Err(UrlValidationError::Empty)));
    }

    #[test]
    fn test_local_hosts_allowed() {
        assert!(validate_url("http://localhost:8080/feed").is_ok());
        assert!(validate_url("http://127.0.0.1/feed").is_ok());
        assert!(validate_url("http://[::1]/feed").is_ok());
    }

    #[test]
    fn test_open_rejects_non_web_schemes() {
        assert!(validate_url_for_open("https://example.com/post").is_ok());
        assert!(validate_url_for_open("file:///home/user/.ssh/id_rsa").is_err());
        assert!(validate_url_for_open("mailto:someone@example.com").is_err());
    }
}
