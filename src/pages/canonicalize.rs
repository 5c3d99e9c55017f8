//! URL canonicalization for capture index lookups.
//!
//! The capture index is keyed by SURT form (Sort-friendly URI Reordering
//! Transform): `http://www.Example.com:8080/Path?b=2&a=1#top` becomes
//! `com,example:8080)/path?a=1&b=2`.

use thiserror::Error;
use url::Url;

/// Canonicalization failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonError {
    /// The input is not a URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The URL has no host.
    #[error("url has no host: {0}")]
    MissingHost(String),
}

/// Convert a URL to its SURT key.
///
/// Scheme, fragment, userinfo and default port are dropped, a leading
/// `www`/`www<N>` label is removed, host labels are reversed, query
/// arguments are sorted and the whole key is lowercased. URLs without a
/// scheme are read as `http://`.
///
/// # Examples
///
/// ```
/// use archivist::pages::canonicalize;
///
/// assert_eq!(
///     canonicalize("https://www.Example.com/About?b=2&a=1").unwrap(),
///     "com,example)/about?a=1&b=2"
/// );
/// ```
pub fn canonicalize(url: &str) -> Result<String, CanonError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CanonError::InvalidUrl(url.to_string()));
    }

    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{trimmed}"))
            .map_err(|_| CanonError::InvalidUrl(url.to_string()))?,
        Err(_) => return Err(CanonError::InvalidUrl(url.to_string())),
    };

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| CanonError::MissingHost(url.to_string()))?
        .to_lowercase();

    let mut key = surt_host(&host);
    if let Some(port) = parsed.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push(')');
    key.push_str(&parsed.path().to_lowercase());

    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        let query = query.to_lowercase();
        let mut args: Vec<&str> = query.split('&').collect();
        args.sort_unstable();
        key.push('?');
        key.push_str(&args.join("&"));
    }

    Ok(key)
}

/// `www2.sub.example.com` -> `com,example,sub`
fn surt_host(host: &str) -> String {
    let host = strip_www(host.trim_end_matches('.'));
    let mut labels: Vec<&str> = host.split('.').collect();
    labels.reverse();
    labels.join(",")
}

fn strip_www(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix("www") {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if let Some(stripped) = rest[digits..].strip_prefix('.') {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    host
}

/// Lexicographic search range for an exact URL match.
///
/// Index lines look like `<key> <timestamp> <json>`; every line for `key`
/// sorts between `key` (inclusive) and `key!` (exclusive).
pub fn exact_search_range(url: &str) -> Result<(String, String), CanonError> {
    let key = canonicalize(url)?;
    let end = format!("{key}!");
    Ok((key, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(canonicalize("http://example.com/").unwrap(), "com,example)/");
        assert_eq!(canonicalize("http://example.com").unwrap(), "com,example)/");
        assert_eq!(
            canonicalize("https://example.com/a/b.html").unwrap(),
            "com,example)/a/b.html"
        );
    }

    #[test]
    fn test_www_stripped() {
        assert_eq!(
            canonicalize("http://www.example.com/").unwrap(),
            "com,example)/"
        );
        assert_eq!(
            canonicalize("http://www2.example.com/").unwrap(),
            "com,example)/"
        );
        assert_eq!(
            canonicalize("http://wwwx.example.com/").unwrap(),
            "com,example,wwwx)/"
        );
    }

    #[test]
    fn test_case_and_query() {
        assert_eq!(
            canonicalize("http://Example.COM/Path?B=2&a=1#frag").unwrap(),
            "com,example)/path?a=1&b=2"
        );
    }

    #[test]
    fn test_ports() {
        assert_eq!(
            canonicalize("http://example.com:80/").unwrap(),
            "com,example)/"
        );
        assert_eq!(
            canonicalize("http://example.com:8080/x").unwrap(),
            "com,example:8080)/x"
        );
    }

    #[test]
    fn test_scheme_optional() {
        assert_eq!(
            canonicalize("example.com/page").unwrap(),
            "com,example)/page"
        );
    }

    #[test]
    fn test_invalid() {
        assert!(canonicalize("").is_err());
        assert!(canonicalize("   ").is_err());
        assert!(canonicalize("http://").is_err());
        assert!(canonicalize("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_exact_search_range() {
        let (start, end) = exact_search_range("http://example.com/").unwrap();
        assert_eq!(start, "com,example)/");
        assert_eq!(end, "com,example)/!");
    }
}
