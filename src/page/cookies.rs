//! Session cookies of the arena.
//!
//! Cookies are given as `name=value` pairs, either directly or in a file
//! holding a `Cookie:` header value (`a=1; b=2`, newlines allowed). They are
//! loaded into a [`Jar`] scoped to the arena host.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use reqwest::cookie::Jar;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Cookie
// ============================================================================

/// A session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
}

impl Cookie {
    /// Creates a new cookie with name and value.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parses a single `name=value` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if there is no `=` or the name is empty.
    pub fn parse(pair: &str) -> Result<Self> {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::config(format!("Cookie must be name=value: {pair}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::config(format!("Cookie name is empty: {pair}")));
        }
        Ok(Self::new(name, value.trim()))
    }

    /// Parses a `Cookie:` header value, skipping empty segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a malformed pair.
    pub fn parse_header(header: &str) -> Result<Vec<Self>> {
        header
            .split([';', '\n'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Reads cookies from a header file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Config`] if
    /// it is malformed.
    pub fn load_file(path: &Path) -> Result<Vec<Self>> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_header(&contents)
    }
}

// ============================================================================
// Jar
// ============================================================================

/// Builds a cookie jar with every cookie scoped to the host of `base_url`.
#[must_use]
pub fn build_jar(cookies: &[Cookie], base_url: &Url) -> Jar {
    let jar = Jar::default();
    add_to_jar(&jar, cookies, base_url);
    jar
}

/// Adds cookies to `jar`, replacing any of the same name.
pub fn add_to_jar(jar: &Jar, cookies: &[Cookie], base_url: &Url) {
    let domain = base_url.host_str().unwrap_or_default();

    for cookie in cookies {
        jar.add_cookie_str(
            &format!("{}={}; Domain={domain}; Path=/", cookie.name, cookie.value),
            base_url,
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use reqwest::cookie::CookieStore;

    #[test]
    fn test_parse_pair() {
        let cookie = Cookie::parse(" cf_clearance = abc=def ").expect("parse");
        assert_eq!(cookie, Cookie::new("cf_clearance", "abc=def"));
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        assert!(Cookie::parse("novalue").is_err());
        assert!(Cookie::parse("=value").is_err());
    }

    #[test]
    fn test_parse_header() {
        let cookies = Cookie::parse_header("a=1; b=2;\nc=3\n").expect("parse");
        assert_eq!(
            cookies,
            vec![Cookie::new("a", "1"), Cookie::new("b", "2"), Cookie::new("c", "3")]
        );
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "session=xyz; arena-auth=token").expect("write");

        let cookies = Cookie::load_file(file.path()).expect("load");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[1], Cookie::new("arena-auth", "token"));
    }

    #[test]
    fn test_build_jar_scopes_to_host() {
        let base = Url::parse("https://lmarena.ai").expect("url");
        let jar = build_jar(&[Cookie::new("session", "xyz")], &base);

        let endpoint = base
            .join("/nextjs-api/stream/post-to-evaluation/s")
            .expect("join");
        let header = jar.cookies(&endpoint).expect("cookie header");
        assert_eq!(header.to_str().expect("ascii"), "session=xyz");
    }
}
