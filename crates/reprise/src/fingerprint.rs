//! Request fingerprints: the key recorded responses are matched by.
//!
//! A fingerprint is built from the method, the canonical URL, the headers whose
//! names match the [`HeaderMatchList`], and the raw body bytes. Headers outside the
//! match list do not take part, so two requests that only differ in, say,
//! `user-agent` replay the same fixture.

use crate::error::{ReplayError, Result};
use crate::message::{default_port, Request};
use hyper::{HeaderMap, Uri};
use regex::{Regex, RegexBuilder};
use std::fmt::Write as _;

/// Header name patterns matched by default.
pub const DEFAULT_MATCH_HEADERS: &[&str] = &[
    "^accept",
    "^authorization",
    "^body",
    "^content-type",
    "^host",
    "^if-",
    "^x-",
];

/// Matching key for recorded responses
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Fingerprint {
    pub method: String,
    pub url: String,
    /// Matched headers, lower-cased names sorted by name
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Fingerprint {
    /// Create fingerprint from already selected components
    pub fn new(method: &str, url: &str, headers: &[(String, String)], body: &[u8]) -> Self {
        let mut headers: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();
        // Stable sort keeps multi-valued headers in their original order
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers,
            body: body.to_vec(),
        }
    }

    /// Fingerprint a request with the given header selection.
    pub fn of(request: &Request, matchers: &HeaderMatchList) -> Self {
        Self::new(
            request.method.as_str(),
            &canonical_url(&request.uri),
            &matchers.select(&request.headers),
            &request.body_bytes(),
        )
    }

    /// Stable 16-digit hex digest, for log lines.
    pub fn digest(&self) -> String {
        let mut hash = Fnv64::new();
        hash.write(self.method.as_bytes());
        hash.write(&[0]);
        hash.write(self.url.as_bytes());
        hash.write(&[0]);
        for (name, value) in &self.headers {
            hash.write(name.as_bytes());
            hash.write(b":");
            hash.write(value.as_bytes());
            hash.write(&[0]);
        }
        hash.write(&self.body);
        format!("{:016x}", hash.finish())
    }
}

struct Fnv64(u64);

impl Fnv64 {
    fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// Canonical `scheme://host[:port]/path[?query]` form of a URI.
///
/// The scheme and host are lower-cased, the scheme's default port is dropped and
/// an empty path becomes `/`.
pub fn canonical_url(uri: &Uri) -> String {
    let scheme = uri.scheme_str().unwrap_or("http").to_ascii_lowercase();
    let host = uri.host().unwrap_or_default().to_ascii_lowercase();

    let mut url = format!("{scheme}://{host}");
    if let Some(port) = uri.port_u16() {
        if default_port(&scheme) != Some(port) {
            let _ = write!(url, ":{port}");
        }
    }

    let path = uri.path();
    url.push_str(if path.is_empty() { "/" } else { path });
    if let Some(query) = uri.query() {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Allow-list of header name patterns that take part in fingerprints.
#[derive(Debug, Clone)]
pub struct HeaderMatchList {
    patterns: Vec<Regex>,
}

impl Default for HeaderMatchList {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_MATCH_HEADERS
                .iter()
                .filter_map(|pattern| compile(pattern).ok())
                .collect(),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            ReplayError::Configuration(format!("Invalid header pattern '{pattern}': {e}"))
        })
}

impl HeaderMatchList {
    /// Build from regex patterns, matched case-insensitively against header names.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| compile(pattern.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Add one more pattern.
    pub fn push(&mut self, pattern: &str) -> Result<()> {
        self.patterns.push(compile(pattern)?);
        Ok(())
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(name))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    /// Headers whose names match, as lower-cased pairs in map order.
    pub fn select(&self, headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .filter(|(name, _)| self.matches(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    /// Keep only the pairs whose names match.
    pub fn retain(&self, headers: &[(String, String)]) -> Vec<(String, String)> {
        headers
            .iter()
            .filter(|(name, _)| self.matches(name))
            .cloned()
            .collect()
    }
}
