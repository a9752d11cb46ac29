//! Host classification: pass-through, dropped and localhost lists.
//!
//! Every host is in at most one of the three categories. Patterns are either exact
//! host names or `*.suffix` wildcards, compared after normalization.

use crate::message::Request;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Hosts routed to the loopback address unless configured otherwise.
pub const DEFAULT_LOCALHOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Lower-case a host, drop a trailing dot and IPv6 brackets.
pub fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_end_matches('.')
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}

/// Set of exact or `*.suffix` host patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostList {
    patterns: BTreeSet<String>,
}

impl HostList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pattern: &str) -> bool {
        let pattern = normalize_host(pattern);
        if pattern.is_empty() {
            return false;
        }
        self.patterns.insert(pattern)
    }

    pub fn remove(&mut self, pattern: &str) -> bool {
        self.patterns.remove(&normalize_host(pattern))
    }

    /// Whether a host matches any pattern.
    ///
    /// `*.example.com` matches `api.example.com` and `a.b.example.com`, not the bare
    /// `example.com`.
    pub fn contains(&self, host: &str) -> bool {
        let host = normalize_host(host);
        if host.is_empty() {
            return false;
        }
        if self.patterns.contains(&host) {
            return true;
        }
        self.patterns.iter().any(|pattern| {
            pattern
                .strip_prefix("*.")
                .is_some_and(|suffix| wildcard_matches(suffix, &host))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }
}

fn wildcard_matches(suffix: &str, host: &str) -> bool {
    host.strip_suffix(suffix)
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|label| !label.is_empty())
}

impl<S: AsRef<str>> FromIterator<S> for HostList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = HostList::new();
        for pattern in iter {
            list.insert(pattern.as_ref());
        }
        list
    }
}

/// Request predicate deciding whether a pass-through handler applies
#[derive(Clone)]
pub enum HostMatcher {
    /// Exact host name
    Exact(String),
    /// `*.suffix` pattern
    Wildcard(String),
    /// Arbitrary predicate over the request
    Predicate(Arc<dyn Fn(&Request) -> bool + Send + Sync>),
    /// Matches every request, or none
    Always(bool),
}

impl HostMatcher {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        HostMatcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, request: &Request) -> bool {
        match self {
            HostMatcher::Exact(host) => normalize_host(request.host()) == normalize_host(host),
            HostMatcher::Wildcard(pattern) => {
                let pattern = normalize_host(pattern);
                let suffix = pattern.strip_prefix("*.").unwrap_or(&pattern);
                wildcard_matches(suffix, &normalize_host(request.host()))
            }
            HostMatcher::Predicate(f) => f(request),
            HostMatcher::Always(value) => *value,
        }
    }
}

impl fmt::Debug for HostMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostMatcher::Exact(host) => f.debug_tuple("Exact").field(host).finish(),
            HostMatcher::Wildcard(pattern) => f.debug_tuple("Wildcard").field(pattern).finish(),
            HostMatcher::Predicate(_) => f.write_str("Predicate(..)"),
            HostMatcher::Always(value) => f.debug_tuple("Always").field(value).finish(),
        }
    }
}

impl From<&str> for HostMatcher {
    fn from(pattern: &str) -> Self {
        if pattern.trim_start().starts_with("*.") {
            HostMatcher::Wildcard(pattern.to_string())
        } else {
            HostMatcher::Exact(pattern.to_string())
        }
    }
}

impl From<bool> for HostMatcher {
    fn from(value: bool) -> Self {
        HostMatcher::Always(value)
    }
}

/// Host category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    PassThrough,
    Dropped,
    Localhost,
}

/// The three mutually exclusive host lists of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostClassifier {
    pass_through: HostList,
    dropped: HostList,
    localhost: HostList,
}

impl Default for HostClassifier {
    fn default() -> Self {
        Self {
            pass_through: HostList::new(),
            dropped: HostList::new(),
            localhost: DEFAULT_LOCALHOSTS.iter().collect(),
        }
    }
}

impl HostClassifier {
    /// Classifier with empty lists, not even the default localhost set.
    pub fn empty() -> Self {
        Self {
            localhost: HostList::new(),
            ..Default::default()
        }
    }

    /// Put hosts on the pass-through list, removing them from the other lists.
    pub fn pass_through<S: AsRef<str>>(&mut self, hosts: impl IntoIterator<Item = S>) {
        for host in hosts {
            self.reset_one(host.as_ref());
            self.pass_through.insert(host.as_ref());
        }
    }

    pub fn drop_host<S: AsRef<str>>(&mut self, hosts: impl IntoIterator<Item = S>) {
        for host in hosts {
            self.reset_one(host.as_ref());
            self.dropped.insert(host.as_ref());
        }
    }

    pub fn localhost<S: AsRef<str>>(&mut self, hosts: impl IntoIterator<Item = S>) {
        for host in hosts {
            self.reset_one(host.as_ref());
            self.localhost.insert(host.as_ref());
        }
    }

    /// Remove hosts from every list.
    pub fn reset<S: AsRef<str>>(&mut self, hosts: impl IntoIterator<Item = S>) {
        for host in hosts {
            self.reset_one(host.as_ref());
        }
    }

    fn reset_one(&mut self, host: &str) {
        self.pass_through.remove(host);
        self.dropped.remove(host);
        self.localhost.remove(host);
    }

    pub fn is_pass_through(&self, host: &str) -> bool {
        self.pass_through.contains(host)
    }

    pub fn is_dropped(&self, host: &str) -> bool {
        self.dropped.contains(host)
    }

    pub fn is_localhost(&self, host: &str) -> bool {
        self.localhost.contains(host)
    }

    /// Category of a host. Exact patterns are listed in one list only, so the
    /// order here only matters for overlapping wildcards.
    pub fn classify(&self, host: &str) -> Option<HostClass> {
        if self.is_dropped(host) {
            Some(HostClass::Dropped)
        } else if self.is_localhost(host) {
            Some(HostClass::Localhost)
        } else if self.is_pass_through(host) {
            Some(HostClass::PassThrough)
        } else {
            None
        }
    }

    pub fn pass_through_hosts(&self) -> &HostList {
        &self.pass_through
    }

    pub fn dropped_hosts(&self) -> &HostList {
        &self.dropped
    }

    pub fn localhost_hosts(&self) -> &HostList {
        &self.localhost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host(" Example.COM. "), "example.com");
        assert_eq!(normalize_host("[::1]"), "::1");
    }

    #[test]
    fn test_host_list_exact_and_wildcard() {
        let list: HostList = ["api.example.com", "*.internal.test"].into_iter().collect();
        assert!(list.contains("API.example.com"));
        assert!(!list.contains("example.com"));
        assert!(list.contains("db.internal.test"));
        assert!(list.contains("a.b.internal.test"));
        assert!(!list.contains("internal.test"));
        assert!(!list.contains("notinternal.test"));
        assert!(!list.contains(""));
    }

    #[test]
    fn test_classification_is_exclusive() {
        let mut hosts = HostClassifier::empty();
        hosts.pass_through(["api.example.com"]);
        hosts.drop_host(["api.example.com"]);
        assert!(hosts.is_dropped("api.example.com"));
        assert!(!hosts.is_pass_through("api.example.com"));

        hosts.localhost(["api.example.com"]);
        assert!(hosts.is_localhost("api.example.com"));
        assert!(!hosts.is_dropped("api.example.com"));
        assert_eq!(hosts.classify("api.example.com"), Some(HostClass::Localhost));
    }

    #[test]
    fn test_reset_removes_from_all_lists() {
        let mut hosts = HostClassifier::default();
        assert!(hosts.is_localhost("localhost"));
        hosts.reset(["localhost"]);
        assert!(!hosts.is_localhost("localhost"));
        assert_eq!(hosts.classify("localhost"), None);
        assert!(hosts.is_localhost("127.0.0.1"));
    }

    #[test]
    fn test_default_localhosts() {
        let hosts = HostClassifier::default();
        for host in DEFAULT_LOCALHOSTS {
            assert!(hosts.is_localhost(host));
        }
        assert!(hosts.is_localhost("[::1]"));
        assert!(HostClassifier::empty().localhost_hosts().is_empty());
    }

    #[test]
    fn test_host_matcher() {
        let request = Request::get("http://api.example.com/x").unwrap();
        assert!(HostMatcher::from("API.example.com").matches(&request));
        assert!(HostMatcher::from("*.example.com").matches(&request));
        assert!(!HostMatcher::from("*.api.example.com").matches(&request));
        assert!(HostMatcher::from(true).matches(&request));
        assert!(!HostMatcher::from(false).matches(&request));

        let posts_only = HostMatcher::predicate(|req| req.method == hyper::Method::POST);
        assert!(!posts_only.matches(&request));
        assert_eq!(format!("{posts_only:?}"), "Predicate(..)");
    }
}
