//! Configuration types for Reprise.

mod transport;

use crate::catalog::ExhaustionPolicy;
use crate::fingerprint::{HeaderMatchList, DEFAULT_MATCH_HEADERS};
use crate::hosts::{normalize_host, DEFAULT_LOCALHOSTS};
use crate::mode::Mode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use transport::TransportConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// bloody, cheat, record or replay (default: replay)
    #[serde(default)]
    pub mode: Mode,

    /// Fixture root. Required for every mode but bloody.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_dir: Option<PathBuf>,

    /// Header name regexes that take part in request matching
    #[serde(default = "default_match_headers")]
    pub match_headers: Vec<String>,

    /// Hosts that always go to the network
    #[serde(default)]
    pub pass_through: Vec<String>,

    /// Hosts whose connections fail
    #[serde(default)]
    pub drop: Vec<String>,

    /// Hosts rewritten to 127.0.0.1
    #[serde(default = "default_localhost")]
    pub localhost: Vec<String>,

    /// What replay does once a recorded sequence is used up
    #[serde(default)]
    pub exhaustion: ExhaustionPolicy,

    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_match_headers() -> Vec<String> {
    DEFAULT_MATCH_HEADERS.iter().map(|s| s.to_string()).collect()
}

fn default_localhost() -> Vec<String> {
    DEFAULT_LOCALHOSTS.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            fixtures_dir: None,
            match_headers: default_match_headers(),
            pass_through: Vec::new(),
            drop: Vec::new(),
            localhost: default_localhost(),
            exhaustion: ExhaustionPolicy::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.mode.uses_fixtures() && self.fixtures_dir.is_none() {
            anyhow::bail!(
                "'fixtures_dir' is required in '{}' mode. Only 'bloody' mode runs without fixtures",
                self.mode
            );
        }

        if let Some(ref dir) = self.fixtures_dir {
            if dir.as_os_str().is_empty() {
                anyhow::bail!("'fixtures_dir' must not be empty");
            }
        }

        self.header_match_list()?;

        // A host belongs to one list only
        let mut seen: HashMap<String, &str> = HashMap::new();
        for (list, hosts) in [
            ("pass_through", &self.pass_through),
            ("drop", &self.drop),
            ("localhost", &self.localhost),
        ] {
            for host in hosts {
                let host = normalize_host(host);
                if host.is_empty() {
                    anyhow::bail!("Empty host in '{list}'");
                }
                if let Some(other) = seen.insert(host.clone(), list) {
                    if other != list {
                        anyhow::bail!("Host '{host}' is listed in both '{other}' and '{list}'");
                    }
                }
            }
        }

        if self.transport.connect_timeout_secs == 0 {
            anyhow::bail!("'transport.connect_timeout_secs' must be greater than zero");
        }

        Ok(())
    }

    /// Compiled header match list.
    pub fn header_match_list(&self) -> crate::error::Result<HeaderMatchList> {
        HeaderMatchList::new(&self.match_headers)
    }

    /// Replace the mode, e.g. from a command-line override.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = Some(dir.into());
        self
    }
}
