//! Session context shared by the handlers of one client.

use crate::catalog::{Catalog, FileStore, FixtureStore};
use crate::config::Config;
use crate::error::{ReplayError, Result};
use crate::hosts::{HostClass, HostClassifier};
use crate::mode::Mode;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Mode, host classification and fixture catalog.
pub struct Session {
    mode: Mode,
    hosts: RwLock<HostClassifier>,
    catalog: Catalog,
}

impl Session {
    /// Session with default host lists and an unset fixtures root.
    pub fn new(mode: Mode, catalog: Catalog) -> Self {
        Self {
            mode,
            hosts: RwLock::new(HostClassifier::default()),
            catalog,
        }
    }

    /// Build a session backed by the JSON-lines file store.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_store(config, Arc::new(FileStore::new()))
    }

    /// Validate `config` and build a session over `store`.
    pub fn from_config_with_store(config: &Config, store: Arc<dyn FixtureStore>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ReplayError::Configuration(format!("{e:#}")))?;

        let catalog =
            Catalog::new(store, config.header_match_list()?).with_exhaustion(config.exhaustion);
        if let Some(ref dir) = config.fixtures_dir {
            catalog.set_fixtures_dir(dir)?;
        }

        let mut hosts = HostClassifier::empty();
        hosts.localhost(&config.localhost);
        hosts.pass_through(&config.pass_through);
        hosts.drop_host(&config.drop);

        info!(
            "Session in '{}' mode: {} pass-through, {} dropped, {} localhost hosts",
            config.mode,
            hosts.pass_through_hosts().len(),
            hosts.dropped_hosts().len(),
            hosts.localhost_hosts().len()
        );

        Ok(Self {
            mode: config.mode,
            hosts: RwLock::new(hosts),
            catalog,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pass_through<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) {
        self.hosts.write().pass_through(hosts);
    }

    pub fn drop_host<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) {
        self.hosts.write().drop_host(hosts);
    }

    pub fn localhost<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) {
        self.hosts.write().localhost(hosts);
    }

    pub fn reset<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) {
        self.hosts.write().reset(hosts);
    }

    pub fn is_pass_through(&self, host: &str) -> bool {
        self.hosts.read().is_pass_through(host)
    }

    pub fn is_dropped(&self, host: &str) -> bool {
        self.hosts.read().is_dropped(host)
    }

    pub fn is_localhost(&self, host: &str) -> bool {
        self.hosts.read().is_localhost(host)
    }

    pub fn classify(&self, host: &str) -> Option<HostClass> {
        self.hosts.read().classify(host)
    }

    /// Copy of the current host lists.
    pub fn hosts(&self) -> HostClassifier {
        self.hosts.read().clone()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("hosts", &*self.hosts.read())
            .field("fixtures_dir", &self.catalog.fixtures_dir())
            .finish()
    }
}
