//! Fixture catalog: matching, loading and persistence of recorded responses.
//!
//! The catalog owns the in-memory view of one fixtures root. Loading is lazy: the
//! first lookup after construction, or after [`Catalog::set_fixtures_dir`], reads
//! the root through the [`FixtureStore`] and caches it. Lookups and records share
//! one async lock, so concurrent first accesses load once and concurrent records
//! are applied one after another.
//!
//! # Module Structure
//!
//! - `entry` - Fixture entry and recorded request snapshot
//! - `store` - Storage trait and the JSON-lines file store

mod entry;
mod store;

pub use entry::{FixtureEntry, RecordedRequest};
pub use store::{host_file_stem, FileStore, FixtureStore, FIXTURE_EXTENSION};

use crate::error::{ReplayError, Result};
use crate::fingerprint::{Fingerprint, HeaderMatchList};
use crate::message::{Request, Response};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// What [`Catalog::consume`] does once every response for a fingerprint was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExhaustionPolicy {
    /// Keep returning the last recorded response
    #[default]
    RepeatLast,
    /// Report the fingerprint as having no fixture
    Fail,
}

#[derive(Debug, Default)]
struct ActiveRoot {
    path: Option<PathBuf>,
    /// Bumped on every switch; a cache with an older generation is stale
    generation: u64,
}

struct LoadedFixtures {
    root: PathBuf,
    generation: u64,
    responses: HashMap<Fingerprint, Vec<Response>>,
    /// Next response index to hand out per fingerprint
    cursors: HashMap<Fingerprint, usize>,
    count: usize,
}

impl LoadedFixtures {
    fn new(root: PathBuf, generation: u64) -> Self {
        Self {
            root,
            generation,
            responses: HashMap::new(),
            cursors: HashMap::new(),
            count: 0,
        }
    }

    fn insert(&mut self, fingerprint: Fingerprint, response: Response) {
        self.responses.entry(fingerprint).or_default().push(response);
        self.count += 1;
    }
}

/// Recorded responses for the active fixtures root
pub struct Catalog {
    store: Arc<dyn FixtureStore>,
    matchers: HeaderMatchList,
    exhaustion: ExhaustionPolicy,
    root: RwLock<ActiveRoot>,
    loaded: Mutex<Option<LoadedFixtures>>,
}

impl Catalog {
    pub fn new(store: Arc<dyn FixtureStore>, matchers: HeaderMatchList) -> Self {
        Self {
            store,
            matchers,
            exhaustion: ExhaustionPolicy::default(),
            root: RwLock::new(ActiveRoot::default()),
            loaded: Mutex::new(None),
        }
    }

    /// Catalog over the JSON-lines [`FileStore`] with default header matching.
    pub fn with_file_store() -> Self {
        Self::new(Arc::new(FileStore::new()), HeaderMatchList::default())
    }

    pub fn with_exhaustion(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion = policy;
        self
    }

    pub fn exhaustion(&self) -> ExhaustionPolicy {
        self.exhaustion
    }

    pub fn header_matchers(&self) -> &HeaderMatchList {
        &self.matchers
    }

    /// Fingerprint a request with this catalog's header selection.
    pub fn fingerprint(&self, request: &Request) -> Fingerprint {
        Fingerprint::of(request, &self.matchers)
    }

    /// Switch the active fixtures root and drop whatever was loaded.
    ///
    /// Only the shape of the path is checked here; a missing directory is created
    /// on the first record and I/O failures surface on the first load.
    pub fn set_fixtures_dir(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ReplayError::Configuration(
                "Fixtures directory must not be empty".to_string(),
            ));
        }
        if path.exists() && !path.is_dir() {
            return Err(ReplayError::Configuration(format!(
                "Fixtures directory {} is not a directory",
                path.display()
            )));
        }

        let mut root = self.root.write();
        info!("Fixtures directory set to {:?}", path);
        root.path = Some(path);
        root.generation += 1;
        Ok(())
    }

    pub fn fixtures_dir(&self) -> Option<PathBuf> {
        self.root.read().path.clone()
    }

    /// Whether the active root is loaded and current.
    pub async fn is_loaded(&self) -> bool {
        let generation = self.root.read().generation;
        self.loaded
            .lock()
            .await
            .as_ref()
            .is_some_and(|fixtures| fixtures.generation == generation)
    }

    /// Number of entries loaded for the active root.
    pub async fn len(&self) -> Result<usize> {
        let mut loaded = self.loaded.lock().await;
        self.ensure_loaded(&mut loaded).await?;
        Ok(loaded.as_ref().map_or(0, |fixtures| fixtures.count))
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn ensure_loaded(&self, loaded: &mut Option<LoadedFixtures>) -> Result<()> {
        let (path, generation) = {
            let root = self.root.read();
            (root.path.clone(), root.generation)
        };
        if loaded
            .as_ref()
            .is_some_and(|fixtures| fixtures.generation == generation)
        {
            return Ok(());
        }

        let Some(path) = path else {
            *loaded = None;
            return Ok(());
        };

        let entries = self.store.load(&path).await?;
        let mut fixtures = LoadedFixtures::new(path, generation);
        for entry in entries {
            let fingerprint = entry.fingerprint(&self.matchers);
            fixtures.insert(fingerprint, entry.response);
        }
        debug!(
            "Catalog loaded {} responses under {} fingerprints from {:?}",
            fixtures.count,
            fixtures.responses.len(),
            fixtures.root
        );
        *loaded = Some(fixtures);
        Ok(())
    }

    /// Every recorded response for a fingerprint, in recorded order.
    ///
    /// An unknown fingerprint yields an empty list, not an error.
    pub async fn find(&self, fingerprint: &Fingerprint) -> Result<Vec<Response>> {
        let mut loaded = self.loaded.lock().await;
        self.ensure_loaded(&mut loaded).await?;
        Ok(loaded
            .as_ref()
            .and_then(|fixtures| fixtures.responses.get(fingerprint))
            .cloned()
            .unwrap_or_default())
    }

    /// Next not-yet-returned response for a fingerprint, using the catalog's policy.
    pub async fn consume(&self, fingerprint: &Fingerprint) -> Result<Option<Response>> {
        self.consume_with(fingerprint, self.exhaustion).await
    }

    /// Next not-yet-returned response for a fingerprint, using `policy` on exhaustion.
    pub async fn consume_with(
        &self,
        fingerprint: &Fingerprint,
        policy: ExhaustionPolicy,
    ) -> Result<Option<Response>> {
        let mut loaded = self.loaded.lock().await;
        self.ensure_loaded(&mut loaded).await?;

        let Some(LoadedFixtures {
            responses, cursors, ..
        }) = loaded.as_mut()
        else {
            return Ok(None);
        };
        let Some(recorded) = responses.get(fingerprint) else {
            return Ok(None);
        };

        let cursor = cursors.entry(fingerprint.clone()).or_insert(0);
        if let Some(response) = recorded.get(*cursor) {
            *cursor += 1;
            return Ok(Some(response.clone()));
        }
        Ok(match policy {
            ExhaustionPolicy::RepeatLast => recorded.last().cloned(),
            ExhaustionPolicy::Fail => None,
        })
    }

    /// Append a captured pair to disk, then to memory.
    ///
    /// Same-fingerprint entries keep their order. The recorded response has already
    /// been delivered to its caller, so it counts as consumed for this session.
    pub async fn record(&self, request: &Request, response: &Response) -> Result<()> {
        let mut loaded = self.loaded.lock().await;
        self.ensure_loaded(&mut loaded).await?;

        let Some(fixtures) = loaded.as_mut() else {
            return Err(ReplayError::Configuration(
                "No fixtures directory configured; cannot record".to_string(),
            ));
        };

        let entry = FixtureEntry::capture(request, response, &self.matchers);
        self.store.append(&fixtures.root, &entry).await?;

        let fingerprint = entry.fingerprint(&self.matchers);
        fixtures.insert(fingerprint.clone(), entry.response);
        let recorded = fixtures.responses.get(&fingerprint).map_or(0, Vec::len);
        fixtures.cursors.insert(fingerprint.clone(), recorded);

        info!(
            "Recorded {} {} -> {} ({} responses, fingerprint {})",
            entry.request.method,
            entry.request.url,
            response.status,
            recorded,
            fingerprint.digest()
        );
        Ok(())
    }

    /// File the JSON-lines store keeps this request's fixtures in.
    pub fn fixture_file(&self, request: &Request) -> Option<PathBuf> {
        let root = self.fixtures_dir()?;
        Some(fixture_path(&root, request))
    }
}

fn fixture_path(root: &Path, request: &Request) -> PathBuf {
    root.join(format!(
        "{}.{FIXTURE_EXTENSION}",
        host_file_stem(&crate::fingerprint::canonical_url(&request.uri))
    ))
}
