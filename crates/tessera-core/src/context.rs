//! # Engine Context
//!
//! The store handle and settings every component receives by reference.
//! Built once at process start; there is no module-scope state.

use crate::storage::RedbStore;
use crate::store::{KvStore, MemoryStore};
use crate::TesseraError;
use std::path::Path;
use std::sync::Arc;

/// Settings the core needs from the outside world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreSettings {
    /// Base URL of the web UI, used for standalone links (no trailing `/`).
    pub base_domain: String,
}

impl CoreSettings {
    #[must_use]
    pub fn new(base_domain: impl Into<String>) -> Self {
        let base_domain: String = base_domain.into();
        Self {
            base_domain: base_domain.trim_end_matches('/').to_string(),
        }
    }
}

/// Shared handle to the store plus core settings.
///
/// Cloning is cheap: the store is reference counted.
#[derive(Clone)]
pub struct Context {
    store: Arc<dyn KvStore>,
    settings: CoreSettings,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context over an existing store.
    pub fn new(store: Arc<dyn KvStore>, settings: CoreSettings) -> Self {
        Self { store, settings }
    }

    /// Create a context over a fresh volatile store.
    #[must_use]
    pub fn in_memory(settings: CoreSettings) -> Self {
        Self::new(Arc::new(MemoryStore::new()), settings)
    }

    /// Create a context over a redb database at `path`.
    pub fn with_redb(path: impl AsRef<Path>, settings: CoreSettings) -> Result<Self, TesseraError> {
        Ok(Self::new(Arc::new(RedbStore::open(path)?), settings))
    }

    /// The store adapter.
    #[must_use]
    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    /// Core settings.
    #[must_use]
    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }
}
