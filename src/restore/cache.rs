//! Availability lookups cached for one planning or restore call.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::equivalence::PackageIndex;
use crate::error::Result;
use crate::managers::{Adapter, ManagerKind};

/// Entries kept before the least recently used lookup is evicted.
const CAPACITY: usize = 4096;

/// `(backend, package name)` → versions the backend offers.
///
/// Created per operation and dropped with it; nothing is persisted. Name
/// searches used by equivalence resolution are cached alongside.
#[derive(Debug)]
pub struct AvailabilityCache {
    entries: Mutex<LruCache<(ManagerKind, String), Vec<String>>>,
    searches: Mutex<LruCache<(ManagerKind, String), Vec<String>>>,
}

impl Default for AvailabilityCache {
    fn default() -> Self {
        Self::with_capacity(CAPACITY)
    }
}

impl AvailabilityCache {
    /// Cache holding at most `capacity` lookups (minimum one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            searches: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Cached versions, if any.
    fn get(&self, kind: ManagerKind, name: &str) -> Option<Vec<String>> {
        let mut guard = self.entries.lock().ok()?;
        guard.get(&(kind, name.to_string())).cloned()
    }

    /// Record a lookup result.
    fn put(&self, kind: ManagerKind, name: &str, versions: Vec<String>) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.put((kind, name.to_string()), versions);
        }
    }

    /// Number of cached lookups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or_default()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// What: Versions of `name` offered by `adapter`, querying once per operation.
    ///
    /// Inputs:
    /// - `adapter`: Destination backend.
    /// - `name`: Package name on that backend.
    ///
    /// Output:
    /// - Versions, empty when absent.
    ///
    /// # Errors
    /// - Query errors; failures are not cached so a later item may retry.
    pub fn versions(&self, adapter: &Adapter, name: &str) -> Result<Vec<String>> {
        let kind = adapter.kind();
        if let Some(hit) = self.get(kind, name) {
            tracing::trace!(manager = %kind, package = %name, "availability cache hit");
            return Ok(hit);
        }
        let versions = adapter.query_available(name)?;
        self.put(kind, name, versions.clone());
        Ok(versions)
    }

    /// What: Names matching `term` on `adapter`, searching once per operation.
    ///
    /// # Errors
    /// - Search errors, which are not cached.
    pub fn search(&self, adapter: &Adapter, term: &str) -> Result<Vec<String>> {
        let key = (adapter.kind(), term.to_string());
        if let Some(hit) = self.searches.lock().ok().and_then(|mut g| g.get(&key).cloned()) {
            return Ok(hit);
        }
        let names = adapter.search(term)?;
        if let Ok(mut guard) = self.searches.lock() {
            guard.put(key, names.clone());
        }
        Ok(names)
    }

    /// Index view of `adapter` that answers availability through this cache.
    #[must_use]
    pub const fn index<'a>(&'a self, adapter: &'a Adapter) -> CachedIndex<'a> {
        CachedIndex {
            adapter,
            cache: self,
        }
    }
}

/// A destination backend seen through an [`AvailabilityCache`].
#[derive(Debug, Clone, Copy)]
pub struct CachedIndex<'a> {
    adapter: &'a Adapter,
    cache: &'a AvailabilityCache,
}

impl PackageIndex for CachedIndex<'_> {
    fn available(&self, name: &str) -> Result<bool> {
        Ok(!self.cache.versions(self.adapter, name)?.is_empty())
    }

    fn search(&self, term: &str) -> Result<Vec<String>> {
        self.cache.search(self.adapter, term)
    }
}
