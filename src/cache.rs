//! Keyed icon/resource cache
//!
//! External collaborator for avatar and icon bytes: load once through a
//! caller-supplied loader, serve the cached copy thereafter, clear
//! explicitly. Scoping is the caller's choice; there are no globals. The
//! synchronization engine never touches this.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, trace};

/// Resource loading errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to load resource {key}: {source}")]
    Load {
        key: String,
        #[source]
        source: io::Error,
    },
}

type Loader = dyn Fn(&str) -> io::Result<Vec<u8>> + Send + Sync;

/// Load-once cache of keyed resource bytes
pub struct IconCache {
    entries: RwLock<HashMap<String, Arc<Vec<u8>>>>,
    loader: Box<Loader>,
}

impl IconCache {
    /// Create a cache around a loader; nothing is loaded up front
    pub fn new(loader: impl Fn(&str) -> io::Result<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            loader: Box::new(loader),
        }
    }

    /// Return the cached bytes for `key`, loading them on first use.
    ///
    /// Two racing first loads may both invoke the loader; the cache
    /// keeps a single copy either way.
    pub fn get_or_load(&self, key: &str) -> Result<Arc<Vec<u8>>, CacheError> {
        if let Some(bytes) = self.entries.read().unwrap().get(key) {
            trace!(key, "icon cache hit");
            return Ok(bytes.clone());
        }

        debug!(key, "icon cache miss, loading");
        let bytes = Arc::new((self.loader)(key).map_err(|source| CacheError::Load {
            key: key.to_string(),
            source,
        })?);

        let mut entries = self.entries.write().unwrap();
        Ok(entries.entry(key.to_string()).or_insert(bytes).clone())
    }

    /// Pre-populate an entry, replacing any cached copy
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), Arc::new(bytes));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap();
        debug!("clearing {} cached icons", entries.len());
        entries.clear();
    }
}
