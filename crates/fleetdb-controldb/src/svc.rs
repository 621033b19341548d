//! Shared entity-service pattern
//!
//! Every entity service resolves a storage key to a key directory,
//! obtains the key's read-writer through the handle cache and drives the
//! CAS protocol. The per-entity services layer validation and their
//! delete-idempotence rules on top of this.

use crate::cache::HandleCache;
use crate::codec::LogRecord;
use crate::rw::RecordIo;
use fleetdb_common::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Cache-fronted keyed record store, one per entity kind.
pub struct KeyedStore<R: LogRecord> {
    cache: HandleCache<R>,
    retry_limit: u32,
}

impl<R: LogRecord> KeyedStore<R> {
    pub fn new(capacity: usize, retry_limit: u32) -> Self {
        Self {
            cache: HandleCache::new(capacity),
            retry_limit,
        }
    }

    fn handle(&self, key: &str, dir: PathBuf) -> Arc<RecordIo<R>> {
        let retry_limit = self.retry_limit;
        self.cache
            .get_or_create(key, || RecordIo::new(dir, retry_limit))
    }

    pub fn create(&self, key: &str, dir: PathBuf, record: &R) -> Result<()> {
        self.handle(key, dir).create(record)
    }

    pub fn get(&self, key: &str, dir: PathBuf) -> Result<R> {
        self.handle(key, dir).get()
    }

    pub fn update(&self, key: &str, dir: PathBuf, old: &R, new: &R) -> Result<()> {
        self.handle(key, dir).update(old, new)
    }

    /// Delete the key's log. The cache entry is dropped whatever the
    /// outcome, so a stale or half-evicted handle cannot mask the
    /// deletion. `missing_ok` selects the entity's idempotence rule.
    pub fn delete(&self, key: &str, dir: PathBuf, missing_ok: bool) -> Result<()> {
        let result = self.handle(key, dir).delete();
        self.cache.remove(key);
        match result {
            Err(Error::RecordNotFound) if missing_ok => Ok(()),
            other => other,
        }
    }

    /// The underlying handle cache, for introspection and tests.
    pub fn cache(&self) -> &HandleCache<R> {
        &self.cache
    }
}
