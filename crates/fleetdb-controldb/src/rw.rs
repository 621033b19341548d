//! Conditional read-writer
//!
//! One `RecordIo` per hot storage key, shared through the handle cache.
//! It exposes the CAS protocol (create / get / update / delete) over the
//! key's version log and owns the per-key mutual exclusion: every
//! operation for a key runs under this handle's lock, so two concurrent
//! creates cannot both observe "absent" and both write version 0.
//!
//! Constructing a handle performs no I/O; the log is opened lazily on
//! first use under the lock. The cache can therefore build handles while
//! holding its own lock without blocking other keys on disk access.

use crate::codec::LogRecord;
use crate::vlog::{LogError, VersionLog};
use fleetdb_common::{Error, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{debug, error, warn};

struct IoState<R: LogRecord> {
    /// `None` until the first operation opens the log.
    loaded: bool,
    /// `None` when loaded and the key is absent.
    log: Option<VersionLog<R>>,
}

/// CAS read-writer over one key's version log.
pub struct RecordIo<R: LogRecord> {
    dir: PathBuf,
    retry_limit: u32,
    state: Mutex<IoState<R>>,
}

impl<R: LogRecord> RecordIo<R> {
    /// Cheap handle construction; no disk access until the first
    /// operation.
    pub fn new(dir: PathBuf, retry_limit: u32) -> Self {
        Self {
            dir,
            retry_limit,
            state: Mutex::new(IoState {
                loaded: false,
                log: None,
            }),
        }
    }

    /// Create the record: version 0 when the key is absent; idempotent
    /// success when the key already holds a semantically equal record
    /// (a client retry after an ambiguous failure); otherwise
    /// `ConditionalCheckFailed`.
    pub fn create(&self, new: &R) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state)?;

        match &state.log {
            None => {
                let log = VersionLog::create(&self.dir, new, self.retry_limit)
                    .map_err(|e| self.internal(e))?;
                state.log = Some(log);
                Ok(())
            }
            Some(log) => {
                let current = log.read_current().map_err(|e| self.internal(e))?;
                if current.semantic_eq(new) {
                    debug!("create retry for existing record {}", new.key_id());
                    Ok(())
                } else {
                    warn!("create found a differing record for {}", new.key_id());
                    Err(Error::ConditionalCheckFailed)
                }
            }
        }
    }

    /// Current snapshot; `RecordNotFound` when the key is absent.
    pub fn get(&self) -> Result<R> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state)?;

        match &state.log {
            None => Err(Error::RecordNotFound),
            Some(log) => log.read_current().map_err(|e| self.internal(e)),
        }
    }

    /// Conditional update: append `new` only if `old_expected` still
    /// matches the current snapshot. A concurrent modification surfaces
    /// as `ConditionalCheckFailed` and is never silently overwritten.
    pub fn update(&self, old_expected: &R, new: &R) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state)?;

        match &mut state.log {
            None => Err(Error::RecordNotFound),
            Some(log) => match log.append_if_current(old_expected, new) {
                Ok(()) => Ok(()),
                Err(LogError::Conflict) => {
                    debug!("conditional update conflict for {}", new.key_id());
                    Err(Error::ConditionalCheckFailed)
                }
                Err(e) => Err(self.internal(e)),
            },
        }
    }

    /// Remove the whole log; `RecordNotFound` when already absent.
    /// Whether that is an error is the entity service's decision.
    pub fn delete(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state)?;

        if state.log.is_none() {
            return Err(Error::RecordNotFound);
        }
        VersionLog::<R>::remove(&self.dir).map_err(|e| self.internal(e))?;
        state.log = None;
        Ok(())
    }

    /// Version range for introspection: `None` when absent.
    pub fn versions(&self) -> Result<Option<(u64, u64)>> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state)?;
        Ok(state
            .log
            .as_ref()
            .map(|log| (log.first_version(), log.current_version())))
    }

    fn ensure_loaded(&self, state: &mut IoState<R>) -> Result<()> {
        if !state.loaded {
            state.log =
                VersionLog::open(&self.dir, self.retry_limit).map_err(|e| self.internal(e))?;
            state.loaded = true;
        }
        Ok(())
    }

    fn internal(&self, e: LogError) -> Error {
        error!("version log error at {}: {}", self.dir.display(), e);
        Error::internal(format!("version log at {}: {e}", self.dir.display()))
    }
}
