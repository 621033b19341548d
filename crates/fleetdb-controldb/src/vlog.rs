//! Versioned file log
//!
//! Durable, ordered storage of every historical snapshot for one storage
//! key. A key's directory holds one immutable version file per snapshot
//! (`v<N>.rec`, framed by the record codec) plus a `current` marker file
//! naming the valid `[first_version, current_version]` range:
//!
//! ```text
//! +--------+---------------+-----------------+--------+
//! | Magic  | FirstVersion  | CurrentVersion  | CRC32C |
//! | 4B     | 8B            | 8B              | 4B     |
//! +--------+---------------+-----------------+--------+
//! ```
//!
//! Every write goes to a temp name, is fsynced, renamed into place, and
//! the directory is fsynced; the marker is only advanced after the new
//! version file is durable. A crash can leave a version file without a
//! marker pointing at it, never the reverse; such leftovers are swept on
//! the next open.

use crate::codec::{self, CodecError, LogRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Marker file magic number
const MARKER_MAGIC: u32 = 0x464C_444D; // "FLDM"

/// Marker file size: magic + first + current + crc
const MARKER_SIZE: usize = 24;

/// Name of the marker file inside a key directory
const MARKER_FILE: &str = "current";

/// Log-layer error. Conflicts are a routine signal for the CAS protocol;
/// everything else indicates corruption or an I/O fault that survived
/// the bounded retries.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The expected snapshot no longer matches the current one.
    #[error("current snapshot does not match the expected snapshot")]
    Conflict,

    #[error("log corrupted: {0}")]
    Corrupt(#[from] CodecError),

    #[error("log i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Append-only sequence of immutable version files for one storage key.
pub struct VersionLog<R: LogRecord> {
    dir: PathBuf,
    first_version: u64,
    current_version: u64,
    retry_limit: u32,
    _record: PhantomData<R>,
}

impl<R: LogRecord> VersionLog<R> {
    /// Open the log in `dir`. Returns `None` when the key has never been
    /// created (no directory, or no marker — a crash between directory
    /// creation and the first marker write leaves the key absent).
    /// Sweeps temp files and version files outside the valid range.
    pub fn open(dir: &Path, retry_limit: u32) -> Result<Option<Self>, LogError> {
        let marker_path = dir.join(MARKER_FILE);
        let bytes = match read_with_retries(&marker_path, retry_limit) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if dir.exists() {
                    sweep_dir(dir, None);
                }
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let (first_version, current_version) = decode_marker(&bytes)?;

        sweep_dir(dir, Some((first_version, current_version)));

        Ok(Some(Self {
            dir: dir.to_path_buf(),
            first_version,
            current_version,
            retry_limit,
            _record: PhantomData,
        }))
    }

    /// Create the log with `initial` as version 0. The key must be
    /// absent (callers check via `open` under the per-key lock).
    pub fn create(dir: &Path, initial: &R, retry_limit: u32) -> Result<Self, LogError> {
        fs::create_dir_all(dir)?;

        let mut log = Self {
            dir: dir.to_path_buf(),
            first_version: 0,
            current_version: 0,
            retry_limit,
            _record: PhantomData,
        };
        log.write_version(0, initial)?;
        log.write_marker(0, 0)?;
        debug!("created version log for {}", initial.key_id());
        Ok(log)
    }

    /// Oldest retained version number.
    #[must_use]
    pub fn first_version(&self) -> u64 {
        self.first_version
    }

    /// Latest committed version number.
    #[must_use]
    pub fn current_version(&self) -> u64 {
        self.current_version
    }

    /// Read and decode the snapshot at `current_version`.
    pub fn read_current(&self) -> Result<R, LogError> {
        self.read_version(self.current_version)
    }

    /// Read and decode the snapshot at a specific version.
    pub fn read_version(&self, version: u64) -> Result<R, LogError> {
        let path = self.version_path(version);
        let bytes = read_with_retries(&path, self.retry_limit)?;
        Ok(codec::decode_record(&bytes)?)
    }

    /// Atomically append `new` as the next version, only if `expected`
    /// matches the presently stored current snapshot (timestamp-excluded
    /// semantic equality). On mismatch nothing is written and
    /// [`LogError::Conflict`] is returned; the caller re-reads and
    /// retries, the log never retries a conflict itself.
    pub fn append_if_current(&mut self, expected: &R, new: &R) -> Result<(), LogError> {
        let current = self.read_current()?;
        if !current.semantic_eq(expected) {
            return Err(LogError::Conflict);
        }

        let next = self.current_version + 1;
        self.write_version(next, new)?;
        self.write_marker(self.first_version, next)?;
        self.current_version = next;
        Ok(())
    }

    /// Drop all versions before the current one. The marker moves first,
    /// so a crash mid-compaction leaves stale files that the next open
    /// sweeps.
    pub fn compact(&mut self) -> Result<(), LogError> {
        if self.first_version == self.current_version {
            return Ok(());
        }
        let old_first = self.first_version;
        self.write_marker(self.current_version, self.current_version)?;
        self.first_version = self.current_version;
        for version in old_first..self.current_version {
            let path = self.version_path(version);
            if let Err(e) = fs::remove_file(&path)
                && e.kind() != ErrorKind::NotFound
            {
                warn!("failed to remove compacted version {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Remove the whole log. The key directory is renamed to a sibling
    /// trash name in one operation, so no reader can observe a partially
    /// removed log; the trash tree is then deleted, and any leftover is
    /// swept on the next scan of the parent scope.
    pub fn remove(dir: &Path) -> Result<(), LogError> {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            return Err(LogError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                "log directory has no name",
            )));
        };
        let Some(parent) = dir.parent() else {
            return Err(LogError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                "log directory has no parent",
            )));
        };

        let trash = parent.join(format!(
            "{name}.{}{}",
            fleetdb_common::now_unix_nano(),
            crate::layout::TRASH_SUFFIX
        ));
        fs::rename(dir, &trash)?;
        fsync_dir(parent)?;

        if let Err(e) = fs::remove_dir_all(&trash) {
            // the rename already made the removal visible as complete
            warn!("failed to delete trash dir {}: {}", trash.display(), e);
        }
        Ok(())
    }

    fn version_path(&self, version: u64) -> PathBuf {
        self.dir.join(version_file_name(version))
    }

    fn write_version(&self, version: u64, record: &R) -> Result<(), LogError> {
        let bytes = codec::encode_record(record)?;
        write_durable(&self.version_path(version), &bytes, self.retry_limit)?;
        Ok(())
    }

    fn write_marker(&self, first: u64, current: u64) -> Result<(), LogError> {
        let bytes = encode_marker(first, current);
        write_durable(&self.dir.join(MARKER_FILE), &bytes, self.retry_limit)?;
        Ok(())
    }
}

fn version_file_name(version: u64) -> String {
    format!("v{version}.rec")
}

fn parse_version_file_name(name: &str) -> Option<u64> {
    name.strip_prefix('v')?.strip_suffix(".rec")?.parse().ok()
}

fn encode_marker(first: u64, current: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MARKER_SIZE);
    buf.extend_from_slice(&MARKER_MAGIC.to_le_bytes());
    buf.extend_from_slice(&first.to_le_bytes());
    buf.extend_from_slice(&current.to_le_bytes());
    let crc = crc32c::crc32c(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

fn decode_marker(data: &[u8]) -> Result<(u64, u64), LogError> {
    if data.len() < MARKER_SIZE {
        return Err(CodecError::Truncated.into());
    }
    let magic = u32::from_le_bytes(data[0..4].try_into().unwrap());
    if magic != MARKER_MAGIC {
        return Err(CodecError::BadMagic.into());
    }
    let first = u64::from_le_bytes(data[4..12].try_into().unwrap());
    let current = u64::from_le_bytes(data[12..20].try_into().unwrap());
    let stored_crc = u32::from_le_bytes(data[20..24].try_into().unwrap());
    if crc32c::crc32c(&data[..20]) != stored_crc {
        return Err(CodecError::ChecksumMismatch.into());
    }
    Ok((first, current))
}

/// Remove temp files and, when the valid range is known, version files
/// outside it. Leftovers come from interrupted writes or compactions.
fn sweep_dir(dir: &Path, valid_range: Option<(u64, u64)>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        let stale = if name.ends_with(".tmp") {
            true
        } else if let Some(version) = parse_version_file_name(name) {
            match valid_range {
                Some((first, current)) => version < first || version > current,
                // no marker: the key was never committed, drop everything
                None => true,
            }
        } else {
            false
        };

        if stale {
            let path = entry.path();
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to sweep stale file {}: {}", path.display(), e);
            }
        }
    }
}

/// Write `bytes` to a temp name, fsync, rename over `path`, fsync the
/// directory. The contents at `path` are either the old file or the
/// complete new one; a reader never sees a partial write.
fn write_durable(path: &Path, bytes: &[u8], retry_limit: u32) -> io::Result<()> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Err(io::Error::new(ErrorKind::InvalidInput, "path has no file name"));
    };
    let Some(dir) = path.parent() else {
        return Err(io::Error::new(ErrorKind::InvalidInput, "path has no parent"));
    };
    let tmp = dir.join(format!("{file_name}.tmp"));

    with_io_retries(retry_limit, || {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        fsync_dir(dir)
    })
}

fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

fn read_with_retries(path: &Path, retry_limit: u32) -> io::Result<Vec<u8>> {
    with_io_retries(retry_limit, || fs::read(path))
}

/// Retry transient I/O failures a bounded number of times. Anything else
/// surfaces immediately; conditional failures never pass through here.
fn with_io_retries<T>(limit: u32, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e)
                if attempt < limit
                    && matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) =>
            {
                attempt += 1;
                debug!("transient i/o error, retry {attempt}/{limit}: {e}");
            }
            Err(e) => return Err(e),
        }
    }
}
