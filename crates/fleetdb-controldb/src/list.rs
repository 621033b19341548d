//! Prefix-scoped listing over the durable key-space
//!
//! List operations enumerate the key directories under a scope directory
//! and read each key's current snapshot straight from its version log,
//! bypassing the handle cache so a large listing cannot evict every hot
//! key. Results are produced in key order, one page at a time; the
//! continuation token is the last key name the previous page examined.

use crate::codec::LogRecord;
use crate::layout;
use crate::vlog::VersionLog;
use fleetdb_common::{Error, Result};
use fleetdb_store::ListPage;
use std::path::Path;
use tracing::error;

/// Internal page size used when the caller did not request a limit; the
/// facade's exhaustive list methods drain pages of this size so very
/// large scopes are never buffered twice.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Scan one page of key directories under `scope`, starting after
/// `token`. Keys whose log was never committed (crash before the first
/// marker write) are skipped; trash directories from interrupted
/// removals are swept.
pub fn scan_page<R: LogRecord>(
    scope: &Path,
    token: Option<&str>,
    limit: Option<usize>,
    retry_limit: u32,
) -> Result<ListPage<R>> {
    layout::sweep_trash(scope);

    let entries = match std::fs::read_dir(scope) {
        Ok(entries) => entries,
        // scope never created: nothing has been stored under it
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ListPage::empty()),
        Err(e) => {
            error!("failed to scan {}: {}", scope.display(), e);
            return Err(e.into());
        }
    };

    let mut names: Vec<String> = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(layout::TRASH_SUFFIX) {
            continue;
        }
        if token.is_some_and(|t| name <= t) {
            continue;
        }
        names.push(name.to_string());
    }
    names.sort_unstable();

    let page_size = limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let has_more = names.len() > page_size;
    names.truncate(page_size);

    let mut items = Vec::with_capacity(names.len());
    for name in &names {
        let dir = scope.join(name);
        let log: Option<VersionLog<R>> = VersionLog::open(&dir, retry_limit).map_err(|e| {
            error!("corrupt log under {}: {}", dir.display(), e);
            Error::internal(format!("version log at {}: {e}", dir.display()))
        })?;
        if let Some(log) = log {
            let record = log.read_current().map_err(|e| {
                error!("unreadable snapshot under {}: {}", dir.display(), e);
                Error::internal(format!("version log at {}: {e}", dir.display()))
            })?;
            items.push(record);
        }
    }

    let next_token = if has_more { names.last().cloned() } else { None };
    Ok(ListPage { items, next_token })
}
