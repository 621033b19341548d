//! Config file service
//!
//! Immutable-content blobs keyed by (service UUID, file id). The
//! caller-supplied MD5 is verified against the content on create; a
//! mismatch means the record was corrupted before it reached the store,
//! which is an internal error, not a bad request. Content is never
//! updated in place: a new file id carries the new content, and old
//! blobs stay until deleted, so members roll forward independently.
//! Deletion is best-effort cleanup and therefore idempotent.

use crate::layout;
use crate::svc::KeyedStore;
use fleetdb_common::{ConfigFile, Error, ReqContext, Result, checksum};
use std::path::PathBuf;
use tracing::{debug, error};

pub struct ConfigSvc {
    root: PathBuf,
    store: KeyedStore<ConfigFile>,
}

impl ConfigSvc {
    pub fn new(root: PathBuf, cache_capacity: usize, retry_limit: u32) -> Self {
        Self {
            root,
            store: KeyedStore::new(cache_capacity, retry_limit),
        }
    }

    fn resolve(&self, service_uuid: &str, file_id: &str) -> Result<(String, PathBuf)> {
        layout::validate_key_component(service_uuid)?;
        layout::validate_key_component(file_id)?;
        let key = format!("{service_uuid}/{file_id}");
        let dir = layout::config_dir(&self.root, service_uuid, file_id);
        Ok((key, dir))
    }

    pub fn create_config_file(&self, ctx: &ReqContext, cfg: &ConfigFile) -> Result<()> {
        let (key, dir) = self.resolve(&cfg.service_uuid, &cfg.file_id)?;
        let actual = checksum::content_md5(&cfg.content);
        if actual != cfg.file_md5 {
            error!(
                "config file {} content corrupted, expect md5 {} content md5 {}, req {}",
                key, cfg.file_md5, actual, ctx.req_id
            );
            return Err(Error::internal(format!(
                "config file {key} checksum mismatch"
            )));
        }
        self.store.create(&key, dir, cfg)?;
        debug!("created config file {} ({}), req {}", key, cfg.file_name, ctx.req_id);
        Ok(())
    }

    pub fn get_config_file(
        &self,
        _ctx: &ReqContext,
        service_uuid: &str,
        file_id: &str,
    ) -> Result<ConfigFile> {
        let (key, dir) = self.resolve(service_uuid, file_id)?;
        let cfg = self.store.get(&key, dir)?;
        // verify on the way out as well; the blob sat on disk
        let actual = checksum::content_md5(&cfg.content);
        if actual != cfg.file_md5 {
            error!("config file {} corrupted on disk", key);
            return Err(Error::internal(format!(
                "config file {key} checksum mismatch on read"
            )));
        }
        Ok(cfg)
    }

    /// Deleting a missing config file succeeds; old file ids are cleaned
    /// up lazily after members roll forward.
    pub fn delete_config_file(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        file_id: &str,
    ) -> Result<()> {
        let (key, dir) = self.resolve(service_uuid, file_id)?;
        self.store.delete(&key, dir, true)?;
        debug!("deleted config file {}, req {}", key, ctx.req_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn svc(root: &std::path::Path) -> ConfigSvc {
        ConfigSvc::new(root.to_path_buf(), 8, 3)
    }

    #[test]
    fn test_config_file_lifecycle() {
        let dir = tempdir().unwrap();
        let s = svc(dir.path());
        let ctx = ReqContext::new("req-1");

        let cfg = ConfigFile::new_initial("uuid-1", "file-1", "pg.conf", 0o600, "port=5432");
        s.create_config_file(&ctx, &cfg).unwrap();
        s.create_config_file(&ctx, &cfg).unwrap();

        let read = s.get_config_file(&ctx, "uuid-1", "file-1").unwrap();
        assert!(read.semantic_eq(&cfg, false, false));

        s.delete_config_file(&ctx, "uuid-1", "file-1").unwrap();
        s.delete_config_file(&ctx, "uuid-1", "file-1").unwrap();
        assert!(matches!(
            s.get_config_file(&ctx, "uuid-1", "file-1"),
            Err(Error::RecordNotFound)
        ));
    }

    #[test]
    fn test_checksum_mismatch_is_internal_error() {
        let dir = tempdir().unwrap();
        let s = svc(dir.path());
        let ctx = ReqContext::new("req-1");

        let mut cfg = ConfigFile::new_initial("uuid-1", "file-1", "pg.conf", 0o600, "port=5432");
        cfg.content = "port=9999".to_string(); // corrupted in transit
        assert!(matches!(
            s.create_config_file(&ctx, &cfg),
            Err(Error::Internal(_))
        ));
        // nothing was stored
        assert!(matches!(
            s.get_config_file(&ctx, "uuid-1", "file-1"),
            Err(Error::RecordNotFound)
        ));
    }

    #[test]
    fn test_new_content_gets_new_file_id() {
        let dir = tempdir().unwrap();
        let s = svc(dir.path());
        let ctx = ReqContext::new("req-1");

        let v1 = ConfigFile::new_initial("uuid-1", "file-1", "pg.conf", 0o600, "port=5432");
        s.create_config_file(&ctx, &v1).unwrap();

        let v2 = v1.with_new_content("file-2", "port=5433");
        s.create_config_file(&ctx, &v2).unwrap();

        // both versions remain addressable until the old one is deleted
        let old = s.get_config_file(&ctx, "uuid-1", "file-1").unwrap();
        let new = s.get_config_file(&ctx, "uuid-1", "file-2").unwrap();
        assert_eq!(old.content, "port=5432");
        assert_eq!(new.content, "port=5433");
        assert_ne!(old.file_md5, new.file_md5);

        s.delete_config_file(&ctx, "uuid-1", "file-1").unwrap();
        assert!(s.get_config_file(&ctx, "uuid-1", "file-2").is_ok());
    }
}
