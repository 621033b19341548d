//! Service attribute service
//!
//! One mutable attribute record per service, keyed by service UUID.
//! Updates are conditional on the caller's last-read snapshot, and the
//! identity fields may never change across an update; the service
//! rejects such requests before any I/O. Deletion gates the service
//! teardown state machine, so deleting a missing record is an error.

use crate::layout;
use crate::svc::KeyedStore;
use fleetdb_common::{Error, ReqContext, Result, ServiceAttr};
use std::path::PathBuf;
use tracing::{debug, error};

pub struct AttrSvc {
    root: PathBuf,
    store: KeyedStore<ServiceAttr>,
}

impl AttrSvc {
    pub fn new(root: PathBuf, cache_capacity: usize, retry_limit: u32) -> Self {
        Self {
            root,
            store: KeyedStore::new(cache_capacity, retry_limit),
        }
    }

    fn resolve(&self, service_uuid: &str) -> Result<(String, PathBuf)> {
        layout::validate_key_component(service_uuid)?;
        Ok((
            service_uuid.to_string(),
            layout::attr_dir(&self.root, service_uuid),
        ))
    }

    pub fn create_attr(&self, ctx: &ReqContext, attr: &ServiceAttr) -> Result<()> {
        let (key, dir) = self.resolve(&attr.service_uuid)?;
        layout::validate_key_component(&attr.cluster_name)?;
        layout::validate_key_component(&attr.service_name)?;
        self.store.create(&key, dir, attr)?;
        debug!(
            "created service attr {} status {}, req {}",
            key, attr.service_status, ctx.req_id
        );
        Ok(())
    }

    pub fn get_attr(&self, _ctx: &ReqContext, service_uuid: &str) -> Result<ServiceAttr> {
        let (key, dir) = self.resolve(service_uuid)?;
        self.store.get(&key, dir)
    }

    pub fn update_attr(
        &self,
        ctx: &ReqContext,
        old_attr: &ServiceAttr,
        new_attr: &ServiceAttr,
    ) -> Result<()> {
        if !old_attr.immutable_fields_match(new_attr) {
            error!(
                "immutable attr fields changed for {}, req {}",
                old_attr.service_uuid, ctx.req_id
            );
            return Err(Error::invalid_request(
                "service uuid, cluster, service and device names are immutable",
            ));
        }
        let (key, dir) = self.resolve(&old_attr.service_uuid)?;
        self.store.update(&key, dir, old_attr, new_attr)?;
        debug!(
            "updated service attr {} to status {}, req {}",
            key, new_attr.service_status, ctx.req_id
        );
        Ok(())
    }

    /// Deleting a missing attribute record is an error: the teardown
    /// state machine relies on observing the transition.
    pub fn delete_attr(&self, ctx: &ReqContext, service_uuid: &str) -> Result<()> {
        let (key, dir) = self.resolve(service_uuid)?;
        self.store.delete(&key, dir, false)?;
        debug!("deleted service attr {}, req {}", key, ctx.req_id);
        Ok(())
    }

    pub fn cache(&self) -> &crate::cache::HandleCache<ServiceAttr> {
        self.store.cache()
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &KeyedStore<ServiceAttr> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetdb_common::STATUS_ACTIVE;
    use tempfile::tempdir;

    fn attr(uuid: &str) -> ServiceAttr {
        ServiceAttr::new_initial(
            uuid, 3, 10, "cluster-a", "postgres", "/dev/xvdf", true, "example.com", "zone-1",
        )
    }

    #[test]
    fn test_attr_create_update_get_delete() {
        let dir = tempdir().unwrap();
        let s = AttrSvc::new(dir.path().to_path_buf(), 8, 3);
        let ctx = ReqContext::new("req-1");

        let v0 = attr("uuid-1");
        s.create_attr(&ctx, &v0).unwrap();
        // request retry with regenerated timestamp
        let mut retried = v0.clone();
        retried.last_modified += 1;
        s.create_attr(&ctx, &retried).unwrap();

        // differing record
        let mut other = v0.clone();
        other.service_name = "unknown-service".to_string();
        assert!(matches!(
            s.create_attr(&ctx, &other),
            Err(Error::ConditionalCheckFailed)
        ));

        let v1 = v0.with_status(STATUS_ACTIVE);
        s.update_attr(&ctx, &v0, &v1).unwrap();

        // stale writer
        assert!(matches!(
            s.update_attr(&ctx, &v0, &v0.with_status("DELETING")),
            Err(Error::ConditionalCheckFailed)
        ));

        let read = s.get_attr(&ctx, "uuid-1").unwrap();
        assert_eq!(read.service_status, STATUS_ACTIVE);

        s.delete_attr(&ctx, "uuid-1").unwrap();
        assert!(matches!(
            s.get_attr(&ctx, "uuid-1"),
            Err(Error::RecordNotFound)
        ));
        // strict delete: absence is an error
        assert!(matches!(
            s.delete_attr(&ctx, "uuid-1"),
            Err(Error::RecordNotFound)
        ));
    }

    #[test]
    fn test_attr_immutable_fields_protected() {
        let dir = tempdir().unwrap();
        let s = AttrSvc::new(dir.path().to_path_buf(), 8, 3);
        let ctx = ReqContext::new("req-1");

        let v0 = attr("uuid-1");
        s.create_attr(&ctx, &v0).unwrap();

        let mut moved = v0.clone();
        moved.device_name = "/dev/xvdg".to_string();
        assert!(matches!(
            s.update_attr(&ctx, &v0, &moved),
            Err(Error::InvalidRequest(_))
        ));

        // dns fields are mutable
        let mut renamed = v0.clone();
        renamed.domain_name = "internal.example.com".to_string();
        renamed.last_modified = fleetdb_common::now_unix_nano();
        s.update_attr(&ctx, &v0, &renamed).unwrap();
    }

    #[test]
    fn test_attr_version_advances() {
        let dir = tempdir().unwrap();
        let s = AttrSvc::new(dir.path().to_path_buf(), 8, 3);
        let ctx = ReqContext::new("req-1");

        let v0 = attr("uuid-1");
        s.create_attr(&ctx, &v0).unwrap();
        s.update_attr(&ctx, &v0, &v0.with_status(STATUS_ACTIVE))
            .unwrap();

        let (key, key_dir) = s.resolve("uuid-1").unwrap();
        let handle = s
            .store()
            .cache()
            .get_or_create(&key, || crate::rw::RecordIo::new(key_dir, 3));
        assert_eq!(handle.versions().unwrap(), Some((0, 1)));
    }
}
