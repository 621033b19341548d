//! Device claim service
//!
//! A device record claims a block device name for a service within a
//! cluster, preventing two services from mounting the same device. The
//! records are immutable; deletion is best-effort cleanup and therefore
//! idempotent.

use crate::layout;
use crate::list;
use crate::svc::KeyedStore;
use fleetdb_common::{Device, ReqContext, Result};
use fleetdb_store::ListPage;
use std::path::PathBuf;
use tracing::debug;

pub struct DeviceSvc {
    root: PathBuf,
    store: KeyedStore<Device>,
    retry_limit: u32,
}

impl DeviceSvc {
    pub fn new(root: PathBuf, cache_capacity: usize, retry_limit: u32) -> Self {
        Self {
            root,
            store: KeyedStore::new(cache_capacity, retry_limit),
            retry_limit,
        }
    }

    fn resolve(&self, cluster_name: &str, device_name: &str) -> Result<(String, PathBuf)> {
        layout::validate_key_component(cluster_name)?;
        let encoded = layout::encode_device_name(device_name);
        layout::validate_key_component(&encoded)?;
        let key = format!("{cluster_name}/{encoded}");
        let dir = layout::device_dir(&self.root, cluster_name, device_name);
        Ok((key, dir))
    }

    pub fn create_device(&self, ctx: &ReqContext, dev: &Device) -> Result<()> {
        let (key, dir) = self.resolve(&dev.cluster_name, &dev.device_name)?;
        layout::validate_key_component(&dev.service_name)?;
        self.store.create(&key, dir, dev)?;
        debug!(
            "created device {} for service {}, req {}",
            key, dev.service_name, ctx.req_id
        );
        Ok(())
    }

    pub fn get_device(
        &self,
        _ctx: &ReqContext,
        cluster_name: &str,
        device_name: &str,
    ) -> Result<Device> {
        let (key, dir) = self.resolve(cluster_name, device_name)?;
        self.store.get(&key, dir)
    }

    /// Deleting a missing device succeeds; cleanup paths retry it.
    pub fn delete_device(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        device_name: &str,
    ) -> Result<()> {
        let (key, dir) = self.resolve(cluster_name, device_name)?;
        self.store.delete(&key, dir, true)?;
        debug!("deleted device {}, req {}", key, ctx.req_id);
        Ok(())
    }

    pub fn list_devices_page(
        &self,
        _ctx: &ReqContext,
        cluster_name: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<Device>> {
        layout::validate_key_component(cluster_name)?;
        let scope = layout::device_scope(&self.root, cluster_name);
        list::scan_page(&scope, token, limit, self.retry_limit)
    }
}
