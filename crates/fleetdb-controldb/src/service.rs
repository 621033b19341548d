//! Service registry service
//!
//! Maps a service name within a cluster to the service UUID under which
//! all of its other state is keyed. Registry records are immutable;
//! deletion is idempotent so teardown can be retried.

use crate::layout;
use crate::list;
use crate::svc::KeyedStore;
use fleetdb_common::{Error, ReqContext, Result, Service};
use fleetdb_store::ListPage;
use std::path::PathBuf;
use tracing::debug;

pub struct ServiceSvc {
    root: PathBuf,
    store: KeyedStore<Service>,
    retry_limit: u32,
}

impl ServiceSvc {
    pub fn new(root: PathBuf, cache_capacity: usize, retry_limit: u32) -> Self {
        Self {
            root,
            store: KeyedStore::new(cache_capacity, retry_limit),
            retry_limit,
        }
    }

    fn resolve(&self, cluster_name: &str, service_name: &str) -> Result<(String, PathBuf)> {
        layout::validate_key_component(cluster_name)?;
        layout::validate_key_component(service_name)?;
        let key = format!("{cluster_name}/{service_name}");
        let dir = layout::service_dir(&self.root, cluster_name, service_name);
        Ok((key, dir))
    }

    pub fn create_service(&self, ctx: &ReqContext, svc: &Service) -> Result<()> {
        let (key, dir) = self.resolve(&svc.cluster_name, &svc.service_name)?;
        if svc.service_uuid.is_empty() {
            return Err(Error::invalid_request("service uuid must not be empty"));
        }
        self.store.create(&key, dir, svc)?;
        debug!(
            "created service {} uuid {}, req {}",
            key, svc.service_uuid, ctx.req_id
        );
        Ok(())
    }

    pub fn get_service(
        &self,
        _ctx: &ReqContext,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<Service> {
        let (key, dir) = self.resolve(cluster_name, service_name)?;
        self.store.get(&key, dir)
    }

    /// Deleting a missing registration succeeds.
    pub fn delete_service(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<()> {
        let (key, dir) = self.resolve(cluster_name, service_name)?;
        self.store.delete(&key, dir, true)?;
        debug!("deleted service {}, req {}", key, ctx.req_id);
        Ok(())
    }

    pub fn list_services_page(
        &self,
        _ctx: &ReqContext,
        cluster_name: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<Service>> {
        layout::validate_key_component(cluster_name)?;
        let scope = layout::service_scope(&self.root, cluster_name);
        list::scan_page(&scope, token, limit, self.retry_limit)
    }
}
