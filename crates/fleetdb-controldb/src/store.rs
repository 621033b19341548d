//! The embedded store facade
//!
//! `ControlDb` wires the five entity services over one root directory
//! and implements the `MetadataStore` trait, so control-plane callers
//! cannot tell it apart from the managed-cloud backend. Deadlines are
//! checked before any durable I/O is issued; once a write has started it
//! runs to completion, so a cancelled caller can never leave a key's
//! marker pointing at a partial snapshot.

use crate::attr::AttrSvc;
use crate::cache::HandleCache;
use crate::config::ConfigSvc;
use crate::device::DeviceSvc;
use crate::member::MemberSvc;
use crate::service::ServiceSvc;
use async_trait::async_trait;
use fleetdb_common::{
    ConfigFile, Device, ReqContext, Result, Service, ServiceAttr, ServiceMember, StoreConfig,
};
use fleetdb_store::{ListPage, MetadataStore};
use std::fs;
use tracing::info;

/// Embedded file-backed metadata store.
pub struct ControlDb {
    devices: DeviceSvc,
    services: ServiceSvc,
    attrs: AttrSvc,
    members: MemberSvc,
    configs: ConfigSvc,
}

impl ControlDb {
    /// Open (or create) the store rooted at `config.root_dir`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.root_dir)?;

        let root = config.root_dir.clone();
        let capacity = config.max_cached_handles;
        let retries = config.io_retry_limit;

        info!(
            "opened controldb at {} with {} cached handles per entity",
            root.display(),
            capacity
        );

        Ok(Self {
            devices: DeviceSvc::new(root.clone(), capacity, retries),
            services: ServiceSvc::new(root.clone(), capacity, retries),
            attrs: AttrSvc::new(root.clone(), capacity, retries),
            members: MemberSvc::new(root.clone(), capacity, retries),
            configs: ConfigSvc::new(root, capacity, retries),
        })
    }

    /// The service-attribute handle cache, for monitoring and tests.
    pub fn attr_cache(&self) -> &HandleCache<ServiceAttr> {
        self.attrs.cache()
    }
}

#[async_trait]
impl MetadataStore for ControlDb {
    // ---- Devices ----

    async fn create_device(&self, ctx: &ReqContext, dev: &Device) -> Result<()> {
        ctx.check_deadline()?;
        self.devices.create_device(ctx, dev)
    }

    async fn get_device(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        device_name: &str,
    ) -> Result<Device> {
        ctx.check_deadline()?;
        self.devices.get_device(ctx, cluster_name, device_name)
    }

    async fn delete_device(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        device_name: &str,
    ) -> Result<()> {
        ctx.check_deadline()?;
        self.devices.delete_device(ctx, cluster_name, device_name)
    }

    async fn list_devices_page(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<Device>> {
        ctx.check_deadline()?;
        self.devices
            .list_devices_page(ctx, cluster_name, token, limit)
    }

    // ---- Service registry ----

    async fn create_service(&self, ctx: &ReqContext, svc: &Service) -> Result<()> {
        ctx.check_deadline()?;
        self.services.create_service(ctx, svc)
    }

    async fn get_service(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<Service> {
        ctx.check_deadline()?;
        self.services.get_service(ctx, cluster_name, service_name)
    }

    async fn delete_service(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<()> {
        ctx.check_deadline()?;
        self.services.delete_service(ctx, cluster_name, service_name)
    }

    async fn list_services_page(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<Service>> {
        ctx.check_deadline()?;
        self.services
            .list_services_page(ctx, cluster_name, token, limit)
    }

    // ---- Service attributes ----

    async fn create_service_attr(&self, ctx: &ReqContext, attr: &ServiceAttr) -> Result<()> {
        ctx.check_deadline()?;
        self.attrs.create_attr(ctx, attr)
    }

    async fn get_service_attr(&self, ctx: &ReqContext, service_uuid: &str) -> Result<ServiceAttr> {
        ctx.check_deadline()?;
        self.attrs.get_attr(ctx, service_uuid)
    }

    async fn update_service_attr(
        &self,
        ctx: &ReqContext,
        old_attr: &ServiceAttr,
        new_attr: &ServiceAttr,
    ) -> Result<()> {
        ctx.check_deadline()?;
        self.attrs.update_attr(ctx, old_attr, new_attr)
    }

    async fn delete_service_attr(&self, ctx: &ReqContext, service_uuid: &str) -> Result<()> {
        ctx.check_deadline()?;
        self.attrs.delete_attr(ctx, service_uuid)
    }

    // ---- Service members ----

    async fn create_service_member(&self, ctx: &ReqContext, member: &ServiceMember) -> Result<()> {
        ctx.check_deadline()?;
        self.members.create_member(ctx, member)
    }

    async fn get_service_member(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        member_name: &str,
    ) -> Result<ServiceMember> {
        ctx.check_deadline()?;
        self.members.get_member(ctx, service_uuid, member_name)
    }

    async fn update_service_member(
        &self,
        ctx: &ReqContext,
        old_member: &ServiceMember,
        new_member: &ServiceMember,
    ) -> Result<()> {
        ctx.check_deadline()?;
        self.members.update_member(ctx, old_member, new_member)
    }

    async fn delete_service_member(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        member_name: &str,
    ) -> Result<()> {
        ctx.check_deadline()?;
        self.members.delete_member(ctx, service_uuid, member_name)
    }

    async fn list_service_members_page(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<ServiceMember>> {
        ctx.check_deadline()?;
        self.members
            .list_members_page(ctx, service_uuid, token, limit)
    }

    // ---- Config files ----

    async fn create_config_file(&self, ctx: &ReqContext, cfg: &ConfigFile) -> Result<()> {
        ctx.check_deadline()?;
        self.configs.create_config_file(ctx, cfg)
    }

    async fn get_config_file(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        file_id: &str,
    ) -> Result<ConfigFile> {
        ctx.check_deadline()?;
        self.configs.get_config_file(ctx, service_uuid, file_id)
    }

    async fn delete_config_file(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        file_id: &str,
    ) -> Result<()> {
        ctx.check_deadline()?;
        self.configs.delete_config_file(ctx, service_uuid, file_id)
    }
}
