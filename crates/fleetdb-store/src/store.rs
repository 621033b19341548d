//! The `MetadataStore` facade trait
//!
//! Semantics shared by every backend:
//!
//! - creations are create-if-not-exist: creating a key that already holds
//!   a semantically different record fails with
//!   [`Error::ConditionalCheckFailed`]; re-creating an identical record
//!   succeeds, so clients can safely retry after ambiguous failures.
//! - service-attribute and service-member updates are update-if-match
//!   against the old record the caller last read; a mismatch fails with
//!   [`Error::ConditionalCheckFailed`] and is never silently overwritten.
//! - gets and lists are strongly consistent.
//! - delete semantics differ by entity on purpose: attribute and member
//!   deletion of a missing key is [`Error::RecordNotFound`] (these
//!   deletes gate state machines), while device, service-registry and
//!   config-file deletion of a missing key succeeds (best-effort cleanup
//!   that must be repeatable).
//!
//! [`Error::ConditionalCheckFailed`]: fleetdb_common::Error::ConditionalCheckFailed
//! [`Error::RecordNotFound`]: fleetdb_common::Error::RecordNotFound

use crate::list::ListPage;
use async_trait::async_trait;
use fleetdb_common::{
    ConfigFile, Device, ReqContext, Result, Service, ServiceAttr, ServiceMember,
};

/// Abstract metadata store implemented by the embedded file-backed store
/// and the managed-cloud adapter.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ---- Devices ----

    async fn create_device(&self, ctx: &ReqContext, dev: &Device) -> Result<()>;

    async fn get_device(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        device_name: &str,
    ) -> Result<Device>;

    /// Idempotent: deleting a missing device succeeds.
    async fn delete_device(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        device_name: &str,
    ) -> Result<()>;

    async fn list_devices_page(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<Device>>;

    /// Exhaustive listing; drains pages internally.
    async fn list_devices(&self, ctx: &ReqContext, cluster_name: &str) -> Result<Vec<Device>> {
        let mut devs = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .list_devices_page(ctx, cluster_name, token.as_deref(), None)
                .await?;
            devs.extend(page.items);
            match page.next_token {
                Some(t) => token = Some(t),
                None => return Ok(devs),
            }
        }
    }

    // ---- Service registry ----

    async fn create_service(&self, ctx: &ReqContext, svc: &Service) -> Result<()>;

    async fn get_service(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<Service>;

    /// Idempotent: deleting a missing service registration succeeds.
    async fn delete_service(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<()>;

    async fn list_services_page(
        &self,
        ctx: &ReqContext,
        cluster_name: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<Service>>;

    /// Exhaustive listing; drains pages internally.
    async fn list_services(&self, ctx: &ReqContext, cluster_name: &str) -> Result<Vec<Service>> {
        let mut svcs = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .list_services_page(ctx, cluster_name, token.as_deref(), None)
                .await?;
            svcs.extend(page.items);
            match page.next_token {
                Some(t) => token = Some(t),
                None => return Ok(svcs),
            }
        }
    }

    // ---- Service attributes ----

    async fn create_service_attr(&self, ctx: &ReqContext, attr: &ServiceAttr) -> Result<()>;

    async fn get_service_attr(&self, ctx: &ReqContext, service_uuid: &str) -> Result<ServiceAttr>;

    /// Conditional update against `old_attr`; immutable fields must match
    /// between old and new or the call fails with `InvalidRequest`.
    async fn update_service_attr(
        &self,
        ctx: &ReqContext,
        old_attr: &ServiceAttr,
        new_attr: &ServiceAttr,
    ) -> Result<()>;

    /// Deleting a missing attribute record is `RecordNotFound`.
    async fn delete_service_attr(&self, ctx: &ReqContext, service_uuid: &str) -> Result<()>;

    // ---- Service members ----

    async fn create_service_member(&self, ctx: &ReqContext, member: &ServiceMember) -> Result<()>;

    async fn get_service_member(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        member_name: &str,
    ) -> Result<ServiceMember>;

    /// Conditional update against `old_member`; immutable fields must
    /// match between old and new or the call fails with `InvalidRequest`.
    async fn update_service_member(
        &self,
        ctx: &ReqContext,
        old_member: &ServiceMember,
        new_member: &ServiceMember,
    ) -> Result<()>;

    /// Deleting a missing member record is `RecordNotFound`.
    async fn delete_service_member(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        member_name: &str,
    ) -> Result<()>;

    async fn list_service_members_page(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<ServiceMember>>;

    /// Exhaustive listing; drains pages internally.
    async fn list_service_members(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
    ) -> Result<Vec<ServiceMember>> {
        let mut members = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .list_service_members_page(ctx, service_uuid, token.as_deref(), None)
                .await?;
            members.extend(page.items);
            match page.next_token {
                Some(t) => token = Some(t),
                None => return Ok(members),
            }
        }
    }

    // ---- Config files ----

    async fn create_config_file(&self, ctx: &ReqContext, cfg: &ConfigFile) -> Result<()>;

    async fn get_config_file(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        file_id: &str,
    ) -> Result<ConfigFile>;

    /// Idempotent: deleting a missing config file succeeds.
    async fn delete_config_file(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        file_id: &str,
    ) -> Result<()>;
}
