//! Service member service
//!
//! One record per replica, keyed by (service UUID, member name). Members
//! are created ahead of scheduling with placeholder owner identifiers;
//! the scheduler later reassigns the owner via conditional update. The
//! volume, device, zone and names are fixed at creation. Deletion gates
//! teardown, so deleting a missing member is an error.

use crate::layout;
use crate::list;
use crate::svc::KeyedStore;
use fleetdb_common::{Error, ReqContext, Result, ServiceMember};
use fleetdb_store::ListPage;
use std::path::PathBuf;
use tracing::{debug, error};

pub struct MemberSvc {
    root: PathBuf,
    store: KeyedStore<ServiceMember>,
    retry_limit: u32,
}

impl MemberSvc {
    pub fn new(root: PathBuf, cache_capacity: usize, retry_limit: u32) -> Self {
        Self {
            root,
            store: KeyedStore::new(cache_capacity, retry_limit),
            retry_limit,
        }
    }

    fn resolve(&self, service_uuid: &str, member_name: &str) -> Result<(String, PathBuf)> {
        layout::validate_key_component(service_uuid)?;
        layout::validate_key_component(member_name)?;
        let key = format!("{service_uuid}/{member_name}");
        let dir = layout::member_dir(&self.root, service_uuid, member_name);
        Ok((key, dir))
    }

    pub fn create_member(&self, ctx: &ReqContext, member: &ServiceMember) -> Result<()> {
        let (key, dir) = self.resolve(&member.service_uuid, &member.member_name)?;
        if member.volume_id.is_empty() {
            return Err(Error::invalid_request("volume id must not be empty"));
        }
        self.store.create(&key, dir, member)?;
        debug!(
            "created member {} volume {}, req {}",
            key, member.volume_id, ctx.req_id
        );
        Ok(())
    }

    pub fn get_member(
        &self,
        _ctx: &ReqContext,
        service_uuid: &str,
        member_name: &str,
    ) -> Result<ServiceMember> {
        let (key, dir) = self.resolve(service_uuid, member_name)?;
        self.store.get(&key, dir)
    }

    pub fn update_member(
        &self,
        ctx: &ReqContext,
        old_member: &ServiceMember,
        new_member: &ServiceMember,
    ) -> Result<()> {
        if !old_member.immutable_fields_match(new_member) {
            error!(
                "immutable member fields changed for {}/{}, req {}",
                old_member.service_uuid, old_member.member_name, ctx.req_id
            );
            return Err(Error::invalid_request(
                "service uuid, volume id, device name, zone and member name are immutable",
            ));
        }
        let (key, dir) = self.resolve(&old_member.service_uuid, &old_member.member_name)?;
        self.store.update(&key, dir, old_member, new_member)?;
        debug!(
            "updated member {} owner {}, req {}",
            key, new_member.server_instance_id, ctx.req_id
        );
        Ok(())
    }

    /// Deleting a missing member record is an error.
    pub fn delete_member(
        &self,
        ctx: &ReqContext,
        service_uuid: &str,
        member_name: &str,
    ) -> Result<()> {
        let (key, dir) = self.resolve(service_uuid, member_name)?;
        self.store.delete(&key, dir, false)?;
        debug!("deleted member {}, req {}", key, ctx.req_id);
        Ok(())
    }

    pub fn list_members_page(
        &self,
        _ctx: &ReqContext,
        service_uuid: &str,
        token: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage<ServiceMember>> {
        layout::validate_key_component(service_uuid)?;
        let scope = layout::member_scope(&self.root, service_uuid);
        list::scan_page(&scope, token, limit, self.retry_limit)
    }
}
