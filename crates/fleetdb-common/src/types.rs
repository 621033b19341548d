//! Entity types stored by FleetDB
//!
//! One service owns one attribute record, N member records and N config
//! file records. Device and service registry records are immutable;
//! attributes and members are updated via compare-and-swap against the
//! previously read snapshot, so every mutable entity carries a
//! `last_modified` nanosecond timestamp that acts as a version witness.
//! The timestamp is regenerated on every admitted write, which is why the
//! CAS comparison for each entity deliberately skips it (a client retry
//! after an ambiguous failure must not be misdiagnosed as a conflict).

use crate::checksum;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Service status: being provisioned, members not all created yet.
pub const STATUS_CREATING: &str = "CREATING";
/// Service status: fully provisioned and serving.
pub const STATUS_ACTIVE: &str = "ACTIVE";
/// Service status: teardown in progress.
pub const STATUS_DELETING: &str = "DELETING";
/// Service status: torn down, record kept for audit until purged.
pub const STATUS_DELETED: &str = "DELETED";

// Service members are created before the scheduler places them, so the
// owner identifiers are unknown at creation time. They are set to fixed
// placeholders, which keeps the later conditional update simple.
pub const DEFAULT_TASK_ID: &str = "defaultTaskID";
pub const DEFAULT_CONTAINER_INSTANCE_ID: &str = "defaultContainerInstanceID";
pub const DEFAULT_SERVER_INSTANCE_ID: &str = "defaultServerInstanceID";

/// Nanosecond unix timestamp used as the last-modified version witness.
#[must_use]
pub fn now_unix_nano() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i64,
        // clock before epoch; treat as epoch rather than panic
        Err(_) => 0,
    }
}

/// Records that a device name within a cluster is claimed by a service.
/// Immutable once created; prevents device-name collisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub cluster_name: String,
    pub device_name: String,
    pub service_name: String,
}

impl Device {
    pub fn new(
        cluster_name: impl Into<String>,
        device_name: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            device_name: device_name.into(),
            service_name: service_name.into(),
        }
    }
}

/// Registry record mapping a service name to its UUID within a cluster.
/// Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub cluster_name: String,
    pub service_name: String,
    pub service_uuid: String,
}

impl Service {
    pub fn new(
        cluster_name: impl Into<String>,
        service_name: impl Into<String>,
        service_uuid: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            service_name: service_name.into(),
            service_uuid: service_uuid.into(),
        }
    }
}

/// Mutable service-level metadata, keyed by service UUID.
///
/// `service_uuid`, `cluster_name`, `service_name` and `device_name` never
/// change after creation; only the status, the DNS fields and the
/// timestamp may be updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceAttr {
    pub service_uuid: String,
    pub service_status: String,
    pub last_modified: i64,
    pub replicas: i64,
    pub volume_size_gb: i64,
    pub cluster_name: String,
    pub service_name: String,
    pub device_name: String,
    pub register_dns: bool,
    pub domain_name: String,
    pub hosted_zone_id: String,
}

impl ServiceAttr {
    /// Attribute record for a service that is just being created:
    /// status CREATING and a fresh timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn new_initial(
        service_uuid: impl Into<String>,
        replicas: i64,
        volume_size_gb: i64,
        cluster_name: impl Into<String>,
        service_name: impl Into<String>,
        device_name: impl Into<String>,
        register_dns: bool,
        domain_name: impl Into<String>,
        hosted_zone_id: impl Into<String>,
    ) -> Self {
        Self {
            service_uuid: service_uuid.into(),
            service_status: STATUS_CREATING.to_string(),
            last_modified: now_unix_nano(),
            replicas,
            volume_size_gb,
            cluster_name: cluster_name.into(),
            service_name: service_name.into(),
            device_name: device_name.into(),
            register_dns,
            domain_name: domain_name.into(),
            hosted_zone_id: hosted_zone_id.into(),
        }
    }

    /// New record with the status replaced and a fresh timestamp; all
    /// immutable fields are carried over.
    #[must_use]
    pub fn with_status(&self, status: impl Into<String>) -> Self {
        Self {
            service_status: status.into(),
            last_modified: now_unix_nano(),
            ..self.clone()
        }
    }

    /// Timestamp-excluded equality used for the CAS comparison.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self, skip_mtime: bool) -> bool {
        self.service_uuid == other.service_uuid
            && self.service_status == other.service_status
            && (skip_mtime || self.last_modified == other.last_modified)
            && self.replicas == other.replicas
            && self.volume_size_gb == other.volume_size_gb
            && self.cluster_name == other.cluster_name
            && self.service_name == other.service_name
            && self.device_name == other.device_name
            && self.register_dns == other.register_dns
            && self.domain_name == other.domain_name
            && self.hosted_zone_id == other.hosted_zone_id
    }

    /// Whether the fields that must not change across an update match.
    #[must_use]
    pub fn immutable_fields_match(&self, other: &Self) -> bool {
        self.service_uuid == other.service_uuid
            && self.cluster_name == other.cluster_name
            && self.service_name == other.service_name
            && self.device_name == other.device_name
    }
}

/// Reference from a service member to one of its config files.
/// The position in the member's config list is the file precedence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub file_name: String,
    pub file_id: String,
    pub file_md5: String,
}

/// Per-replica placement state, keyed by (service UUID, member name).
///
/// The owner identifiers (`task_id`, `container_instance_id`,
/// `server_instance_id`) are reassigned whenever the replica is
/// rescheduled; everything else is fixed at creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceMember {
    pub service_uuid: String,
    pub volume_id: String,
    pub last_modified: i64,
    pub device_name: String,
    pub available_zone: String,
    pub task_id: String,
    pub container_instance_id: String,
    pub server_instance_id: String,
    pub member_name: String,
    pub configs: Vec<MemberConfig>,
}

impl ServiceMember {
    /// Member record created ahead of scheduling, with placeholder owner
    /// identifiers and a fresh timestamp.
    pub fn new_initial(
        service_uuid: impl Into<String>,
        volume_id: impl Into<String>,
        device_name: impl Into<String>,
        available_zone: impl Into<String>,
        member_name: impl Into<String>,
        configs: Vec<MemberConfig>,
    ) -> Self {
        Self {
            service_uuid: service_uuid.into(),
            volume_id: volume_id.into(),
            last_modified: now_unix_nano(),
            device_name: device_name.into(),
            available_zone: available_zone.into(),
            task_id: DEFAULT_TASK_ID.to_string(),
            container_instance_id: DEFAULT_CONTAINER_INSTANCE_ID.to_string(),
            server_instance_id: DEFAULT_SERVER_INSTANCE_ID.to_string(),
            member_name: member_name.into(),
            configs,
        }
    }

    /// New record with the owner identifiers reassigned and a fresh
    /// timestamp.
    #[must_use]
    pub fn with_owner(
        &self,
        task_id: impl Into<String>,
        container_instance_id: impl Into<String>,
        server_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            container_instance_id: container_instance_id.into(),
            server_instance_id: server_instance_id.into(),
            last_modified: now_unix_nano(),
            ..self.clone()
        }
    }

    /// New record with the config references replaced and a fresh
    /// timestamp.
    #[must_use]
    pub fn with_configs(&self, configs: Vec<MemberConfig>) -> Self {
        Self {
            configs,
            last_modified: now_unix_nano(),
            ..self.clone()
        }
    }

    /// Timestamp-excluded equality used for the CAS comparison. Config
    /// lists are compared element-wise in order.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self, skip_mtime: bool) -> bool {
        self.service_uuid == other.service_uuid
            && self.volume_id == other.volume_id
            && (skip_mtime || self.last_modified == other.last_modified)
            && self.device_name == other.device_name
            && self.available_zone == other.available_zone
            && self.task_id == other.task_id
            && self.container_instance_id == other.container_instance_id
            && self.server_instance_id == other.server_instance_id
            && self.member_name == other.member_name
            && self.configs == other.configs
    }

    /// Whether the fields that must not change across an update match.
    #[must_use]
    pub fn immutable_fields_match(&self, other: &Self) -> bool {
        self.service_uuid == other.service_uuid
            && self.volume_id == other.volume_id
            && self.device_name == other.device_name
            && self.available_zone == other.available_zone
            && self.member_name == other.member_name
    }
}

/// Immutable-content config blob, keyed by (service UUID, file id).
///
/// An "update" never mutates a config file in place: it allocates a new
/// file id with new content, so members can keep referencing old
/// versions until they roll forward. Old records persist until deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub service_uuid: String,
    pub file_id: String,
    pub file_md5: String,
    pub file_name: String,
    pub file_mode: u32,
    pub last_modified: i64,
    pub content: String,
}

impl ConfigFile {
    /// New config file with the checksum computed from the content.
    pub fn new_initial(
        service_uuid: impl Into<String>,
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        file_mode: u32,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let file_md5 = checksum::content_md5(&content);
        Self {
            service_uuid: service_uuid.into(),
            file_id: file_id.into(),
            file_md5,
            file_name: file_name.into(),
            file_mode,
            last_modified: now_unix_nano(),
            content,
        }
    }

    /// Build a config file from parts that already carry a checksum,
    /// verifying the checksum against the content. A mismatch means the
    /// input was corrupted in transit, not a bad client request.
    #[allow(clippy::too_many_arguments)]
    pub fn new_checked(
        service_uuid: impl Into<String>,
        file_id: impl Into<String>,
        file_md5: impl Into<String>,
        file_name: impl Into<String>,
        file_mode: u32,
        last_modified: i64,
        content: impl Into<String>,
    ) -> Result<Self> {
        let content = content.into();
        let file_md5 = file_md5.into();
        let file_id = file_id.into();
        let actual = checksum::content_md5(&content);
        if actual != file_md5 {
            return Err(Error::internal(format!(
                "config file {file_id} content corrupted, expect md5 {file_md5} content md5 {actual}"
            )));
        }
        Ok(Self {
            service_uuid: service_uuid.into(),
            file_id,
            file_md5,
            file_name: file_name.into(),
            file_mode,
            last_modified,
            content,
        })
    }

    /// New config file record replacing the content: fresh file id,
    /// recomputed checksum and a fresh timestamp. The old record is not
    /// touched.
    #[must_use]
    pub fn with_new_content(
        &self,
        new_file_id: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        let content = new_content.into();
        let file_md5 = checksum::content_md5(&content);
        Self {
            service_uuid: self.service_uuid.clone(),
            file_id: new_file_id.into(),
            file_md5,
            file_name: self.file_name.clone(),
            file_mode: self.file_mode,
            last_modified: now_unix_nano(),
            content,
        }
    }

    /// Equality with the timestamp and optionally the content excluded.
    /// Skipping content is safe when both checksums are present, since
    /// the checksum pins the content.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self, skip_mtime: bool, skip_content: bool) -> bool {
        self.service_uuid == other.service_uuid
            && self.file_id == other.file_id
            && self.file_md5 == other.file_md5
            && self.file_name == other.file_name
            && self.file_mode == other.file_mode
            && (skip_mtime || self.last_modified == other.last_modified)
            && (skip_content || self.content == other.content)
    }
}
