//! On-disk layout of the embedded store
//!
//! One directory per storage key, grouped by scope:
//!
//! ```text
//! <root>/clusters/<cluster>/devices/<device>/     version log
//! <root>/clusters/<cluster>/services/<service>/   version log
//! <root>/instances/<uuid>/attr/                   version log
//! <root>/instances/<uuid>/members/<member>/       version log
//! <root>/instances/<uuid>/configs/<file_id>/      version log
//! ```
//!
//! Key removal renames the key directory to a sibling `*.trash` name
//! before deleting it, so a removal is observable only as all-or-nothing;
//! interrupted removals leave a trash directory that is swept on the next
//! scan of the parent scope.

use fleetdb_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Suffix of a key directory that has been unlinked but not yet deleted.
pub const TRASH_SUFFIX: &str = ".trash";

const CLUSTERS_DIR: &str = "clusters";
const INSTANCES_DIR: &str = "instances";
const DEVICES_DIR: &str = "devices";
const SERVICES_DIR: &str = "services";
const ATTR_DIR: &str = "attr";
const MEMBERS_DIR: &str = "members";
const CONFIGS_DIR: &str = "configs";

/// Validate a caller-supplied key component before it becomes a path
/// segment. Violations are malformed-key `InvalidRequest` errors.
pub fn validate_key_component(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_request("key component must not be empty"));
    }
    if name.len() > 255 {
        return Err(Error::invalid_request(format!(
            "key component too long: {} bytes",
            name.len()
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_request(format!(
            "key component not allowed: {name}"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(Error::invalid_request(format!(
            "key component contains path separator or NUL: {name}"
        )));
    }
    if name.ends_with(TRASH_SUFFIX) {
        return Err(Error::invalid_request(format!(
            "key component uses reserved suffix: {name}"
        )));
    }
    Ok(())
}

/// Device names are block device paths like `/dev/xvdf`; the slashes are
/// flattened for use as a single path segment.
#[must_use]
pub fn encode_device_name(device_name: &str) -> String {
    device_name.trim_start_matches('/').replace('/', "_")
}

pub fn device_scope(root: &Path, cluster_name: &str) -> PathBuf {
    root.join(CLUSTERS_DIR).join(cluster_name).join(DEVICES_DIR)
}

pub fn device_dir(root: &Path, cluster_name: &str, device_name: &str) -> PathBuf {
    device_scope(root, cluster_name).join(encode_device_name(device_name))
}

pub fn service_scope(root: &Path, cluster_name: &str) -> PathBuf {
    root.join(CLUSTERS_DIR).join(cluster_name).join(SERVICES_DIR)
}

pub fn service_dir(root: &Path, cluster_name: &str, service_name: &str) -> PathBuf {
    service_scope(root, cluster_name).join(service_name)
}

pub fn attr_dir(root: &Path, service_uuid: &str) -> PathBuf {
    root.join(INSTANCES_DIR).join(service_uuid).join(ATTR_DIR)
}

pub fn member_scope(root: &Path, service_uuid: &str) -> PathBuf {
    root.join(INSTANCES_DIR).join(service_uuid).join(MEMBERS_DIR)
}

pub fn member_dir(root: &Path, service_uuid: &str, member_name: &str) -> PathBuf {
    member_scope(root, service_uuid).join(member_name)
}

pub fn config_scope(root: &Path, service_uuid: &str) -> PathBuf {
    root.join(INSTANCES_DIR).join(service_uuid).join(CONFIGS_DIR)
}

pub fn config_dir(root: &Path, service_uuid: &str, file_id: &str) -> PathBuf {
    config_scope(root, service_uuid).join(file_id)
}

/// Delete leftover `*.trash` directories under a scope directory.
/// Failures are logged and retried on the next sweep.
pub fn sweep_trash(scope: &Path) {
    let entries = match std::fs::read_dir(scope) {
        Ok(entries) => entries,
        Err(_) => return, // scope not created yet
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(TRASH_SUFFIX) {
            let path = entry.path();
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("failed to sweep trash dir {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_component() {
        assert!(validate_key_component("postgres-0").is_ok());
        assert!(validate_key_component("").is_err());
        assert!(validate_key_component(".").is_err());
        assert!(validate_key_component("..").is_err());
        assert!(validate_key_component("a/b").is_err());
        assert!(validate_key_component("a\0b").is_err());
        assert!(validate_key_component("key.trash").is_err());
        assert!(validate_key_component(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_encode_device_name() {
        assert_eq!(encode_device_name("/dev/xvdf"), "dev_xvdf");
        assert_eq!(encode_device_name("xvdf"), "xvdf");
    }

    #[test]
    fn test_layout_paths() {
        let root = Path::new("/var/lib/fleetdb");
        assert_eq!(
            device_dir(root, "c1", "/dev/xvdf"),
            Path::new("/var/lib/fleetdb/clusters/c1/devices/dev_xvdf")
        );
        assert_eq!(
            attr_dir(root, "uuid-1"),
            Path::new("/var/lib/fleetdb/instances/uuid-1/attr")
        );
        assert_eq!(
            member_dir(root, "uuid-1", "postgres-0"),
            Path::new("/var/lib/fleetdb/instances/uuid-1/members/postgres-0")
        );
    }

    #[test]
    fn test_sweep_trash() {
        let dir = tempfile::tempdir().unwrap();
        let scope = dir.path().join("members");
        std::fs::create_dir_all(scope.join("live-key")).unwrap();
        std::fs::create_dir_all(scope.join("dead-key.1234.trash")).unwrap();

        sweep_trash(&scope);

        assert!(scope.join("live-key").exists());
        assert!(!scope.join("dead-key.1234.trash").exists());
    }
}
