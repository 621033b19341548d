//! End-to-end tests for the embedded store through the facade trait.

use fleetdb_common::{
    ConfigFile, Device, Error, MemberConfig, ReqContext, STATUS_ACTIVE, STATUS_CREATING, Service,
    ServiceAttr, ServiceMember, StoreConfig, checksum,
};
use fleetdb_controldb::ControlDb;
use fleetdb_store::MetadataStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn open_db(root: &std::path::Path, capacity: usize) -> ControlDb {
    let config = StoreConfig {
        root_dir: root.to_path_buf(),
        max_cached_handles: capacity,
        io_retry_limit: 3,
    };
    ControlDb::open(config).unwrap()
}

fn attr(uuid: &str, replicas: i64) -> ServiceAttr {
    ServiceAttr::new_initial(
        uuid,
        replicas,
        10,
        "cluster-a",
        format!("service-{replicas}"),
        "/dev/xvdf",
        true,
        "example.com",
        "zone-1",
    )
}

fn member(uuid: &str, name: &str) -> ServiceMember {
    ServiceMember::new_initial(
        uuid,
        format!("vol-{name}"),
        "/dev/xvdf",
        "us-east-1a",
        name,
        vec![MemberConfig {
            file_name: "server.conf".to_string(),
            file_id: format!("file-{name}"),
            file_md5: checksum::content_md5("conf"),
        }],
    )
}

#[tokio::test]
async fn test_service_attr_scenario() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 8);
    let ctx = ReqContext::new("req-attr");

    // create ServiceAttr(UUID=s1, status=CREATING, replicas=3)
    let v0 = attr("s1", 3);
    assert_eq!(v0.service_status, STATUS_CREATING);
    db.create_service_attr(&ctx, &v0).await.unwrap();

    // create again identical: idempotent success
    db.create_service_attr(&ctx, &v0).await.unwrap();

    // update to ACTIVE against the created record
    let v1 = v0.with_status(STATUS_ACTIVE);
    db.update_service_attr(&ctx, &v0, &v1).await.unwrap();

    // a stale writer still holding the CREATING record fails
    let err = db
        .update_service_attr(&ctx, &v0, &v0.with_status("DELETING"))
        .await
        .unwrap_err();
    assert!(err.is_conditional_check_failed());

    // get returns ACTIVE
    let read = db.get_service_attr(&ctx, "s1").await.unwrap();
    assert_eq!(read.service_status, STATUS_ACTIVE);

    // delete, then get is not-found
    db.delete_service_attr(&ctx, "s1").await.unwrap();
    let err = db.get_service_attr(&ctx, "s1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_lru_eviction_scenario() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 5);
    let ctx = ReqContext::new("req-lru");

    // create and update 7 distinct attr keys in order 0..6
    let mut records = Vec::new();
    for i in 0..7 {
        let uuid = format!("uuid-{i}");
        let v0 = attr(&uuid, i);
        db.create_service_attr(&ctx, &v0).await.unwrap();
        let v1 = v0.with_status(STATUS_ACTIVE);
        db.update_service_attr(&ctx, &v0, &v1).await.unwrap();
        records.push(v1);
    }

    // the two least recently used keys fell out of the cache
    assert!(!db.attr_cache().contains("uuid-0"));
    assert!(!db.attr_cache().contains("uuid-1"));
    assert_eq!(db.attr_cache().len(), 5);

    // re-accessing an evicted key reads the same data back from disk
    let read = db.get_service_attr(&ctx, "uuid-0").await.unwrap();
    assert!(read.semantic_eq(&records[0], false));
    // and promotes it back to resident
    assert!(db.attr_cache().contains("uuid-0"));

    // touching uuid-2 then adding one more key must evict a colder key,
    // not uuid-2
    db.get_service_attr(&ctx, "uuid-2").await.unwrap();
    let v0 = attr("uuid-7", 7);
    db.create_service_attr(&ctx, &v0).await.unwrap();
    assert!(db.attr_cache().contains("uuid-2"));
    assert!(db.attr_cache().contains("uuid-7"));
    assert_eq!(db.attr_cache().len(), 5);
}

#[tokio::test]
async fn test_eviction_invisible_after_delete() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 1);
    let ctx = ReqContext::new("req-evict");

    let a = attr("uuid-a", 1);
    db.create_service_attr(&ctx, &a).await.unwrap();
    // pushes uuid-a out of the single-slot cache
    let b = attr("uuid-b", 2);
    db.create_service_attr(&ctx, &b).await.unwrap();
    assert!(!db.attr_cache().contains("uuid-a"));

    // the evicted key still reads correctly through a rebuilt handle
    let read = db.get_service_attr(&ctx, "uuid-a").await.unwrap();
    assert!(read.semantic_eq(&a, false));

    // deleting b, then getting it, is not-found even after its cache
    // entry was dropped
    db.delete_service_attr(&ctx, "uuid-b").await.unwrap();
    assert!(
        db.get_service_attr(&ctx, "uuid-b")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_single_winner() {
    let dir = tempdir().unwrap();
    let db = Arc::new(open_db(dir.path(), 8));
    let ctx = ReqContext::new("req-cas");

    let v0 = attr("uuid-cas", 3);
    db.create_service_attr(&ctx, &v0).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let db = Arc::clone(&db);
        let old = v0.clone();
        tasks.push(tokio::spawn(async move {
            let ctx = ReqContext::new(format!("req-cas-{i}"));
            let new = old.with_status(format!("STATE-{i}"));
            db.update_service_attr(&ctx, &old, &new).await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => wins += 1,
            Err(Error::ConditionalCheckFailed) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    // all writers shared the same expected snapshot: exactly one wins
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 7);

    let read = db.get_service_attr(&ctx, "uuid-cas").await.unwrap();
    assert!(read.service_status.starts_with("STATE-"));
}

#[tokio::test]
async fn test_device_and_service_registry() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 8);
    let ctx = ReqContext::new("req-reg");

    let dev = Device::new("c1", "/dev/xvdf", "postgres");
    db.create_device(&ctx, &dev).await.unwrap();
    let svc = Service::new("c1", "postgres", "uuid-1");
    db.create_service(&ctx, &svc).await.unwrap();

    // another service may not claim the device
    let clash = Device::new("c1", "/dev/xvdf", "redis");
    assert!(
        db.create_device(&ctx, &clash)
            .await
            .unwrap_err()
            .is_conditional_check_failed()
    );

    assert_eq!(db.get_device(&ctx, "c1", "/dev/xvdf").await.unwrap(), dev);
    assert_eq!(db.get_service(&ctx, "c1", "postgres").await.unwrap(), svc);

    let devs = db.list_devices(&ctx, "c1").await.unwrap();
    assert_eq!(devs.len(), 1);
    let svcs = db.list_services(&ctx, "c1").await.unwrap();
    assert_eq!(svcs.len(), 1);

    // teardown is repeatable
    db.delete_device(&ctx, "c1", "/dev/xvdf").await.unwrap();
    db.delete_device(&ctx, "c1", "/dev/xvdf").await.unwrap();
    db.delete_service(&ctx, "c1", "postgres").await.unwrap();
    db.delete_service(&ctx, "c1", "postgres").await.unwrap();
}

#[tokio::test]
async fn test_member_listing_drains_pages() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 8);
    let ctx = ReqContext::new("req-list");

    for i in 0..7 {
        db.create_service_member(&ctx, &member("uuid-1", &format!("node-{i}")))
            .await
            .unwrap();
    }

    // explicit limit exposes page boundaries
    let page = db
        .list_service_members_page(&ctx, "uuid-1", None, Some(3))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);
    assert!(!page.is_last());

    // the exhaustive method is transparent about pagination
    let all = db.list_service_members(&ctx, "uuid-1").await.unwrap();
    assert_eq!(all.len(), 7);
    let names: Vec<&str> = all.iter().map(|m| m.member_name.as_str()).collect();
    assert!(names.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_member_owner_reassignment() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 8);
    let ctx = ReqContext::new("req-owner");

    let m0 = member("uuid-1", "node-0");
    db.create_service_member(&ctx, &m0).await.unwrap();

    let m1 = m0.with_owner("task-1", "ci-1", "i-0abc");
    db.update_service_member(&ctx, &m0, &m1).await.unwrap();

    // immutable placement fields are protected
    let mut moved = m1.clone();
    moved.available_zone = "us-east-1b".to_string();
    assert!(matches!(
        db.update_service_member(&ctx, &m1, &moved).await,
        Err(Error::InvalidRequest(_))
    ));

    db.delete_service_member(&ctx, "uuid-1", "node-0")
        .await
        .unwrap();
    assert!(
        db.delete_service_member(&ctx, "uuid-1", "node-0")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_config_file_integrity() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 8);
    let ctx = ReqContext::new("req-cfg");

    let mut corrupted =
        ConfigFile::new_initial("uuid-1", "file-1", "pg.conf", 0o600, "port=5432");
    corrupted.file_md5 = checksum::content_md5("something else");
    assert!(matches!(
        db.create_config_file(&ctx, &corrupted).await,
        Err(Error::Internal(_))
    ));

    let v1 = ConfigFile::new_initial("uuid-1", "file-1", "pg.conf", 0o600, "port=5432");
    db.create_config_file(&ctx, &v1).await.unwrap();

    let v2 = v1.with_new_content("file-2", "port=5433");
    assert_ne!(v2.file_id, v1.file_id);
    assert!(checksum::verify_content_md5(&v2.content, &v2.file_md5));
    db.create_config_file(&ctx, &v2).await.unwrap();

    let read = db.get_config_file(&ctx, "uuid-1", "file-2").await.unwrap();
    assert_eq!(read.content, "port=5433");
}

#[tokio::test]
async fn test_store_reopen_preserves_data() {
    let dir = tempdir().unwrap();
    let ctx = ReqContext::new("req-reopen");

    let v0 = attr("uuid-1", 3);
    let v1 = v0.with_status(STATUS_ACTIVE);
    {
        let db = open_db(dir.path(), 8);
        db.create_service_attr(&ctx, &v0).await.unwrap();
        db.update_service_attr(&ctx, &v0, &v1).await.unwrap();
    }

    // a fresh store over the same root sees the latest snapshot
    let db = open_db(dir.path(), 8);
    let read = db.get_service_attr(&ctx, "uuid-1").await.unwrap();
    assert!(read.semantic_eq(&v1, false));
}

#[tokio::test]
async fn test_expired_deadline_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path(), 8);

    let ctx = ReqContext::new("req-late").with_deadline(Duration::from_secs(0));
    let err = db.get_service_attr(&ctx, "uuid-1").await.unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded));
}
