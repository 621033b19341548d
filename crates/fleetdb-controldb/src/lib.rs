//! FleetDB ControlDB - the embedded file-backed metadata store
//!
//! A self-hosted backend for the FleetDB store facade: per-key versioned
//! file logs provide conditional create/update with crash-safe
//! durability, an LRU-bounded cache of read-writer handles keeps memory
//! and open-file usage flat under many managed services, and one entity
//! service per record kind maps the CAS protocol onto the store's error
//! taxonomy. No external database is involved.

pub mod attr;
pub mod cache;
pub mod codec;
pub mod config;
pub mod device;
pub mod layout;
pub mod list;
pub mod member;
pub mod rw;
pub mod service;
pub mod store;
pub mod svc;
pub mod vlog;

pub use cache::HandleCache;
pub use codec::{LogRecord, RecordKind};
pub use rw::RecordIo;
pub use store::ControlDb;
pub use vlog::VersionLog;
