//! FleetDB Store - the abstract metadata store interface
//!
//! The control plane talks to one `MetadataStore`; the embedded
//! file-backed store and the managed-cloud adapter both implement it
//! with identical semantics, so callers are backend-agnostic.

pub mod list;
pub mod store;

pub use list::ListPage;
pub use store::MetadataStore;
