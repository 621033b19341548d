//! FleetDB Common - Shared types and utilities
//!
//! This crate provides the entity types, error taxonomy, request context
//! and configuration used by all FleetDB store backends.

pub mod checksum;
pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::StoreConfig;
pub use context::ReqContext;
pub use error::{Error, Result};
pub use types::*;
