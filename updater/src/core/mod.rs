//! Deterministic, pure logic shared by the updater.
//!
//! Core modules must be free of I/O side effects. Release metadata, package
//! manifests and settings are passed in by the caller.

pub mod lifecycle;
pub mod notify;
pub mod packages;
pub mod policy;
pub mod releases;
pub mod results;
pub mod types;
pub mod version;
