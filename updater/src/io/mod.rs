//! I/O helpers for updater commands.

pub mod config;
pub mod init;
pub mod manifest;
pub mod process;
pub mod release_feed;
pub mod report;
pub mod stager;
pub mod status_store;
