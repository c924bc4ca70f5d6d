//! Built-in status checks and stage validators.

pub mod composer;
pub mod version_policy;
