//! Core version lookup in a project → version package map.

use std::collections::BTreeMap;

use crate::core::version::Version;

/// Packages consulted for the core version, in priority order.
pub const CORE_PACKAGES: [&str; 2] = ["drupal/core-recommended", "drupal/core"];

/// Resolve the core package and its version from a package map.
///
/// Returns `Ok(None)` when no core package is present and an error when the
/// recorded version string does not parse.
pub fn core_package(
    packages: &BTreeMap<String, String>,
) -> Result<Option<(&'static str, Version)>, String> {
    let Some((name, raw)) = CORE_PACKAGES
        .iter()
        .find_map(|name| packages.get(*name).map(|raw| (*name, raw)))
    else {
        return Ok(None);
    };
    Version::parse(raw)
        .map(|version| Some((name, version)))
        .map_err(|err| format!("{name}: {err}"))
}

/// Like [`core_package`], without the package name.
pub fn core_version(packages: &BTreeMap<String, String>) -> Result<Option<Version>, String> {
    core_package(packages).map(|found| found.map(|(_, version)| version))
}
