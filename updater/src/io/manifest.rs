//! Installed and staged package manifests (project → version).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::packages::core_version;
use crate::core::version::Version;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub packages: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Core version recorded in this manifest, if any.
    pub fn core_version(&self) -> Result<Option<Version>> {
        core_version(&self.packages).map_err(|err| anyhow!("manifest core version: {err}"))
    }
}

pub fn load_manifest(path: &Path) -> Result<PackageManifest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse manifest {}", path.display()))
}

pub fn write_manifest(path: &Path, manifest: &PackageManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create manifest dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(manifest)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write manifest {}", path.display()))
}

#[derive(Debug, Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<LockedPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

/// Package versions Composer actually resolved, read from a `composer.lock`.
///
/// Tag-style versions (`v1.2.3`) lose their leading `v`.
pub fn manifest_from_lock(path: &Path) -> Result<PackageManifest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read lock file {}", path.display()))?;
    let lock: ComposerLock = serde_json::from_str(&contents)
        .with_context(|| format!("parse lock file {}", path.display()))?;

    let packages = lock
        .packages
        .into_iter()
        .chain(lock.packages_dev)
        .map(|locked| {
            let version = match locked.version.strip_prefix('v') {
                Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest.to_string(),
                _ => locked.version,
            };
            (locked.name, version)
        })
        .collect();
    Ok(PackageManifest { packages })
}

/// Load the installed core version, failing when the manifest has none.
pub fn installed_core_version(path: &Path) -> Result<Version> {
    load_manifest(path)?
        .core_version()?
        .ok_or_else(|| anyhow!("no core package recorded in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::v;

    #[test]
    fn manifest_round_trips_with_stable_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("installed.json");
        let mut manifest = PackageManifest::default();
        manifest
            .packages
            .insert("drupal/token".to_string(), "1.9.0".to_string());
        manifest
            .packages
            .insert("drupal/core".to_string(), "9.8.0".to_string());

        write_manifest(&path, &manifest).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(
            contents,
            "{\n  \"packages\": {\n    \"drupal/core\": \"9.8.0\",\n    \"drupal/token\": \"1.9.0\"\n  }\n}\n"
        );
        assert_eq!(load_manifest(&path).expect("load"), manifest);
        assert_eq!(installed_core_version(&path).expect("core"), v("9.8.0"));
    }

    #[test]
    fn missing_core_package_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("installed.json");
        write_manifest(&path, &PackageManifest::default()).expect("write");
        let err = installed_core_version(&path).expect_err("no core");
        assert!(err.to_string().contains("no core package"));
    }

    #[test]
    fn lock_file_yields_resolved_versions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("composer.lock");
        fs::write(
            &path,
            r#"{
  "content-hash": "abc",
  "packages": [
    {"name": "drupal/core", "version": "9.8.0", "type": "drupal-core"},
    {"name": "symfony/console", "version": "v4.4.8"}
  ],
  "packages-dev": [
    {"name": "drupal/devel", "version": "dev-main"}
  ]
}"#,
        )
        .expect("write lock");

        let manifest = manifest_from_lock(&path).expect("lock");
        assert_eq!(manifest.packages["drupal/core"], "9.8.0");
        assert_eq!(manifest.packages["symfony/console"], "4.4.8");
        assert_eq!(manifest.packages["drupal/devel"], "dev-main");
        assert_eq!(manifest.core_version().expect("core"), Some(v("9.8.0")));
    }

    #[test]
    fn missing_lock_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = manifest_from_lock(&temp.path().join("composer.lock")).expect_err("no lock");
        assert!(err.to_string().contains("read lock file"));
    }
}
