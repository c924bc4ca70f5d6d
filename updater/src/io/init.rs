//! Initialization helpers for `.updater/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::config::{UpdaterConfig, write_config};
use super::manifest::{PackageManifest, write_manifest};
use super::release_feed::write_release_catalog;
use crate::core::releases::ReleaseCatalog;

const UPDATER_GITIGNORE: &str = "state/\nstage/\n";

/// All canonical paths within `.updater/` for a site root.
#[derive(Debug, Clone)]
pub struct UpdaterPaths {
    pub root: PathBuf,
    pub updater_dir: PathBuf,
    pub state_dir: PathBuf,
    pub stage_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub releases_path: PathBuf,
    pub installed_path: PathBuf,
    pub status_path: PathBuf,
}

impl UpdaterPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let updater_dir = root.join(".updater");
        let state_dir = updater_dir.join("state");
        Self {
            root: root.clone(),
            updater_dir: updater_dir.clone(),
            state_dir: state_dir.clone(),
            stage_dir: updater_dir.join("stage"),
            gitignore_path: updater_dir.join(".gitignore"),
            config_path: updater_dir.join("config.toml"),
            releases_path: updater_dir.join("releases.json"),
            installed_path: updater_dir.join("installed.json"),
            status_path: state_dir.join("status.json"),
        }
    }
}

/// Options for `init_updater`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing updater-owned files.
    pub force: bool,
}

/// Create `.updater/` scaffolding in `root`.
///
/// Fails if `.updater/` already exists unless `options.force` is set.
pub fn init_updater(root: &Path, options: &InitOptions) -> Result<UpdaterPaths> {
    let paths = UpdaterPaths::new(root);
    if paths.updater_dir.exists() && !options.force {
        return Err(anyhow!(
            "updater init: .updater already exists (use --force to overwrite)"
        ));
    }
    if paths.updater_dir.exists() && !paths.updater_dir.is_dir() {
        return Err(anyhow!(
            "updater init: .updater exists but is not a directory"
        ));
    }

    create_dir(&paths.updater_dir)?;
    create_dir(&paths.state_dir)?;

    fs::write(&paths.gitignore_path, UPDATER_GITIGNORE)
        .with_context(|| format!("write {}", paths.gitignore_path.display()))?;
    write_config(&paths.config_path, &UpdaterConfig::default())?;
    write_release_catalog(
        &paths.releases_path,
        &ReleaseCatalog {
            project: "drupal".to_string(),
            supported_branches: Vec::new(),
            releases: Vec::new(),
        },
    )?;
    write_manifest(&paths.installed_path, &PackageManifest::default())?;
    if paths.status_path.exists() {
        fs::remove_file(&paths.status_path)
            .with_context(|| format!("remove {}", paths.status_path.display()))?;
    }

    info!(root = %root.display(), "initialized .updater");
    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use crate::io::manifest::load_manifest;
    use crate::io::release_feed::load_release_catalog;

    #[test]
    fn init_creates_loadable_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_updater(temp.path(), &InitOptions { force: false }).expect("init");

        assert!(paths.state_dir.is_dir());
        assert_eq!(
            load_config(&paths.config_path).expect("config"),
            UpdaterConfig::default()
        );
        let catalog = load_release_catalog(&paths.releases_path).expect("releases");
        assert_eq!(catalog.project, "drupal");
        assert!(
            load_manifest(&paths.installed_path)
                .expect("manifest")
                .packages
                .is_empty()
        );
    }

    #[test]
    fn init_refuses_existing_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_updater(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_updater(temp.path(), &InitOptions { force: false })
            .expect_err("second init should fail");
        assert!(err.to_string().contains("already exists"));
        init_updater(temp.path(), &InitOptions { force: true }).expect("forced init");
    }
}
