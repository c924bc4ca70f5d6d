//! Staging adapter: the filesystem/Composer side of an update stage.
//!
//! The [`Stager`] trait decouples the stage lifecycle from the actual package
//! manager. Tests use scripted stagers that record calls instead of spawning
//! processes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::config::UpdaterConfig;
use crate::io::init::UpdaterPaths;
use crate::io::manifest::{load_manifest, manifest_from_lock, write_manifest};
use crate::io::process::run_with_timeout;

/// Name of the staged manifest inside a staging directory.
pub const STAGED_MANIFEST: &str = "installed.json";

const COMPOSER_LOCK: &str = "composer.lock";
const COMPOSER_FILES: [&str; 2] = ["composer.json", COMPOSER_LOCK];

/// Abstraction over the staging backend.
///
/// After `require`, the staging directory must contain a [`STAGED_MANIFEST`]
/// describing the staged package versions.
pub trait Stager {
    fn create(&self, stage_dir: &Path) -> Result<()>;
    fn require(&self, stage_dir: &Path, packages: &BTreeMap<String, String>) -> Result<()>;
    fn apply(&self, stage_dir: &Path) -> Result<()>;
    fn destroy(&self, stage_dir: &Path) -> Result<()>;
}

/// Stager that copies the active Composer files into the staging directory
/// and runs `composer require` there.
#[derive(Debug, Clone)]
pub struct ComposerStager {
    pub active_root: PathBuf,
    pub installed_path: PathBuf,
    pub composer: String,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ComposerStager {
    pub fn from_config(paths: &UpdaterPaths, cfg: &UpdaterConfig) -> Self {
        Self {
            active_root: paths.root.clone(),
            installed_path: paths.installed_path.clone(),
            composer: cfg.executables.composer.clone(),
            timeout: Duration::from_secs(cfg.stager.timeout_secs),
            output_limit_bytes: cfg.stager.output_limit_bytes,
        }
    }

    fn run_composer(&self, stage_dir: &Path, args: &[String]) -> Result<()> {
        debug!(composer = %self.composer, ?args, "running composer");
        let mut cmd = Command::new(&self.composer);
        cmd.args(args).current_dir(stage_dir);
        let output = run_with_timeout(cmd, self.timeout, self.output_limit_bytes)?;

        let log_path = stage_dir.join("composer.log");
        let mut stderr = output.stderr;
        if output.timed_out {
            stderr.extend_from_slice(b"\ncomposer timed out");
        }
        write_composer_log(
            &log_path,
            &output.stdout,
            &stderr,
            output.stdout_truncated + output.stderr_truncated,
            self.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "composer timed out");
            return Err(anyhow!("composer timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "composer failed");
            return Err(anyhow!(
                "composer failed with status {:?}",
                output.status.code()
            ));
        }
        Ok(())
    }
}

impl Stager for ComposerStager {
    #[instrument(skip_all, fields(stage_dir = %stage_dir.display()))]
    fn create(&self, stage_dir: &Path) -> Result<()> {
        if stage_dir.exists() {
            return Err(anyhow!(
                "staging directory {} already exists",
                stage_dir.display()
            ));
        }
        fs::create_dir_all(stage_dir)
            .with_context(|| format!("create staging dir {}", stage_dir.display()))?;
        copy_composer_files(&self.active_root, stage_dir)?;
        let manifest = load_manifest(&self.installed_path)?;
        write_manifest(&stage_dir.join(STAGED_MANIFEST), &manifest)?;
        info!("staging directory created");
        Ok(())
    }

    #[instrument(skip_all, fields(stage_dir = %stage_dir.display(), packages = packages.len()))]
    fn require(&self, stage_dir: &Path, packages: &BTreeMap<String, String>) -> Result<()> {
        let mut args = vec![
            "require".to_string(),
            "--no-interaction".to_string(),
            "--update-with-all-dependencies".to_string(),
        ];
        args.extend(
            packages
                .iter()
                .map(|(name, version)| format!("{name}:{version}")),
        );
        self.run_composer(stage_dir, &args)?;

        // Composer may resolve something other than what was asked for.
        let staged = manifest_from_lock(&stage_dir.join(COMPOSER_LOCK))?;
        write_manifest(&stage_dir.join(STAGED_MANIFEST), &staged)?;
        info!(staged = staged.packages.len(), "packages required in stage");
        Ok(())
    }

    #[instrument(skip_all, fields(stage_dir = %stage_dir.display()))]
    fn apply(&self, stage_dir: &Path) -> Result<()> {
        copy_composer_files(stage_dir, &self.active_root)?;
        let manifest = load_manifest(&stage_dir.join(STAGED_MANIFEST))?;
        write_manifest(&self.installed_path, &manifest)?;
        info!("staged changes applied");
        Ok(())
    }

    #[instrument(skip_all, fields(stage_dir = %stage_dir.display()))]
    fn destroy(&self, stage_dir: &Path) -> Result<()> {
        if stage_dir.exists() {
            fs::remove_dir_all(stage_dir)
                .with_context(|| format!("remove staging dir {}", stage_dir.display()))?;
        }
        Ok(())
    }
}

fn copy_composer_files(from: &Path, to: &Path) -> Result<()> {
    for name in COMPOSER_FILES {
        let source = from.join(name);
        if source.is_file() {
            fs::copy(&source, to.join(name))
                .with_context(|| format!("copy {} to {}", source.display(), to.display()))?;
        }
    }
    Ok(())
}

fn write_composer_log(
    path: &Path,
    stdout: &[u8],
    stderr: &[u8],
    already_dropped: usize,
    output_limit: usize,
) -> Result<()> {
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(stdout));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(stderr));

    if buf.len() > output_limit || already_dropped > 0 {
        let mut cut = output_limit.min(buf.len());
        while !buf.is_char_boundary(cut) {
            cut -= 1;
        }
        let dropped = buf.len() - cut + already_dropped;
        let truncated = format!("{}\n[truncated {dropped} bytes]\n", &buf[..cut]);
        return fs::write(path, truncated)
            .with_context(|| format!("write composer log {}", path.display()));
    }

    fs::write(path, buf).with_context(|| format!("write composer log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::manifest::PackageManifest;

    fn lock_json(core: &str) -> String {
        format!(r#"{{"packages":[{{"name":"drupal/core","version":"{core}"}}]}}"#)
    }

    fn stager(root: &Path, composer: &str) -> ComposerStager {
        let installed_path = root.join("installed.json");
        let mut manifest = PackageManifest::default();
        manifest
            .packages
            .insert("drupal/core".to_string(), "9.8.0".to_string());
        write_manifest(&installed_path, &manifest).expect("write manifest");
        fs::write(root.join("composer.json"), "{}\n").expect("composer.json");
        fs::write(root.join(COMPOSER_LOCK), lock_json("9.8.0")).expect("composer.lock");
        ComposerStager {
            active_root: root.to_path_buf(),
            installed_path,
            composer: composer.to_string(),
            timeout: Duration::from_secs(20),
            output_limit_bytes: 1_000,
        }
    }

    /// Executable shell script standing in for Composer.
    #[cfg(unix)]
    fn fake_composer(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-composer");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    fn locking_composer(dir: &Path, core: &str) -> String {
        fake_composer(
            dir,
            &format!("printf '%s' '{}' > composer.lock", lock_json(core)),
        )
    }

    fn core(version: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("drupal/core".to_string(), version.to_string())])
    }

    #[cfg(unix)]
    #[test]
    fn create_require_apply_destroy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let composer = locking_composer(temp.path(), "9.8.1");
        let stager = stager(temp.path(), &composer);
        let stage_dir = temp.path().join("stage");

        stager.create(&stage_dir).expect("create");
        assert!(stage_dir.join("composer.json").is_file());

        stager.require(&stage_dir, &core("9.8.1")).expect("require");
        let staged = load_manifest(&stage_dir.join(STAGED_MANIFEST)).expect("staged");
        assert_eq!(staged.packages["drupal/core"], "9.8.1");
        assert!(stage_dir.join("composer.log").is_file());

        stager.apply(&stage_dir).expect("apply");
        let installed = load_manifest(&stager.installed_path).expect("installed");
        assert_eq!(installed.packages["drupal/core"], "9.8.1");
        let active_lock = fs::read_to_string(temp.path().join(COMPOSER_LOCK)).expect("lock");
        assert!(active_lock.contains("9.8.1"));

        stager.destroy(&stage_dir).expect("destroy");
        assert!(!stage_dir.exists());
        stager.destroy(&stage_dir).expect("destroy is idempotent");
    }

    #[test]
    fn staged_versions_come_from_lock_not_request() {
        let temp = tempfile::tempdir().expect("tempdir");
        // Succeeds without touching the copied lock, which still pins 9.8.0.
        let stager = stager(temp.path(), "true");
        let stage_dir = temp.path().join("stage");

        stager.create(&stage_dir).expect("create");
        stager.require(&stage_dir, &core("9.8.1")).expect("require");

        let staged = load_manifest(&stage_dir.join(STAGED_MANIFEST)).expect("staged");
        assert_eq!(staged.packages["drupal/core"], "9.8.0");
    }

    #[test]
    fn require_without_lock_file_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stager = stager(temp.path(), "true");
        fs::remove_file(temp.path().join(COMPOSER_LOCK)).expect("remove lock");
        let stage_dir = temp.path().join("stage");

        stager.create(&stage_dir).expect("create");
        let err = stager
            .require(&stage_dir, &core("9.8.1"))
            .expect_err("no lock");
        assert!(err.to_string().contains("read lock file"));
    }

    #[test]
    fn create_refuses_existing_stage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stager = stager(temp.path(), "true");
        let stage_dir = temp.path().join("stage");
        fs::create_dir_all(&stage_dir).expect("mkdir");
        let err = stager.create(&stage_dir).expect_err("existing stage");
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn failing_composer_fails_require() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stager = stager(temp.path(), "false");
        let stage_dir = temp.path().join("stage");
        stager.create(&stage_dir).expect("create");
        let err = stager
            .require(&stage_dir, &core("9.8.1"))
            .expect_err("composer failure");
        assert!(err.to_string().contains("composer failed"));
        let staged = load_manifest(&stage_dir.join(STAGED_MANIFEST)).expect("staged");
        assert_eq!(staged.packages["drupal/core"], "9.8.0");
    }

    #[cfg(unix)]
    #[test]
    fn noisy_composer_finishes_with_truncated_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let composer = fake_composer(
            temp.path(),
            &format!(
                "head -c 200000 /dev/zero | tr '\\0' x\nprintf '%s' '{}' > composer.lock",
                lock_json("9.8.1")
            ),
        );
        let stager = stager(temp.path(), &composer);
        let stage_dir = temp.path().join("stage");

        stager.create(&stage_dir).expect("create");
        stager.require(&stage_dir, &core("9.8.1")).expect("require");

        let staged = load_manifest(&stage_dir.join(STAGED_MANIFEST)).expect("staged");
        assert_eq!(staged.packages["drupal/core"], "9.8.1");
        let log = fs::read_to_string(stage_dir.join("composer.log")).expect("log");
        assert!(log.len() < 2_000);
        assert!(log.contains("[truncated"));
    }

    #[cfg(unix)]
    #[test]
    fn hung_composer_times_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let composer = fake_composer(temp.path(), "exec sleep 5");
        let mut stager = stager(temp.path(), &composer);
        stager.timeout = Duration::from_millis(200);
        let stage_dir = temp.path().join("stage");

        stager.create(&stage_dir).expect("create");
        let err = stager
            .require(&stage_dir, &core("9.8.1"))
            .expect_err("timeout");
        assert!(err.to_string().contains("timed out"));
        let log = fs::read_to_string(stage_dir.join("composer.log")).expect("log");
        assert!(log.contains("composer timed out"));
    }

    #[test]
    fn composer_log_is_truncated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("composer.log");
        write_composer_log(&path, &[b'x'; 64], b"", 0, 16).expect("write log");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("=== stdout ===\nx"));
        assert!(contents.contains("[truncated"));
    }

    #[test]
    fn bytes_dropped_while_reading_are_counted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("composer.log");
        write_composer_log(&path, b"ok", b"", 500, 1_000).expect("write log");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.ends_with("[truncated 500 bytes]\n"));
    }
}
