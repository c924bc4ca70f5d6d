//! Updater settings stored under `.updater/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::notify::MailLevel;
use crate::core::types::{CronMode, UpdateContext};

/// Config keys whose change invalidates stored status-check results.
pub const WATCHED_KEYS: [&str; 4] = [
    "unattended.level",
    "unattended.method",
    "allow_core_minor_updates",
    "executables.composer",
];

/// Updater configuration (TOML).
///
/// Missing fields fall back to defaults so hand-edited files stay valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Allow attended updates to move to another minor version.
    pub allow_core_minor_updates: bool,

    pub status_check_mail: MailLevel,

    pub unattended: UnattendedConfig,

    pub executables: ExecutablesConfig,

    pub stager: StagerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UnattendedConfig {
    pub level: CronMode,
    pub method: UnattendedMethod,
}

/// How cron-driven updates are triggered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnattendedMethod {
    #[default]
    Web,
    Console,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutablesConfig {
    /// Composer executable name or path.
    pub composer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StagerConfig {
    /// Wall-clock budget for each Composer invocation.
    pub timeout_secs: u64,

    /// Truncate Composer stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for UnattendedConfig {
    fn default() -> Self {
        Self {
            level: CronMode::Security,
            method: UnattendedMethod::Web,
        }
    }
}

impl Default for ExecutablesConfig {
    fn default() -> Self {
        Self {
            composer: "composer".to_string(),
        }
    }
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            allow_core_minor_updates: false,
            status_check_mail: MailLevel::ErrorsOnly,
            unattended: UnattendedConfig::default(),
            executables: ExecutablesConfig::default(),
            stager: StagerConfig::default(),
        }
    }
}

impl UpdaterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stager.timeout_secs == 0 {
            return Err(anyhow!("stager.timeout_secs must be > 0"));
        }
        if self.stager.output_limit_bytes == 0 {
            return Err(anyhow!("stager.output_limit_bytes must be > 0"));
        }
        if self.executables.composer.trim().is_empty() {
            return Err(anyhow!("executables.composer must be non-empty"));
        }
        Ok(())
    }

    /// Context status checks run in: cron-facing unless cron is disabled.
    pub fn status_context(&self) -> UpdateContext {
        if self.unattended.level.is_enabled() {
            UpdateContext::Unattended
        } else {
            UpdateContext::Attended
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `UpdaterConfig::default()`.
pub fn load_config(path: &Path) -> Result<UpdaterConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = UpdaterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: UpdaterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &UpdaterConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, UpdaterConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = UpdaterConfig::default();
        cfg.unattended.level = CronMode::All;
        cfg.status_check_mail = MailLevel::All;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "allow_core_minor_updates = true\n[unattended]\nlevel = \"disabled\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.allow_core_minor_updates);
        assert_eq!(cfg.unattended.level, CronMode::Disabled);
        assert_eq!(cfg.unattended.method, UnattendedMethod::Web);
        assert_eq!(cfg.executables.composer, "composer");
        assert_eq!(cfg.status_context(), UpdateContext::Attended);
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[stager]\ntimeout_secs = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid config");
        assert!(err.to_string().contains("stager.timeout_secs"));
    }
}
