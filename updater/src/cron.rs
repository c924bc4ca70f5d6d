//! Unattended update run.
//!
//! Picks the unattended target from the release catalog, drives one
//! [`UpdateStage`] through its lifecycle and always destroys the stage
//! afterwards. Stage faults never escape: they are logged and reported as a
//! [`CronOutcome`]. Only failures to read the site's own state are errors.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{error, info, instrument, warn};

use crate::checks::version_policy::{VersionPolicy, VersionPolicyValidator};
use crate::core::packages::core_package;
use crate::core::results::describe;
use crate::core::types::{UpdateContext, ValidationResult};
use crate::core::version::Version;
use crate::io::config::load_config;
use crate::io::init::UpdaterPaths;
use crate::io::manifest::load_manifest;
use crate::io::release_feed::load_release_catalog;
use crate::io::stager::Stager;
use crate::io::status_store::FileStatusStore;
use crate::stage::{StageError, UpdateStage};
use crate::status::{InvalidationEvent, StatusChecker};

/// Result of one unattended run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronOutcome {
    /// `unattended.level` is `disabled`.
    Disabled,
    /// No release to update to.
    UpToDate,
    Updated {
        from: Version,
        to: Version,
        warnings: Vec<ValidationResult>,
    },
    /// Validation stopped the update; `results` are the blocking errors.
    Blocked { results: Vec<ValidationResult> },
    Failed { message: String },
}

#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_unattended<S: Stager>(root: &Path, stager: &S) -> Result<CronOutcome> {
    let paths = UpdaterPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    if !cfg.unattended.level.is_enabled() {
        info!("unattended updates disabled");
        return Ok(CronOutcome::Disabled);
    }

    let catalog = load_release_catalog(&paths.releases_path)?;
    let manifest = load_manifest(&paths.installed_path)?;
    let (package, installed) = core_package(&manifest.packages)
        .map_err(|err| anyhow!("installed {err}"))?
        .ok_or_else(|| {
            anyhow!(
                "no core package recorded in {}",
                paths.installed_path.display()
            )
        })?;

    let Some(target) = catalog
        .recommended_release(&installed, UpdateContext::Unattended, false)
        .map(|release| release.version.clone())
    else {
        info!(installed = %installed, "no unattended update available");
        return Ok(CronOutcome::UpToDate);
    };
    info!(from = %installed, to = %target, "starting unattended update");

    let policy = VersionPolicy::new(installed.clone(), catalog, &cfg);
    let mut stage = UpdateStage::new(stager, &paths.stage_dir, UpdateContext::Unattended);
    stage.add_validator(VersionPolicyValidator::new(policy));

    let packages = BTreeMap::from([(package.to_string(), target.to_string())]);
    let attempt = run_stage(&mut stage, packages);
    if let Err(err) = stage.destroy() {
        error!(error = %err, "failed to destroy staging directory");
    }

    let outcome = match attempt {
        Ok(warnings) => {
            for line in describe(&warnings) {
                warn!("{line}");
            }
            StatusChecker::new(FileStatusStore::new(&paths.status_path))
                .handle_event(&InvalidationEvent::PostApply)?;
            info!(from = %installed, to = %target, "unattended update applied");
            CronOutcome::Updated {
                from: installed,
                to: target,
                warnings,
            }
        }
        Err(StageError::Validation { event, results }) => {
            for line in describe(&results) {
                error!(?event, "{line}");
            }
            CronOutcome::Blocked { results }
        }
        Err(err) => {
            let message = match err {
                StageError::Other(inner) => format!("{inner:#}"),
                other => other.to_string(),
            };
            error!(%message, "unattended update failed");
            CronOutcome::Failed { message }
        }
    };
    Ok(outcome)
}

fn run_stage<S: Stager>(
    stage: &mut UpdateStage<'_, S>,
    packages: BTreeMap<String, String>,
) -> Result<Vec<ValidationResult>, StageError> {
    let mut results = stage.create(packages)?;
    results.extend(stage.stage()?);
    results.extend(stage.apply()?);
    results.extend(stage.post_apply()?);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CronMode, Severity};
    use crate::io::config::UpdaterConfig;
    use crate::io::status_store::{StatusStore, StoredStatus};
    use crate::test_support::{ScriptedStager, TestSite, catalog, release, v, warning_result};

    fn site(level: CronMode, installed: &str) -> TestSite {
        let mut cfg = UpdaterConfig::default();
        cfg.unattended.level = level;
        TestSite::new()
            .with_config(&cfg)
            .with_catalog(&catalog(
                &["9.8."],
                vec![release("9.8.2", false), release("9.8.1", true)],
            ))
            .with_installed(installed)
    }

    #[test]
    fn disabled_mode_does_nothing() {
        let site = site(CronMode::Disabled, "9.8.0");
        let stager = ScriptedStager::new("9.8.2");
        let outcome = run_unattended(site.root(), &stager).expect("run");
        assert_eq!(outcome, CronOutcome::Disabled);
        assert!(stager.calls().is_empty());
    }

    #[test]
    fn up_to_date_site_is_left_alone() {
        let site = site(CronMode::All, "9.8.2");
        let stager = ScriptedStager::new("9.8.2");
        let outcome = run_unattended(site.root(), &stager).expect("run");
        assert_eq!(outcome, CronOutcome::UpToDate);
        assert!(stager.calls().is_empty());
    }

    #[test]
    fn all_mode_applies_latest_patch_and_clears_status() {
        let site = site(CronMode::All, "9.8.0");
        let store = FileStatusStore::new(&site.paths.status_path);
        store
            .save(&StoredStatus {
                results: Some(vec![warning_result("stale")]),
                last_run: None,
            })
            .expect("seed status");

        let stager = ScriptedStager::new("9.8.2");
        let outcome = run_unattended(site.root(), &stager).expect("run");
        assert_eq!(
            outcome,
            CronOutcome::Updated {
                from: v("9.8.0"),
                to: v("9.8.2"),
                warnings: Vec::new(),
            }
        );
        assert_eq!(
            stager.calls(),
            vec![
                "create",
                "require drupal/core-recommended:9.8.2",
                "apply",
                "destroy"
            ]
        );
        assert_eq!(store.load().expect("status").results, None);
    }

    #[test]
    fn security_mode_blocks_non_security_target() {
        let site = site(CronMode::Security, "9.8.0");
        let stager = ScriptedStager::new("9.8.2");
        let outcome = run_unattended(site.root(), &stager).expect("run");

        let results = match outcome {
            CronOutcome::Blocked { results } => results,
            other => panic!("expected blocked outcome, got {other:?}"),
        };
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].severity, Severity::Error);
        assert_eq!(
            results[0].messages,
            vec!["Drupal cannot be automatically updated during cron from 9.8.0 to 9.8.2 because 9.8.2 is not a security release."]
        );
        assert_eq!(stager.calls(), Vec::<String>::new());
        assert!(!site.stage_dir().exists());
    }

    #[test]
    fn stager_failure_is_reported_and_stage_destroyed() {
        let site = site(CronMode::All, "9.8.0");
        let stager = ScriptedStager::new("9.8.2").failing_on("require");
        let outcome = run_unattended(site.root(), &stager).expect("run");

        assert_eq!(
            outcome,
            CronOutcome::Failed {
                message: "scripted require failure".to_string()
            }
        );
        assert_eq!(stager.calls().last().map(String::as_str), Some("destroy"));
        assert!(!site.stage_dir().exists());
    }

    #[test]
    fn unparsable_installed_core_is_an_error() {
        let site = site(CronMode::All, "latest");
        let stager = ScriptedStager::new("9.8.2");
        let err = run_unattended(site.root(), &stager).expect_err("bad version");
        assert_eq!(
            err.to_string(),
            "installed drupal/core-recommended: invalid version 'latest'"
        );
        assert!(stager.calls().is_empty());
    }

    #[test]
    fn missing_core_package_is_an_error() {
        let site = TestSite::new();
        let err = run_unattended(site.root(), &ScriptedStager::new("9.8.2"))
            .expect_err("no installed core");
        assert!(err.to_string().contains("no core package recorded"));
    }
}
