//! Version policy as a status check and as a stage validator.

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::core::policy::{PolicyInput, validate_version_policy};
use crate::core::releases::ReleaseCatalog;
use crate::core::types::{CronMode, StageEvent, UpdateContext, ValidationResult};
use crate::core::version::Version;
use crate::io::config::UpdaterConfig;
use crate::stage::{StageSnapshot, StageValidator};
use crate::status::StatusCheck;

/// Policy inputs that do not change between passes.
#[derive(Debug, Clone)]
pub struct VersionPolicy {
    pub installed: Version,
    pub catalog: ReleaseCatalog,
    pub cron_mode: CronMode,
    pub allow_minor_updates: bool,
}

impl VersionPolicy {
    pub fn new(installed: Version, catalog: ReleaseCatalog, cfg: &UpdaterConfig) -> Self {
        Self {
            installed,
            catalog,
            cron_mode: cfg.unattended.level,
            allow_minor_updates: cfg.allow_core_minor_updates,
        }
    }

    fn evaluate(&self, target: Option<&Version>, context: UpdateContext) -> Vec<ValidationResult> {
        validate_version_policy(&PolicyInput {
            installed: &self.installed,
            target,
            cron_mode: self.cron_mode,
            context,
            allow_minor_updates: self.allow_minor_updates,
            catalog: &self.catalog,
        })
    }
}

/// Status check validating the recommended release for `context`.
pub struct VersionPolicyCheck {
    policy: VersionPolicy,
    context: UpdateContext,
}

impl VersionPolicyCheck {
    pub fn new(policy: VersionPolicy, context: UpdateContext) -> Self {
        Self { policy, context }
    }
}

impl StatusCheck for VersionPolicyCheck {
    fn name(&self) -> &str {
        "version_policy"
    }

    fn check(&self) -> Result<Vec<ValidationResult>> {
        let allow_minor =
            self.policy.allow_minor_updates && self.context == UpdateContext::Attended;
        let target = self
            .policy
            .catalog
            .recommended_release(&self.policy.installed, self.context, allow_minor)
            .map(|release| release.version.clone());
        debug!(
            installed = %self.policy.installed,
            target = ?target.as_ref().map(ToString::to_string),
            "version policy status check"
        );
        Ok(self.policy.evaluate(target.as_ref(), self.context))
    }
}

/// Stage validator applying the policy to the stage's resolved target.
pub struct VersionPolicyValidator {
    policy: VersionPolicy,
}

impl VersionPolicyValidator {
    pub fn new(policy: VersionPolicy) -> Self {
        Self { policy }
    }
}

impl StageValidator for VersionPolicyValidator {
    fn validate(
        &self,
        event: StageEvent,
        stage: &StageSnapshot<'_>,
    ) -> Result<Vec<ValidationResult>> {
        if !matches!(event, StageEvent::PreCreate | StageEvent::PreApply) {
            return Ok(Vec::new());
        }
        let target = stage
            .target
            .ok_or_else(|| anyhow!("The target version of Drupal core could not be determined."))?;
        Ok(self.policy.evaluate(Some(target), stage.context))
    }
}
