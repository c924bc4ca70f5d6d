//! Version policy rules for core updates.
//!
//! Every applicable rule contributes a message; nothing short-circuits. Error
//! messages are folded into one error result per pass, guidance into one
//! warning result, both sharing the pass summary.

use crate::core::releases::ReleaseCatalog;
use crate::core::types::{CronMode, UpdateContext, ValidationResult};
use crate::core::version::Version;

/// Inputs for one policy pass.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub installed: &'a Version,
    /// `None` when no target release could be determined.
    pub target: Option<&'a Version>,
    pub cron_mode: CronMode,
    pub context: UpdateContext,
    pub allow_minor_updates: bool,
    pub catalog: &'a ReleaseCatalog,
}

impl PolicyInput<'_> {
    /// Unattended rules only apply when cron is allowed to update at all.
    pub fn is_unattended(&self) -> bool {
        self.context == UpdateContext::Unattended && self.cron_mode.is_enabled()
    }
}

/// Evaluate the version policy.
///
/// Returns at most two results: one error result holding every violated
/// rule, then one warning result with guidance for getting back onto a
/// supported branch. Both carry the same summary. No findings means the
/// update is allowed.
pub fn validate_version_policy(input: &PolicyInput<'_>) -> Vec<ValidationResult> {
    let installed = input.installed;
    let unattended = input.is_unattended();
    let mut errors = Vec::new();
    let mut guidance = Vec::new();

    if installed.is_dev() {
        errors.push(format!(
            "Drupal cannot be automatically updated from the installed version, {installed}, because automatic updates from a dev version to any other version are not supported."
        ));
    }

    if unattended && installed.stability().is_prerelease() {
        errors.push(format!(
            "Drupal cannot be automatically updated during cron from its current version, {installed}, because it is not a stable version."
        ));
    }

    if let Some(target) = input.target {
        errors.extend(target_rules(input, installed, target, unattended));
    }

    if unattended && !input.catalog.is_supported_branch(installed) {
        errors.push(format!(
            "The currently installed version of Drupal core, {installed}, is not in a supported minor version. Your site will not be automatically updated during cron until it is updated to a supported minor version."
        ));
        guidance.push(if input.allow_minor_updates {
            "Use the update form to update to a supported version.".to_string()
        } else {
            "See the available updates page for available updates.".to_string()
        });
    }

    let summary = match input.target {
        Some(target) => format!("Updating from {installed} to {target} is not allowed."),
        None => format!("Updating from {installed} is not allowed."),
    };

    let mut results = Vec::new();
    if !errors.is_empty() {
        results.push(ValidationResult::error(errors, Some(summary.clone())));
    }
    if !guidance.is_empty() {
        results.push(ValidationResult::warning(guidance, Some(summary)));
    }
    results
}

fn target_rules(
    input: &PolicyInput<'_>,
    installed: &Version,
    target: &Version,
    unattended: bool,
) -> Vec<String> {
    let mut errors = Vec::new();

    if unattended && target.stability().is_prerelease() {
        errors.push(format!(
            "Drupal cannot be automatically updated during cron to the recommended version, {target}, because it is not a stable version."
        ));
    }

    let major_changed = target.major() != installed.major();
    if major_changed {
        errors.push(format!(
            "Drupal cannot be automatically updated from {installed} to {target} because automatic updates from one major version to another are not supported."
        ));
    } else if target.minor() != installed.minor() && (unattended || !input.allow_minor_updates) {
        errors.push(format!(
            "Drupal cannot be automatically updated from {installed} to {target} because automatic updates from one minor version to another are not supported."
        ));
    }

    let downgrade = target < installed;
    if downgrade {
        errors.push(format!(
            "Update version {target} is lower than {installed}, downgrading is not supported."
        ));
    }

    // Major changes and downgrades are never installable and the minor rule
    // is reported above, so only the release list itself is checked here.
    if !major_changed && !downgrade && !input.catalog.is_installable(installed, target, true) {
        errors.push(format!(
            "Cannot update Drupal core to {target} because it is not in the list of installable releases."
        ));
    }

    if unattended
        && input.cron_mode == CronMode::Security
        && !input.catalog.is_security_release(target)
    {
        errors.push(format!(
            "Drupal cannot be automatically updated during cron from {installed} to {target} because {target} is not a security release."
        ));
    }

    errors
}
