//! Update stage lifecycle: create, stage, apply, post-apply, destroy.
//!
//! Each transition dispatches a [`StageEvent`] to the registered validators
//! in registration order. Error results on any event except `PostApply` stop
//! the transition with [`StageError::Validation`]; the stage stays in its
//! previous state so the caller can `destroy()` it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::core::lifecycle::{StageOperation, next_state};
use crate::core::packages::core_version;
use crate::core::results::{describe, has_errors};
use crate::core::types::{StageEvent, StageState, UpdateContext, ValidationResult};
use crate::core::version::Version;
use crate::io::manifest::load_manifest;
use crate::io::stager::{STAGED_MANIFEST, Stager};

/// Faults raised by stage transitions.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("update blocked by validation during {event:?}")]
    Validation {
        event: StageEvent,
        /// Blocking (error-severity) results, in generation order.
        results: Vec<ValidationResult>,
    },
    #[error("The target version of Drupal core could not be determined.")]
    TargetUndetermined,
    #[error("cannot {operation} a stage in state {from}")]
    InvalidTransition {
        from: StageState,
        operation: StageOperation,
    },
    #[error("staged core version {staged} does not match target {target}")]
    TargetMismatch { staged: Version, target: Version },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read-only view of a stage handed to validators.
#[derive(Debug, Clone, Copy)]
pub struct StageSnapshot<'a> {
    pub state: StageState,
    pub context: UpdateContext,
    pub stage_dir: &'a Path,
    pub packages: &'a BTreeMap<String, String>,
    pub target: Option<&'a Version>,
}

/// Subscriber to stage lifecycle events.
pub trait StageValidator {
    fn validate(
        &self,
        event: StageEvent,
        stage: &StageSnapshot<'_>,
    ) -> anyhow::Result<Vec<ValidationResult>>;
}

/// One update attempt. Owns nothing beyond the run; `destroy()` frees it.
pub struct UpdateStage<'a, S: Stager> {
    stager: &'a S,
    stage_dir: PathBuf,
    context: UpdateContext,
    validators: Vec<Box<dyn StageValidator + 'a>>,
    state: StageState,
    packages: BTreeMap<String, String>,
    target: Option<Version>,
    dir_created: bool,
}

impl<'a, S: Stager> UpdateStage<'a, S> {
    pub fn new(stager: &'a S, stage_dir: impl Into<PathBuf>, context: UpdateContext) -> Self {
        Self {
            stager,
            stage_dir: stage_dir.into(),
            context,
            validators: Vec::new(),
            state: StageState::Idle,
            packages: BTreeMap::new(),
            target: None,
            dir_created: false,
        }
    }

    pub fn add_validator(&mut self, validator: impl StageValidator + 'a) {
        self.validators.push(Box::new(validator));
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn target(&self) -> Option<&Version> {
        self.target.as_ref()
    }

    pub fn packages(&self) -> &BTreeMap<String, String> {
        &self.packages
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    /// Record the requested packages, resolve the target version and create
    /// the staging directory.
    ///
    /// If the stager fails, whatever it left behind is removed (unless the
    /// directory was already there) and the stage returns to `Idle`.
    #[instrument(skip_all, fields(packages = packages.len()))]
    pub fn create(
        &mut self,
        packages: BTreeMap<String, String>,
    ) -> Result<Vec<ValidationResult>, StageError> {
        let next = self.allowed(StageOperation::Create)?;
        let target = core_version(&packages)
            .map_err(|err| anyhow!("requested packages: {err}"))?
            .ok_or(StageError::TargetUndetermined)?;

        self.packages = packages;
        self.target = Some(target);
        let results = match self.dispatch(StageEvent::PreCreate) {
            Ok(results) => results,
            Err(err) => {
                self.packages.clear();
                self.target = None;
                return Err(err);
            }
        };

        let preexisting = self.stage_dir.exists();
        if let Err(err) = self.stager.create(&self.stage_dir) {
            // A half-created directory would block every later attempt.
            if !preexisting {
                if let Err(cleanup) = self.stager.destroy(&self.stage_dir) {
                    warn!(error = %cleanup, "failed to clean up after failed create");
                }
            }
            self.packages.clear();
            self.target = None;
            return Err(err.into());
        }
        self.dir_created = true;
        self.state = next;
        info!(version = ?self.target.as_ref().map(ToString::to_string), "stage created");
        Ok(results)
    }

    /// Require the packages in the staging directory and verify the staged
    /// core version.
    #[instrument(skip_all)]
    pub fn stage(&mut self) -> Result<Vec<ValidationResult>, StageError> {
        let next = self.allowed(StageOperation::Stage)?;
        let mut results = self.dispatch(StageEvent::PreRequire)?;
        self.stager.require(&self.stage_dir, &self.packages)?;

        let staged = load_manifest(&self.stage_dir.join(STAGED_MANIFEST))?
            .core_version()?
            .ok_or(StageError::TargetUndetermined)?;
        let target = self.target.clone().ok_or(StageError::TargetUndetermined)?;
        if staged != target {
            return Err(StageError::TargetMismatch { staged, target });
        }

        results.extend(self.dispatch(StageEvent::PostRequire)?);
        self.state = next;
        info!("packages staged");
        Ok(results)
    }

    /// Copy staged changes into the active site. Blocked by any error result.
    #[instrument(skip_all)]
    pub fn apply(&mut self) -> Result<Vec<ValidationResult>, StageError> {
        let next = self.allowed(StageOperation::Apply)?;
        let results = self.dispatch(StageEvent::PreApply)?;
        self.stager.apply(&self.stage_dir)?;
        self.state = next;
        info!("stage applied");
        Ok(results)
    }

    /// Run post-apply validators. Their results are reported, never blocking.
    #[instrument(skip_all)]
    pub fn post_apply(&mut self) -> Result<Vec<ValidationResult>, StageError> {
        let next = self.allowed(StageOperation::PostApply)?;
        let results = self.dispatch(StageEvent::PostApply)?;
        self.state = next;
        Ok(results)
    }

    /// Remove the staging directory and return to `Idle`. Safe to repeat.
    #[instrument(skip_all, fields(state = %self.state))]
    pub fn destroy(&mut self) -> Result<(), StageError> {
        if self.dir_created {
            self.stager.destroy(&self.stage_dir)?;
            self.dir_created = false;
        }
        self.state = StageState::Idle;
        self.packages.clear();
        self.target = None;
        Ok(())
    }

    fn allowed(&self, operation: StageOperation) -> Result<StageState, StageError> {
        next_state(self.state, operation).ok_or(StageError::InvalidTransition {
            from: self.state,
            operation,
        })
    }

    fn dispatch(&self, event: StageEvent) -> Result<Vec<ValidationResult>, StageError> {
        let snapshot = StageSnapshot {
            state: self.state,
            context: self.context,
            stage_dir: &self.stage_dir,
            packages: &self.packages,
            target: self.target.as_ref(),
        };
        let mut results = Vec::new();
        for validator in &self.validators {
            results.extend(validator.validate(event, &snapshot)?);
        }

        if event.blocks_on_error() && has_errors(&results) {
            let blocking: Vec<ValidationResult> =
                results.into_iter().filter(ValidationResult::is_error).collect();
            return Err(StageError::Validation {
                event,
                results: blocking,
            });
        }
        for line in describe(&results) {
            warn!(?event, "{line}");
        }
        Ok(results)
    }
}
