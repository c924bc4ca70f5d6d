//! Shared deterministic types for the update core.
//!
//! These types define stable contracts between the policy rules, the status
//! checker and the stage lifecycle. They must not depend on I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a validation result. `Warning` never blocks an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One finding produced by a check or validator.
///
/// Order of `messages` is significant for display and must be preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub severity: Severity,
    pub summary: Option<String>,
    pub messages: Vec<String>,
}

impl ValidationResult {
    pub fn error(messages: Vec<String>, summary: Option<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary,
            messages,
        }
    }

    pub fn warning(messages: Vec<String>, summary: Option<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary,
            messages,
        }
    }

    /// Check the shape rules: at least one message, and a summary whenever
    /// there is more than one message.
    pub fn check_shape(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("validation result must have at least one message".to_string());
        }
        if self.messages.len() > 1 && self.summary.as_deref().is_none_or(str::is_empty) {
            return Err(format!(
                "validation result with {} messages requires a summary",
                self.messages.len()
            ));
        }
        Ok(())
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Unattended update level (`unattended.level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CronMode {
    Disabled,
    #[default]
    Security,
    All,
}

impl CronMode {
    pub fn is_enabled(self) -> bool {
        self != CronMode::Disabled
    }
}

/// Whether a check runs on behalf of a user or of the cron subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateContext {
    Attended,
    Unattended,
}

/// Lifecycle state of an update stage. Destroying a stage returns it to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Idle,
    Created,
    Staged,
    Applied,
    PostApplied,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageState::Idle => "idle",
            StageState::Created => "created",
            StageState::Staged => "staged",
            StageState::Applied => "applied",
            StageState::PostApplied => "post_applied",
        };
        f.write_str(label)
    }
}

/// Lifecycle events dispatched to stage validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEvent {
    PreCreate,
    PreRequire,
    PostRequire,
    PreApply,
    PostApply,
}

impl StageEvent {
    /// Errors raised for this event stop the lifecycle.
    pub fn blocks_on_error(self) -> bool {
        !matches!(self, StageEvent::PostApply)
    }
}
