//! Decide whether a new set of status-check results is worth notifying about.

use serde::{Deserialize, Serialize};

use crate::core::results::filter_by_severity;
use crate::core::types::{Severity, ValidationResult};

/// `status_check_mail` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailLevel {
    Disabled,
    #[default]
    ErrorsOnly,
    All,
}

/// True when `current` differs from `previous` in a way `level` cares about.
///
/// A missing previous run counts as an empty result set.
pub fn should_notify(
    previous: Option<&[ValidationResult]>,
    current: &[ValidationResult],
    level: MailLevel,
) -> bool {
    let previous = previous.unwrap_or_default();
    let severity = match level {
        MailLevel::Disabled => return false,
        MailLevel::ErrorsOnly => Some(Severity::Error),
        MailLevel::All => None,
    };
    let current = filter_by_severity(current, severity);
    if current.is_empty() {
        return false;
    }
    current != filter_by_severity(previous, severity)
}
