//! Helpers over ordered validation result lists.

use crate::core::types::{Severity, ValidationResult};

/// Keep results matching `severity` (all when `None`), preserving order.
pub fn filter_by_severity(
    results: &[ValidationResult],
    severity: Option<Severity>,
) -> Vec<ValidationResult> {
    results
        .iter()
        .filter(|result| severity.is_none_or(|wanted| result.severity == wanted))
        .cloned()
        .collect()
}

/// Highest severity present, or `None` for an empty list.
pub fn overall_severity(results: &[ValidationResult]) -> Option<Severity> {
    results.iter().map(|result| result.severity).max()
}

pub fn has_errors(results: &[ValidationResult]) -> bool {
    results.iter().any(ValidationResult::is_error)
}

/// Flatten results into `severity: message` lines for logs.
pub fn describe(results: &[ValidationResult]) -> Vec<String> {
    let mut lines = Vec::new();
    for result in results {
        if let Some(summary) = &result.summary {
            lines.push(format!("{}: {}", result.severity.as_str(), summary));
        }
        for message in &result.messages {
            lines.push(format!("{}: {}", result.severity.as_str(), message));
        }
    }
    lines
}
