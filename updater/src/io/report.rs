//! Human-readable status report rendering.

use anyhow::Result;
use chrono::{DateTime, Utc};
use minijinja::{Environment, context};

use crate::core::results::overall_severity;
use crate::core::types::{Severity, ValidationResult};

const STATUS_TEMPLATE: &str = include_str!("templates/status_report.txt");

/// Template engine wrapper around minijinja.
pub struct ReportRenderer {
    env: Environment<'static>,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("status", STATUS_TEMPLATE)
            .expect("status template should be valid");
        Self { env }
    }

    /// Render stored results. `results == None` means checks have not run.
    pub fn render_status(
        &self,
        results: Option<&[ValidationResult]>,
        last_run: Option<DateTime<Utc>>,
    ) -> Result<String> {
        let overall = match results.and_then(overall_severity) {
            None => "ok",
            Some(Severity::Warning) => "warnings",
            Some(Severity::Error) => "errors",
        };
        let template = self.env.get_template("status")?;
        let rendered = template.render(context! {
            has_results => results.is_some(),
            results => results.unwrap_or_default(),
            overall => overall,
            last_run => last_run
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string()),
        })?;
        Ok(rendered)
    }
}
