//! Status-check aggregation with stored results.
//!
//! Registered checks run synchronously, highest priority first (ties keep
//! registration order). Their results are concatenated in that order and
//! stored together with the run time until something invalidates them.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::core::notify::{MailLevel, should_notify};
use crate::core::results::filter_by_severity;
use crate::core::types::{Severity, ValidationResult};
use crate::io::config::WATCHED_KEYS;
use crate::io::status_store::{StatusStore, StoredStatus};

/// A check contributing results to the status report.
pub trait StatusCheck {
    fn name(&self) -> &str;
    fn check(&self) -> Result<Vec<ValidationResult>>;
}

/// External events that may make stored results stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    ModuleInstalled(String),
    ModuleUninstalled(String),
    /// A config key changed, e.g. `unattended.level`.
    ConfigChanged(String),
    /// An update finished its post-apply phase.
    PostApply,
}

impl InvalidationEvent {
    fn invalidates(&self) -> bool {
        match self {
            InvalidationEvent::ModuleInstalled(_)
            | InvalidationEvent::ModuleUninstalled(_)
            | InvalidationEvent::PostApply => true,
            InvalidationEvent::ConfigChanged(key) => WATCHED_KEYS.contains(&key.as_str()),
        }
    }
}

struct RegisteredCheck {
    priority: i32,
    check: Box<dyn StatusCheck>,
}

/// Runs registered checks and caches their results in a [`StatusStore`].
pub struct StatusChecker<S: StatusStore> {
    store: S,
    checks: Vec<RegisteredCheck>,
    clock: fn() -> DateTime<Utc>,
}

impl<S: StatusStore> StatusChecker<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            checks: Vec::new(),
            clock: Utc::now,
        }
    }

    /// Replace the clock used to stamp runs.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a check. Higher priorities run first.
    pub fn register(&mut self, check: impl StatusCheck + 'static, priority: i32) {
        self.checks.push(RegisteredCheck {
            priority,
            check: Box::new(check),
        });
        // Stable sort keeps registration order among equal priorities.
        self.checks.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Names of registered checks in run order.
    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|entry| entry.check.name()).collect()
    }

    /// Run every check and replace the stored results.
    ///
    /// The first failing check aborts the run; stored results are left as
    /// they were.
    #[instrument(skip_all, fields(checks = self.checks.len()))]
    pub fn run(&self) -> Result<Vec<ValidationResult>> {
        let mut results = Vec::new();
        for entry in &self.checks {
            let name = entry.check.name();
            let produced = entry
                .check
                .check()
                .with_context(|| format!("status check '{name}'"))?;
            for result in &produced {
                result
                    .check_shape()
                    .map_err(|err| anyhow!("status check '{name}': {err}"))?;
            }
            debug!(check = name, results = produced.len(), "status check completed");
            results.extend(produced);
        }

        self.store.save(&StoredStatus {
            results: Some(results.clone()),
            last_run: Some((self.clock)()),
        })?;
        info!(results = results.len(), "status checks stored");
        Ok(results)
    }

    /// Run only when nothing is stored; otherwise return the stored results.
    pub fn run_if_no_stored_results(&self) -> Result<Vec<ValidationResult>> {
        match self.store.load()?.results {
            Some(results) => Ok(results),
            None => self.run(),
        }
    }

    /// Run and report whether the change from the previous run warrants a
    /// notification at `level`.
    pub fn run_with_notice(&self, level: MailLevel) -> Result<(Vec<ValidationResult>, bool)> {
        let previous = self.store.load()?.results;
        let current = self.run()?;
        let notify = should_notify(previous.as_deref(), &current, level);
        if notify {
            info!(level = ?level, "status check results changed");
        }
        Ok((current, notify))
    }

    /// Drop stored results. The last run time is kept.
    pub fn clear_stored_results(&self) -> Result<()> {
        let mut stored = self.store.load()?;
        stored.results = None;
        self.store.save(&stored)
    }

    /// Stored results filtered by severity, or `None` when nothing is stored.
    pub fn results(&self, severity: Option<Severity>) -> Result<Option<Vec<ValidationResult>>> {
        Ok(self
            .store
            .load()?
            .results
            .map(|results| filter_by_severity(&results, severity)))
    }

    pub fn last_run_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.store.load()?.last_run)
    }

    /// Clear stored results if `event` invalidates them. Returns whether it did.
    pub fn handle_event(&self, event: &InvalidationEvent) -> Result<bool> {
        if !event.invalidates() {
            return Ok(false);
        }
        debug!(?event, "invalidating stored status results");
        self.clear_stored_results()?;
        Ok(true)
    }
}
