//! Core update policy engine for a Drupal site.
//!
//! Decides whether moving the installed core release to a target release is
//! allowed, aggregates status checks with stored results, and drives update
//! stages through their lifecycle. The architecture
//! enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (versions, release catalog,
//!   version policy, result helpers). No I/O.
//! - **[`io`]**: Side-effecting operations (config, release metadata,
//!   manifests, stored status, Composer staging, report rendering).
//!
//! Orchestration modules ([`status`], [`stage`], [`cron`]) coordinate core
//! logic with I/O; [`checks`] holds the built-in checks and validators.

pub mod checks;
pub mod core;
pub mod cron;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod stage;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
