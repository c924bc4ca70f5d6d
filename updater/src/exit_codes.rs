//! Stable exit codes for updater CLI commands.

/// Command succeeded; `status` found no errors; `cron` updated or had nothing to do.
pub const OK: i32 = 0;
/// Invalid layout, config, release metadata or manifest, or any other fault.
pub const INVALID: i32 = 1;
/// `updater status` reported at least one error result.
pub const ERRORS: i32 = 2;
/// `updater cron` was blocked by validation or the stage failed.
pub const BLOCKED: i32 = 3;
