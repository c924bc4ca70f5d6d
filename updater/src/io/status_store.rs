//! Storage for status-check results and the last run time.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::ValidationResult;

/// Persisted status-check state.
///
/// `results` is `None` when nothing is stored (never run, or cleared);
/// `last_run` survives clearing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStatus {
    pub results: Option<Vec<ValidationResult>>,
    pub last_run: Option<DateTime<Utc>>,
}

/// Backing store for [`crate::status::StatusChecker`].
pub trait StatusStore {
    fn load(&self) -> Result<StoredStatus>;
    fn save(&self, status: &StoredStatus) -> Result<()>;
}

/// JSON file store (`.updater/state/status.json`). A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusStore for FileStatusStore {
    fn load(&self) -> Result<StoredStatus> {
        if !self.path.exists() {
            return Ok(StoredStatus::default());
        }
        debug!(path = %self.path.display(), "loading status results");
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read status {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse status {}", self.path.display()))
    }

    fn save(&self, status: &StoredStatus) -> Result<()> {
        debug!(
            path = %self.path.display(),
            results = status.results.as_ref().map(Vec::len),
            "writing status results"
        );
        let mut buf = serde_json::to_string_pretty(status)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

/// In-process store, used for request-scoped checkers and tests.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    state: RefCell<StoredStatus>,
}

impl StatusStore for MemoryStatusStore {
    fn load(&self) -> Result<StoredStatus> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, status: &StoredStatus) -> Result<()> {
        *self.state.borrow_mut() = status.clone();
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("status path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp status {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace status {}", path.display()))?;
    Ok(())
}
