//! Test-only helpers: fixtures, scripted checks, stagers and validators.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, anyhow};

use crate::core::packages::CORE_PACKAGES;
use crate::core::releases::{Release, ReleaseCatalog, ReleaseStatus};
use crate::core::types::{StageEvent, ValidationResult};
use crate::core::version::Version;
use crate::io::config::{UpdaterConfig, write_config};
use crate::io::init::{InitOptions, UpdaterPaths, init_updater};
use crate::io::manifest::{PackageManifest, write_manifest};
use crate::io::release_feed::write_release_catalog;
use crate::io::stager::{STAGED_MANIFEST, Stager};
use crate::stage::{StageSnapshot, StageValidator};
use crate::status::StatusCheck;

/// Parse a version literal.
pub fn v(raw: &str) -> Version {
    raw.parse().expect("test version literal")
}

/// Published release with an explicit security flag.
pub fn release(version: &str, security: bool) -> Release {
    Release {
        version: v(version),
        status: ReleaseStatus::Published,
        security,
    }
}

/// Drupal catalog with the given supported branches.
pub fn catalog(branches: &[&str], releases: Vec<Release>) -> ReleaseCatalog {
    ReleaseCatalog {
        project: "drupal".to_string(),
        supported_branches: branches.iter().map(ToString::to_string).collect(),
        releases,
    }
}

/// Requested package map containing only `drupal/core`.
pub fn core_packages(version: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("drupal/core".to_string(), version.to_string())])
}

pub fn error_result(message: &str) -> ValidationResult {
    ValidationResult::error(vec![message.to_string()], None)
}

pub fn warning_result(message: &str) -> ValidationResult {
    ValidationResult::warning(vec![message.to_string()], None)
}

/// Status check returning fixed results and counting invocations.
pub struct ScriptedCheck {
    name: String,
    results: Vec<ValidationResult>,
    calls: Rc<Cell<usize>>,
}

impl ScriptedCheck {
    pub fn new(name: &str, results: Vec<ValidationResult>) -> Self {
        Self {
            name: name.to_string(),
            results,
            calls: Rc::new(Cell::new(0)),
        }
    }

    /// Shared invocation counter, readable after the check is registered.
    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl StatusCheck for ScriptedCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> Result<Vec<ValidationResult>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.results.clone())
    }
}

/// Status check that always fails.
pub struct FailingCheck {
    name: String,
}

impl FailingCheck {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl StatusCheck for FailingCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> Result<Vec<ValidationResult>> {
        Err(anyhow!("{} exploded", self.name))
    }
}

/// Stager that records calls and writes a staged manifest on `require`.
///
/// Core packages are staged at `staged_core`, whatever was requested, so
/// tests can simulate Composer resolving a different version.
pub struct ScriptedStager {
    staged_core: String,
    fail_on: Option<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedStager {
    pub fn new(staged_core: &str) -> Self {
        Self {
            staged_core: staged_core.to_string(),
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Fail the named operation (`"create"`, `"require"`, `"apply"`).
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, operation: &'static str, call: String) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.fail_on == Some(operation) {
            return Err(anyhow!("scripted {operation} failure"));
        }
        Ok(())
    }
}

impl Stager for ScriptedStager {
    /// The directory exists even when creation is scripted to fail,
    /// like a copy that died halfway.
    fn create(&self, stage_dir: &Path) -> Result<()> {
        fs::create_dir_all(stage_dir)?;
        self.record("create", "create".to_string())
    }

    fn require(&self, stage_dir: &Path, packages: &BTreeMap<String, String>) -> Result<()> {
        let requested: Vec<String> = packages
            .iter()
            .map(|(name, version)| format!("{name}:{version}"))
            .collect();
        self.record("require", format!("require {}", requested.join(" ")))?;

        let mut staged = packages.clone();
        for name in CORE_PACKAGES {
            if let Some(version) = staged.get_mut(name) {
                version.clone_from(&self.staged_core);
            }
        }
        write_manifest(
            &stage_dir.join(STAGED_MANIFEST),
            &PackageManifest { packages: staged },
        )
    }

    fn apply(&self, _stage_dir: &Path) -> Result<()> {
        self.record("apply", "apply".to_string())
    }

    fn destroy(&self, stage_dir: &Path) -> Result<()> {
        self.record("destroy", "destroy".to_string())?;
        if stage_dir.exists() {
            fs::remove_dir_all(stage_dir)?;
        }
        Ok(())
    }
}

/// Stage validator returning fixed results for a single event.
pub struct ScriptedValidator {
    event: StageEvent,
    results: Vec<ValidationResult>,
}

impl ScriptedValidator {
    pub fn new(event: StageEvent, results: Vec<ValidationResult>) -> Self {
        Self { event, results }
    }
}

impl StageValidator for ScriptedValidator {
    fn validate(
        &self,
        event: StageEvent,
        _stage: &StageSnapshot<'_>,
    ) -> Result<Vec<ValidationResult>> {
        if event == self.event {
            Ok(self.results.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Temporary site root with an initialized `.updater/` layout.
pub struct TestSite {
    pub temp: tempfile::TempDir,
    pub paths: UpdaterPaths,
}

impl TestSite {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_updater(temp.path(), &InitOptions { force: false }).expect("init");
        Self { temp, paths }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn stage_dir(&self) -> PathBuf {
        self.paths.stage_dir.clone()
    }

    pub fn with_config(self, cfg: &UpdaterConfig) -> Self {
        write_config(&self.paths.config_path, cfg).expect("write config");
        self
    }

    pub fn with_catalog(self, catalog: &ReleaseCatalog) -> Self {
        write_release_catalog(&self.paths.releases_path, catalog).expect("write catalog");
        self
    }

    /// Record `drupal/core-recommended` at `version` as installed.
    pub fn with_installed(self, version: &str) -> Self {
        let manifest = PackageManifest {
            packages: BTreeMap::from([(
                "drupal/core-recommended".to_string(),
                version.to_string(),
            )]),
        };
        write_manifest(&self.paths.installed_path, &manifest).expect("write manifest");
        self
    }
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}
