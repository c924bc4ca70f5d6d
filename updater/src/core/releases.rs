//! Release metadata queries: installable releases, recommended target,
//! security flags and supported branches.

use serde::{Deserialize, Serialize};

use crate::core::types::UpdateContext;
use crate::core::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    #[default]
    Published,
    Unpublished,
}

/// A single entry from the release metadata feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: Version,
    #[serde(default)]
    pub status: ReleaseStatus,
    #[serde(default)]
    pub security: bool,
}

/// Release metadata for one project.
///
/// `supported_branches` holds minor-series prefixes such as `"9.8."`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCatalog {
    pub project: String,
    pub supported_branches: Vec<String>,
    pub releases: Vec<Release>,
}

impl ReleaseCatalog {
    pub fn find(&self, version: &Version) -> Option<&Release> {
        self.releases.iter().find(|release| &release.version == version)
    }

    pub fn is_supported_branch(&self, version: &Version) -> bool {
        let series = version.minor_series();
        self.supported_branches.iter().any(|branch| *branch == series)
    }

    pub fn is_security_release(&self, version: &Version) -> bool {
        self.find(version).is_some_and(|release| release.security)
    }

    /// Published releases newer than `installed` that an update may target,
    /// newest first.
    ///
    /// Only releases in a supported branch of the same major version qualify;
    /// other minor versions qualify only when `allow_minor` is set.
    pub fn installable_releases(&self, installed: &Version, allow_minor: bool) -> Vec<&Release> {
        let mut releases: Vec<&Release> = self
            .releases
            .iter()
            .filter(|release| release.status == ReleaseStatus::Published)
            .filter(|release| release.version > *installed)
            .filter(|release| release.version.major() == installed.major())
            .filter(|release| allow_minor || release.version.same_minor(installed))
            .filter(|release| self.is_supported_branch(&release.version))
            .collect();
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        releases
    }

    pub fn is_installable(&self, installed: &Version, target: &Version, allow_minor: bool) -> bool {
        self.installable_releases(installed, allow_minor)
            .iter()
            .any(|release| &release.version == target)
    }

    /// The release an update should move to, if any.
    ///
    /// Attended updates take the newest installable release. Unattended
    /// updates never leave the installed minor series.
    pub fn recommended_release(
        &self,
        installed: &Version,
        context: UpdateContext,
        allow_minor: bool,
    ) -> Option<&Release> {
        match context {
            UpdateContext::Attended => self
                .installable_releases(installed, allow_minor)
                .into_iter()
                .next(),
            UpdateContext::Unattended => self
                .installable_releases(installed, false)
                .into_iter()
                .next(),
        }
    }
}
