//! Core release versions and their total order.
//!
//! Accepted forms: `X.Y.Z`, `X.Y.Z-alphaN`, `X.Y.Z-betaN`, `X.Y.Z-rcN`,
//! `X.Y.Z-dev` and branch snapshots `X.Y.x-dev`. Ordering is major, minor,
//! patch, then stability (`dev < alpha < beta < rc < stable`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(?:(\d+)|(x))(?:-(?:(dev)|(alpha|beta|rc)(\d+)))?$").unwrap()
});

/// Release stability tag. Variant order is the stability rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    Dev,
    Alpha(u32),
    Beta(u32),
    Rc(u32),
    Stable,
}

impl Stability {
    /// True for alpha, beta and release candidates.
    pub fn is_prerelease(self) -> bool {
        matches!(self, Stability::Alpha(_) | Stability::Beta(_) | Stability::Rc(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}'")]
pub struct ParseVersionError {
    pub input: String,
}

/// Immutable parsed version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    stability: Stability,
    /// `X.Y.x-dev` branch snapshot rather than a tagged dev release.
    snapshot: bool,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, ParseVersionError> {
        let invalid = || ParseVersionError {
            input: input.to_string(),
        };
        let caps = VERSION_RE.captures(input.trim()).ok_or_else(invalid)?;
        let number = |idx: usize| -> Result<u32, ParseVersionError> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse().map_err(|_| invalid()),
                None => Ok(0),
            }
        };

        let snapshot = caps.get(4).is_some();
        let stability = if caps.get(5).is_some() {
            Stability::Dev
        } else if let Some(tag) = caps.get(6) {
            let n = number(7)?;
            match tag.as_str() {
                "alpha" => Stability::Alpha(n),
                "beta" => Stability::Beta(n),
                _ => Stability::Rc(n),
            }
        } else {
            Stability::Stable
        };
        if snapshot && stability != Stability::Dev {
            return Err(invalid());
        }

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            stability,
            snapshot,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    pub fn stability(&self) -> Stability {
        self.stability
    }

    pub fn is_dev(&self) -> bool {
        self.stability == Stability::Dev
    }

    pub fn is_stable(&self) -> bool {
        self.stability == Stability::Stable
    }

    /// Minor series prefix, e.g. `"9.8."`, matching supported-branch entries.
    pub fn minor_series(&self) -> String {
        format!("{}.{}.", self.major, self.minor)
    }

    pub fn same_minor(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }

    fn sort_key(&self) -> (u32, u32, u32, Stability, bool) {
        (
            self.major,
            self.minor,
            self.patch,
            self.stability,
            self.snapshot,
        )
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.snapshot {
            return write!(f, "{}.{}.x-dev", self.major, self.minor);
        }
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        match self.stability {
            Stability::Dev => write!(f, "-dev"),
            Stability::Alpha(n) => write!(f, "-alpha{n}"),
            Stability::Beta(n) => write!(f, "-beta{n}"),
            Stability::Rc(n) => write!(f, "-rc{n}"),
            Stability::Stable => Ok(()),
        }
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ParseVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}
