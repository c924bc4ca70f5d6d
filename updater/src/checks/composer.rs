//! Checks that the configured Composer executable can be found.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::types::ValidationResult;
use crate::status::StatusCheck;

pub struct ComposerExecutableCheck {
    composer: String,
}

impl ComposerExecutableCheck {
    pub fn new(composer: impl Into<String>) -> Self {
        Self {
            composer: composer.into(),
        }
    }
}

impl StatusCheck for ComposerExecutableCheck {
    fn name(&self) -> &str {
        "composer_executable"
    }

    fn check(&self) -> Result<Vec<ValidationResult>> {
        if locate(&self.composer).is_some() {
            return Ok(Vec::new());
        }
        Ok(vec![ValidationResult::error(
            vec![format!("Composer could not be found at '{}'.", self.composer)],
            None,
        )])
    }
}

/// Resolve an executable given as a path or as a bare name on `PATH`.
fn locate(executable: &str) -> Option<PathBuf> {
    let candidate = Path::new(executable);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let search = env::var_os("PATH")?;
    env::split_paths(&search)
        .map(|dir| dir.join(executable))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_path_must_exist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let composer = temp.path().join("composer.phar");
        fs::write(&composer, "").expect("write");

        let present = ComposerExecutableCheck::new(composer.display().to_string());
        assert!(present.check().expect("check").is_empty());

        let missing_path = temp.path().join("missing/composer");
        let missing = ComposerExecutableCheck::new(missing_path.display().to_string());
        assert_eq!(
            missing.check().expect("check"),
            vec![ValidationResult::error(
                vec![format!(
                    "Composer could not be found at '{}'.",
                    missing_path.display()
                )],
                None
            )]
        );
    }

    #[test]
    fn bare_name_is_searched_on_path() {
        assert!(locate("sh").is_some());
        assert!(locate("definitely-not-a-real-composer-binary").is_none());
    }
}
