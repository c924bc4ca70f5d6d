//! Release metadata feed load/save with schema validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::releases::ReleaseCatalog;

const RELEASE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/release_metadata.schema.json"
));

/// Load and validate release metadata from disk.
pub fn load_release_catalog(path: &Path) -> Result<ReleaseCatalog> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read release metadata {}", path.display()))?;
    parse_release_catalog(&contents)
        .with_context(|| format!("load release metadata {}", path.display()))
}

/// Parse release metadata JSON: schema conformance, then typed deserialization.
pub fn parse_release_catalog(raw: &str) -> Result<ReleaseCatalog> {
    let value: Value = serde_json::from_str(raw).context("parse release metadata json")?;
    validate_schema(&value)?;
    let catalog: ReleaseCatalog =
        serde_json::from_value(value).context("deserialize release metadata")?;
    debug!(
        project = %catalog.project,
        releases = catalog.releases.len(),
        "release metadata loaded"
    );
    Ok(catalog)
}

/// Write release metadata with stable formatting.
pub fn write_release_catalog(path: &Path, catalog: &ReleaseCatalog) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(catalog)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write release metadata {}", path.display()))
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(RELEASE_SCHEMA).context("parse release schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "release metadata schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
