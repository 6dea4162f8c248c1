//! Form generation settings.
//!
//! Settings are read from a TOML or JSON file chosen by extension:
//!
//! ```toml
//! max_depth = 5
//! accelerated_ranking = true
//! link_reference = false
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default bound on nested creation levels.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Settings for one form session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FormConfig {
    /// Maximum number of nested creation levels that may be open at once.
    pub max_depth: usize,
    /// Run the bulk priority pass after the serial ranking.
    pub accelerated_ranking: bool,
    /// Store the created `{id, label, data}` object in the parent field instead
    /// of the raw payload.
    pub link_reference: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            accelerated_ranking: true,
            link_reference: false,
        }
    }
}

impl FormConfig {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        Self::from_str_with_ext(&content, ext)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse settings from text in the format named by `ext`.
    pub fn from_str_with_ext(content: &str, ext: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = match ext {
            "toml" | "tml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => bail!("Unsupported config file extension: {ext:?}"),
        };
        Ok(config)
    }

    /// JSON Schema describing this settings file.
    pub fn json_schema() -> anyhow::Result<serde_json::Value> {
        let schema = schemars::schema_for!(FormConfig);
        Ok(serde_json::to_value(&schema)?)
    }
}

/// Derive a default config path from a schema path.
///
/// `person.schema.json` becomes `person.schema-form.toml` in the same directory.
pub fn default_config_by_schema(schema: &Path) -> PathBuf {
    let binding = schema
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name_split = binding.split('.').collect::<Vec<_>>();
    if name_split.len() > 1 {
        name_split.pop();
    }

    let name = format!("{}-form.toml", name_split.join("."));

    match schema.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
