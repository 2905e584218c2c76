//! Pass configuration

use crate::error::ConfigError;
use anyhow::Context;
use hw_ir::{ModuleEntry, ModuleKind, Visibility};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Switches controlling which aggregates survive lowering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LowerTypesOptions {
    /// Keep passive, analog-free, non-zero-width aggregates where legal
    pub preserve_aggregate: bool,
    /// Always decompose the ports of public and external modules
    pub preserve_public_types: bool,
}

impl Default for LowerTypesOptions {
    fn default() -> Self {
        Self {
            preserve_aggregate: false,
            preserve_public_types: true,
        }
    }
}

impl LowerTypesOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `preserve_aggregate`
    #[must_use]
    pub fn preserve_aggregate(mut self, enabled: bool) -> Self {
        self.preserve_aggregate = enabled;
        self
    }

    /// Sets `preserve_public_types`
    #[must_use]
    pub fn preserve_public_types(mut self, enabled: bool) -> Self {
        self.preserve_public_types = enabled;
        self
    }

    /// Parses options from TOML text
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads options from a TOML file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Whether the ports of a module described by `entry` may keep aggregate types
    ///
    /// Public and external modules decompose while `preserve_public_types`
    /// is set, regardless of `preserve_aggregate`.
    pub fn ports_may_preserve(&self, entry: ModuleEntry) -> bool {
        if !self.preserve_aggregate {
            return false;
        }
        if !self.preserve_public_types {
            return true;
        }
        if entry.kind == ModuleKind::External {
            return false;
        }
        entry.visibility == Visibility::Private
    }
}
