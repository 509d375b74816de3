// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::syntax::Dialect;

/// Represents options provided to the tools. Options are read from an optional toml
/// file; command line flags override them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Wrap bodies of conditionals, loops and case labels into blocks.
    pub canonicalize: bool,
    /// Prefix file-scope definitions with `static`.
    pub make_globals_static: bool,
    /// Insert marker calls and declarations.
    pub instrument: bool,
    /// Parse every input as this language instead of guessing from the extension.
    pub dialect: Option<Dialect>,
    /// Print the rewritten sources instead of writing them back.
    pub dry_run: bool,
    /// Verbosity level for logging.
    pub verbosity_level: LevelFilter,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            canonicalize: true,
            make_globals_static: true,
            instrument: true,
            dialect: None,
            dry_run: false,
            verbosity_level: LevelFilter::Info,
        }
    }
}

impl Options {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Options of the standalone static annotator.
    pub fn static_only() -> Self {
        Self {
            canonicalize: false,
            instrument: false,
            ..Self::default()
        }
    }

    /// The dialect used to parse `path`.
    pub fn dialect_for(&self, path: &Path) -> Dialect {
        self.dialect
            .or_else(|| Dialect::from_path(path))
            .unwrap_or(Dialect::C)
    }
}
