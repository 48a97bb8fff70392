// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Layers, lowest first: built-in defaults, the user's `config.toml` (or an
//! explicit file), then `FIELDCAPTURE_*` environment variables.

use crate::attachments::MAX_ATTACHMENT_BYTES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Per-file attachment limit in bytes, never above 10 MiB
    pub attachment_limit_bytes: u64,
    /// Render inline previews for image attachments
    pub previews: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            attachment_limit_bytes: MAX_ATTACHMENT_BYTES,
            previews: true,
        }
    }
}

impl Config {
    /// Attachment limit after clamping to the hard ceiling
    #[must_use]
    pub fn effective_attachment_limit(&self) -> u64 {
        self.attachment_limit_bytes.min(MAX_ATTACHMENT_BYTES)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Look up a single key as a display string
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "log_level" => Some(self.log_level.clone()),
            "attachment_limit_bytes" => Some(self.effective_attachment_limit().to_string()),
            "previews" => Some(self.previews.to_string()),
            _ => None,
        }
    }
}

/// Default location of the user's config file
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "hyperpolymath", "fieldcapture")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration.
///
/// An explicit `path` must exist; the default user file is optional.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let defaults = ::config::Config::try_from(&Config::default())
        .context("Failed to build default configuration")?;

    let mut builder = ::config::Config::builder().add_source(defaults);
    match path {
        Some(p) => {
            builder = builder.add_source(::config::File::from(p).required(true));
        }
        None => {
            if let Some(p) = default_path() {
                builder = builder.add_source(::config::File::from(p).required(false));
            }
        }
    }
    builder = builder.add_source(::config::Environment::with_prefix("FIELDCAPTURE").try_parsing(true));

    let cfg: Config = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;

    if cfg.attachment_limit_bytes > MAX_ATTACHMENT_BYTES {
        tracing::warn!(
            requested = cfg.attachment_limit_bytes,
            ceiling = MAX_ATTACHMENT_BYTES,
            "attachment limit above ceiling; clamped"
        );
    }
    Ok(cfg)
}
