use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use toastq_types::{DisplayFlags, Severity, Ttl};
use tracing::{info, warn};

/// Errors produced while loading a [`NotifierConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Registry-wide settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifierConfig {
    /// Reject a toast identical (text, severity, title) to one already visible in its group.
    pub only_unique: bool,
    /// Read groups back newest first.
    pub reverse_order: bool,
    /// Initial capacity of every newly created group; `init_queue` overrides it per group.
    /// Unset, zero or negative means unbounded.
    pub limit_messages: Option<i64>,
    /// Per-severity TTL used when a submission does not carry one.
    pub ttl: SeverityTtl,
    /// Default for [`DisplayFlags::disable_icons`].
    pub disable_icons: bool,
    /// Default for [`DisplayFlags::disable_close_button`].
    pub disable_close_button: bool,
    /// Default for [`DisplayFlags::disable_countdown`].
    pub disable_countdown: bool,
    /// Default for [`DisplayFlags::click_to_close`].
    pub click_to_close: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            only_unique: true,
            reverse_order: false,
            limit_messages: None,
            ttl: SeverityTtl::default(),
            disable_icons: false,
            disable_close_button: false,
            disable_countdown: false,
            click_to_close: false,
        }
    }
}

/// Default TTL per severity, in milliseconds on disk.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SeverityTtl {
    pub success: Ttl,
    pub error: Ttl,
    pub info: Ttl,
    pub warning: Ttl,
}

impl SeverityTtl {
    /// Same TTL for every severity.
    pub fn uniform(ttl: Ttl) -> Self {
        Self {
            success: ttl,
            error: ttl,
            info: ttl,
            warning: ttl,
        }
    }

    pub fn get(&self, severity: Severity) -> Ttl {
        match severity {
            Severity::Success => self.success,
            Severity::Error => self.error,
            Severity::Info => self.info,
            Severity::Warning => self.warning,
        }
    }
}

impl NotifierConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads `path`, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "config not found, using defaults");
            return Self::default();
        }

        match Self::load(path) {
            Ok(cfg) => {
                info!(path = %path.display(), "loaded config");
                cfg
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Initial capacity of every newly created group.
    pub fn default_capacity(&self) -> Option<usize> {
        capacity_from_limit(self.limit_messages)
    }

    /// Flags applied to submissions without explicit flags.
    pub fn default_flags(&self) -> DisplayFlags {
        DisplayFlags {
            disable_icons: self.disable_icons,
            disable_close_button: self.disable_close_button,
            disable_countdown: self.disable_countdown,
            click_to_close: self.click_to_close,
        }
    }

    /// TTL for a submission: explicit value first, then the severity default, else never.
    pub fn resolve_ttl(&self, explicit: Option<Ttl>, severity: Option<Severity>) -> Ttl {
        explicit
            .or_else(|| severity.map(|s| self.ttl.get(s)))
            .unwrap_or_default()
    }
}

/// Normalizes a signed limit. Zero and negative mean unbounded.
pub fn capacity_from_limit(limit: Option<i64>) -> Option<usize> {
    limit
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
}

/// `$XDG_CONFIG_HOME/toastq/config.toml`, falling back to `$HOME/.config`.
pub fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| {
                let mut p = PathBuf::from(home);
                p.push(".config");
                p
            })
        })
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("toastq").join("config.toml")
}
