// crates/placer-config/src/config.rs
// ============================================================================
// Module: Placer Configuration
// Description: Configuration loading and validation for Placer.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and value
//! limits. The path comes from an explicit argument or the `PLACER_CONFIG`
//! environment variable; relative policy and user directories resolve
//! against the config file's directory. Every limit violation is a hard
//! error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "placer.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PLACER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: u64 = 256 * 1024;
/// Maximum resolution depth before a policy is considered runaway.
pub(crate) const MAX_RESOLUTION_DEPTH: u32 = 256;
/// Default resolution depth limit.
pub(crate) const DEFAULT_RESOLUTION_DEPTH: u32 = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file '{path}': {message}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O message.
        message: String,
    },
    /// The config file exceeds the size limit.
    #[error("config file '{path}' exceeds size limit ({size} > {MAX_CONFIG_FILE_SIZE} bytes)")]
    TooLarge {
        /// Path of the oversized file.
        path: String,
        /// Actual file size in bytes.
        size: u64,
    },
    /// The config file is not valid TOML.
    #[error("cannot parse config file '{path}': {message}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Parser message.
        message: String,
    },
    /// A config value failed validation.
    #[error("invalid config value: {message}")]
    Invalid {
        /// Validation message.
        message: String,
    },
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Engine behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Render debug records and error details in the event log.
    #[serde(default)]
    pub debug: bool,
    /// Maximum recursion depth for service references.
    #[serde(default = "default_depth")]
    pub max_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_depth: DEFAULT_RESOLUTION_DEPTH,
        }
    }
}

/// Returns the default resolution depth.
const fn default_depth() -> u32 {
    DEFAULT_RESOLUTION_DEPTH
}

/// Policy and user data locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDirConfig {
    /// Directory scanned for policy object files.
    #[serde(default = "default_policy_dir")]
    pub policy_dir: PathBuf,
    /// JSON file holding the user directory.
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
    /// JSON file holding per-user secrets; optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,
    /// JSON file persisting revisions and the actual state.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

/// Returns the default policy directory.
fn default_policy_dir() -> PathBuf {
    PathBuf::from("policy")
}

/// Returns the default users file.
fn default_users_file() -> PathBuf {
    PathBuf::from("users.json")
}

/// Returns the default state file.
fn default_state_file() -> PathBuf {
    PathBuf::from("placer-state.json")
}

/// Top-level Placer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacerConfig {
    /// Engine behavior.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Policy and user data locations.
    #[serde(default)]
    pub data: PolicyDirConfig,
}

impl PlacerConfig {
    /// Loads configuration from an explicit path, the `PLACER_CONFIG`
    /// environment variable, or `placer.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading, parsing, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => env::var(CONFIG_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME)),
        };
        let config = Self::load_file(&path)?;
        config.validate()?;
        Ok(config.resolve_relative_to(&path))
    }

    /// Reads and parses the config file with the size limit enforced.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let metadata = fs::metadata(path).map_err(|error| ConfigError::Io {
            path: display.clone(),
            message: error.to_string(),
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                path: display,
                size: metadata.len(),
            });
        }

        let raw = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: display.clone(),
            message: error.to_string(),
        })?;
        toml::from_str(&raw).map_err(|error| ConfigError::Parse {
            path: display,
            message: error.to_string(),
        })
    }

    /// Validates value ranges.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_depth == 0 || self.engine.max_depth > MAX_RESOLUTION_DEPTH {
            return Err(ConfigError::Invalid {
                message: format!(
                    "engine.max_depth must be within 1..={MAX_RESOLUTION_DEPTH}, got {}",
                    self.engine.max_depth
                ),
            });
        }
        if self.data.policy_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                message: "data.policy_dir must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves relative data paths against the config file's directory.
    fn resolve_relative_to(mut self, config_path: &Path) -> Self {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        if self.data.policy_dir.is_relative() {
            self.data.policy_dir = base.join(&self.data.policy_dir);
        }
        if self.data.users_file.is_relative() {
            self.data.users_file = base.join(&self.data.users_file);
        }
        if let Some(secrets) = &self.data.secrets_file {
            if secrets.is_relative() {
                self.data.secrets_file = Some(base.join(secrets));
            }
        }
        if self.data.state_file.is_relative() {
            self.data.state_file = base.join(&self.data.state_file);
        }
        self
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
