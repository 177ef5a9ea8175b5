//! Configuration management for Rota
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (ROTA_*)
//! 3. Config file (~/.config/rota/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, `None` for the platform default
    pub path: Option<PathBuf>,

    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

/// Reviewer selection configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Fixed RNG seed; unset draws from OS entropy
    pub seed: Option<u64>,

    /// Per-operation deadline, e.g. "5s"
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Option<Duration>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,

    pub assignment: AssignmentConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/rota/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rota").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - ROTA_DATABASE_PATH: SQLite file path
    /// - ROTA_SEED: RNG seed
    /// - ROTA_OPERATION_TIMEOUT: per-operation deadline ("500ms", "5s")
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = var("ROTA_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(seed) = var("ROTA_SEED") {
            let seed = seed
                .parse()
                .map_err(|e| Error::Config(format!("Invalid ROTA_SEED {:?}: {}", seed, e)))?;
            self.assignment.seed = Some(seed);
        }

        if let Some(timeout) = var("ROTA_OPERATION_TIMEOUT") {
            let timeout = humantime_serde::re::humantime::parse_duration(&timeout).map_err(|e| {
                Error::Config(format!("Invalid ROTA_OPERATION_TIMEOUT {:?}: {}", timeout, e))
            })?;
            self.assignment.operation_timeout = Some(timeout);
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, database_path: Option<PathBuf>, seed: Option<u64>) -> Self {
        if let Some(path) = database_path {
            self.database.path = Some(path);
        }

        if let Some(seed) = seed {
            self.assignment.seed = Some(seed);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(database_path: Option<PathBuf>, seed: Option<u64>) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(database_path, seed))
    }
}
