//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::Error;

/// Hearth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub actor: ActorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one SQLite file per instance
    pub data_dir: PathBuf,
    /// Drizzle-style migrations directory; the built-in set is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations_dir: Option<PathBuf>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    pub default_instance: String,
    /// Upper bound on rows returned by list operations
    pub max_results: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "127.0.0.1:8787".to_string(),
            },
            storage: StorageConfig {
                data_dir: default_data_dir(),
                migrations_dir: None,
                max_connections: 1,
            },
            actor: ActorConfig {
                default_instance: "example".to_string(),
                max_results: 1000,
            },
        }
    }
}

/// Get the default directory for instance databases
pub fn default_data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("hearth")
    } else {
        PathBuf::from(".hearth")
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("HEARTH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("hearth")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist.
    ///
    /// `HEARTH_BIND_ADDR` and `HEARTH_DATA_DIR` take precedence over the file.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load the config file as written, without environment overrides.
    /// Use this when the result is going to be saved back.
    pub fn load_file() -> anyhow::Result<Self> {
        Self::from_file(&Self::config_path()?)
    }

    /// Parse `path`, or defaults if it doesn't exist
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply `HEARTH_*` overrides looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("HEARTH_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(dir) = lookup("HEARTH_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        self.save_to(&Self::config_path()?)
    }

    /// Validate and write configuration to `path`
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration. Failures carry an [`Error::ConfigError`].
    pub fn validate(&self) -> anyhow::Result<()> {
        let invalid = |message: String| anyhow::Error::new(Error::ConfigError(message));

        self.bind_addr()?;
        if self.storage.max_connections == 0 {
            return Err(invalid("storage.max_connections must be at least 1".to_string()));
        }
        if self.actor.max_results == 0 {
            return Err(invalid("actor.max_results must be at least 1".to_string()));
        }
        crate::actor::validate_instance_name(&self.actor.default_instance)
            .map_err(|e| invalid(format!("actor.default_instance: {}", e)))?;
        Ok(())
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server.bind_addr.parse().map_err(|_| {
            anyhow::Error::new(Error::ConfigError(format!(
                "server.bind_addr must be host:port, got '{}'",
                self.server.bind_addr
            )))
        })
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "server.bind_addr" => Ok(self.server.bind_addr.clone()),

            "storage.data_dir" => Ok(self.storage.data_dir.display().to_string()),
            "storage.migrations_dir" => Ok(self
                .storage
                .migrations_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(built-in)".to_string())),
            "storage.max_connections" => Ok(self.storage.max_connections.to_string()),

            "actor.default_instance" => Ok(self.actor.default_instance.clone()),
            "actor.max_results" => Ok(self.actor.max_results.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `hearth config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "server.bind_addr" => {
                value
                    .parse::<SocketAddr>()
                    .with_context(|| format!("Invalid bind address: {}", value))?;
                self.server.bind_addr = value.to_string();
            }

            "storage.data_dir" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "storage.migrations_dir" => {
                self.storage.migrations_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "storage.max_connections" => {
                let max: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_connections value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_connections must be at least 1"));
                }
                self.storage.max_connections = max;
            }

            "actor.default_instance" => {
                crate::actor::validate_instance_name(value)
                    .map_err(|e| anyhow!("{}", e))?;
                self.actor.default_instance = value.to_string();
            }
            "actor.max_results" => {
                let max: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_results value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_results must be at least 1"));
                }
                self.actor.max_results = max;
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `hearth config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "server.bind_addr",
            "storage.data_dir",
            "storage.migrations_dir",
            "storage.max_connections",
            "actor.default_instance",
            "actor.max_results",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
