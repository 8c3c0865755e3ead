//! Configuration management for db-utils
//!
//! Handles loading and saving connection configurations to ~/.config/db-utils/config.json

use crate::db::{DatabaseBackend, SqlServerConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Where a connection points
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ConnectionTarget {
    Sqlite { path: PathBuf },
    SqlServer(SqlServerConfig),
}

impl ConnectionTarget {
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            ConnectionTarget::Sqlite { .. } => DatabaseBackend::Sqlite,
            ConnectionTarget::SqlServer(_) => DatabaseBackend::SqlServer,
        }
    }

    /// Short human-readable location, never including credentials
    pub fn describe(&self) -> String {
        match self {
            ConnectionTarget::Sqlite { path } => path.display().to_string(),
            ConnectionTarget::SqlServer(cfg) => {
                format!("{}:{}/{}", cfg.host, cfg.port, cfg.database)
            }
        }
    }
}

/// Configuration for a single named database connection
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub name: String,
    #[serde(flatten)]
    pub target: ConnectionTarget,
}

/// Application configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// List of saved connections
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    /// Connection used when none is named on the command line
    #[serde(default)]
    pub default_connection: Option<String>,
    /// Upper bound for any single introspection query
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            default_connection: None,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Get the config file path (~/.config/db-utils/config.json)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("db-utils");

        Ok(config_dir.join("config.json"))
    }

    /// Load configuration, creating an empty file if none exists yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            // A read-only config dir must not break inspection
            if let Err(e) = config.save(path) {
                tracing::debug!(path = %path.display(), error = %e, "could not write default config");
            }
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        tracing::debug!(path = %path.display(), connections = config.connections.len(), "loaded config");
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get a connection by name
    pub fn get_connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// Pick the connection to use: the named one, else `default_connection`
    pub fn resolve_connection(&self, name: Option<&str>) -> Result<&ConnectionConfig> {
        let name = name
            .or(self.default_connection.as_deref())
            .context("No connection selected: pass --connection, --sqlite, or set default_connection in the config file")?;
        self.get_connection(name)
            .with_context(|| format!("Connection '{}' is not defined in the config file", name))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "connections": [
            {"name": "local", "backend": "sqlite", "path": "app.db"},
            {"name": "prod", "backend": "sql_server", "host": "db.internal", "port": 1444,
             "user": "reader", "password": "secret", "database": "sales",
             "encrypt": true, "trust_cert": false}
        ],
        "default_connection": "local"
    }"#;

    #[test]
    fn test_parse_connections() {
        let config: AppConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.query_timeout_secs, 30);
        assert_eq!(
            config.get_connection("local").unwrap().target,
            ConnectionTarget::Sqlite { path: PathBuf::from("app.db") }
        );
        let prod = config.get_connection("prod").unwrap();
        assert_eq!(prod.target.backend(), DatabaseBackend::SqlServer);
        assert_eq!(prod.target.describe(), "db.internal:1444/sales");
        match &prod.target {
            ConnectionTarget::SqlServer(cfg) => {
                assert_eq!(cfg.user, "reader");
                assert!(cfg.encrypt);
                assert!(!cfg.trust_cert);
            }
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn test_resolve_connection() {
        let config: AppConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.resolve_connection(None).unwrap().name, "local");
        assert_eq!(config.resolve_connection(Some("prod")).unwrap().name, "prod");
        assert!(config.resolve_connection(Some("staging")).is_err());
        assert!(AppConfig::default().resolve_connection(None).is_err());
    }

    #[test]
    fn test_load_missing_writes_default() {
        let dir = std::env::temp_dir().join(format!("db-utils-config-{}", std::process::id()));
        let path = dir.join("config.json");
        let _ = fs::remove_dir_all(&dir);

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
        let _ = fs::remove_dir_all(&dir);
    }
}
