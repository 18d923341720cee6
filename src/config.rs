use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::tracker::server::ServerConfig;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "orders.toml";

/// Runtime configuration loaded from `orders.toml`.
///
/// Layering: file, then environment (`PORT`, `HOST`, `ORDERS_DATA_DIR`,
/// `ORDERS_LOG`), then CLI flags applied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory holding the data file and the default price list.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default = "default_prices_file")]
    pub default_prices_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive, e.g. `info` or `production_orders=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_data_file() -> String {
    "data.json".to_string()
}

fn default_prices_file() -> String {
    "default-material-prices.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            data_file: default_data_file(),
            default_prices_file: default_prices_file(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse orders.toml")
    }

    /// Load `path` when it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides. `lookup` is normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warnings.push(format!("Ignoring invalid PORT '{}'", port)),
            }
        }
        if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
            self.server.host = host;
        }
        if let Some(dir) = lookup("ORDERS_DATA_DIR").filter(|d| !d.is_empty()) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("ORDERS_LOG").filter(|l| !l.is_empty()) {
            self.logging.level = level;
        }
        warnings
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; the OS will pick a random port".to_string());
        }
        if self.storage.data_file.trim().is_empty() {
            warnings.push("storage.data_file is empty".to_string());
        }
        if self.storage.data_file == self.storage.default_prices_file {
            warnings.push(format!(
                "storage.data_file and storage.default_prices_file are both '{}'",
                self.storage.data_file
            ));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            warnings.push(format!("Invalid logging.level '{}'", self.logging.level));
        }

        warnings
    }

    pub fn data_file(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.data_file)
    }

    pub fn default_prices_file(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.default_prices_file)
    }

    pub fn server_config(&self, dev_mode: bool) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            data_file: self.data_file(),
            default_prices_file: self.default_prices_file(),
            dev_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.data_file(), PathBuf::from("data/data.json"));
        assert_eq!(
            config.default_prices_file(),
            PathBuf::from("data/default-material-prices.json")
        );
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_parse_partial_file_fills_defaults() {
        let config = AppConfig::parse(
            r#"
[server]
port = 8080

[logging]
json = true
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage, StorageSection::default());
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_toml_is_error() {
        let err = AppConfig::parse("[server\nport = ").unwrap_err();
        assert!(err.to_string().contains("orders.toml"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[storage]\ndata_dir = \"/srv/orders\"\n").unwrap();
        let config = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(config.data_file(), PathBuf::from("/srv/orders/data.json"));
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = AppConfig::default();
        let warnings = config.apply_env(env(&[
            ("PORT", "4000"),
            ("HOST", "127.0.0.1"),
            ("ORDERS_DATA_DIR", "/tmp/orders"),
            ("ORDERS_LOG", "debug"),
        ]));
        assert!(warnings.is_empty());
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/orders"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_apply_env_invalid_port_warns_and_keeps_value() {
        let mut config = AppConfig::default();
        let warnings = config.apply_env(env(&[("PORT", "eighty")]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("eighty"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_empty());

        let mut config = AppConfig::default();
        config.server.port = 0;
        config.storage.default_prices_file = config.storage.data_file.clone();
        config.logging.level = "orders=loudest".to_string();
        assert_eq!(config.validate().len(), 3);
    }

    #[test]
    fn test_server_config_uses_storage_paths() {
        let mut config = AppConfig::default();
        config.storage.data_dir = PathBuf::from("/var/lib/orders");
        let server = config.server_config(true);
        assert_eq!(server.data_file, PathBuf::from("/var/lib/orders/data.json"));
        assert!(server.dev_mode);
        assert_eq!(server.port, 3000);
    }
}
