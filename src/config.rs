use std::{path::Path, path::PathBuf, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Directory for daily rotated log files, stdout when unset
    pub log_dir: Option<PathBuf>,
    pub cache: CacheConfig,
    pub analytics: AnalyticsConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://database/lms.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_dir: None,
            cache: CacheConfig::default(),
            analytics: AnalyticsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Max number of per-student computations in flight for one request
    pub fan_out_limit: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            fan_out_limit: 8,
            default_page_size: 20,
            max_page_size: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub request_timeout_secs: u64,
    pub session_ttl_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            session_ttl_days: 5,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load the config file if it exists, then apply `LMS_DATABASE_URL` from the environment.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("parse config {}", path.display()))?
        } else {
            Config::default()
        };
        let _ = dotenvy::dotenv();
        if let Ok(url) = dotenvy::var("LMS_DATABASE_URL") {
            config.database_url = url;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = 9000

            [analytics]
            fan_out_limit = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.analytics.fan_out_limit, 2);
        assert_eq!(config.analytics.default_page_size, 20);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lms.toml");
        std::fs::write(&path, "host = \"0.0.0.0\"\n[cache]\nttl_secs = 5\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.cache.ttl_secs, 5);
    }
}
