//! Client configuration, read from `config.toml`

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use anyhow::{bail, Context};
use serde::Deserialize;
use crate::upload::DEFAULT_MAX_IMAGE_BYTES;

static CONFIG: OnceLock<Config> = OnceLock::new();

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const ENV_ENVIRONMENT: &str = "LEAFSCAN_ENV";
pub const ENV_API_URL: &str = "LEAFSCAN_API_URL";

const DEVELOPMENT_URL: &str = "http://localhost:8000/api";
const PRODUCTION_URL: &str = "https://your-production-api.com/api";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => bail!("Unknown environment {:?}, expected development or production", other),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub development_url: String,
    pub production_url: String,
    /// 设置后忽略 environment，直接使用此地址
    pub api_url: Option<String>,
    pub timeout_secs: u64,
    pub max_image_bytes: u64,
    pub demo_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            development_url: DEVELOPMENT_URL.to_string(),
            production_url: PRODUCTION_URL.to_string(),
            api_url: None,
            timeout_secs: 60,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            demo_delay_ms: 2000,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> anyhow::Result<Config> {
        toml::from_str(content).context("Can't parse config")
    }

    /// 读取配置文件（不存在则使用默认值），再应用环境变量
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Something went wrong reading {}", path.display()))?;
            Self::from_toml(&content).with_context(|| format!("Can't load {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Config::default()
        };

        config.apply_overrides(
            std::env::var(ENV_ENVIRONMENT).ok(),
            std::env::var(ENV_API_URL).ok(),
        )?;

        Ok(config)
    }

    pub fn apply_overrides(&mut self, environment: Option<String>, api_url: Option<String>) -> anyhow::Result<()> {
        if let Some(environment) = environment.filter(|value| !value.trim().is_empty()) {
            self.environment = environment.parse()?;
        }

        if let Some(api_url) = api_url.filter(|value| !value.trim().is_empty()) {
            self.api_url = Some(api_url);
        }

        Ok(())
    }

    pub fn base_url(&self) -> String {
        if let Some(api_url) = &self.api_url {
            return api_url.clone();
        }

        match self.environment {
            Environment::Development => self.development_url.clone(),
            Environment::Production => self.production_url.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn demo_delay(&self) -> Duration {
        Duration::from_millis(self.demo_delay_ms)
    }
}

/// 加载一次并缓存，之后的调用直接返回缓存
pub fn init_config(path: impl AsRef<Path>) -> anyhow::Result<&'static Config> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = Config::load(path)?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.base_url(), "http://localhost:8000/api");
        assert_eq!(config.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml(
            r#"
            environment = "production"
            production_url = "https://plants.example.com/api"
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url(), "https://plants.example.com/api");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.demo_delay_ms, 2000);
    }

    #[test]
    fn test_malformed_file() {
        assert!(Config::from_toml("environment = \"staging\"").is_err());
        assert!(Config::from_toml("timeout_secs = \"ten\"").is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(Some("prod".into()), None)
            .unwrap();
        assert_eq!(config.base_url(), PRODUCTION_URL);

        config
            .apply_overrides(None, Some("http://10.0.0.2:8000/api".into()))
            .unwrap();
        assert_eq!(config.base_url(), "http://10.0.0.2:8000/api");

        assert!(config.apply_overrides(Some("staging".into()), None).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("config.toml")).unwrap();
        assert_eq!(config.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_image_bytes = 1024\ndemo_delay_ms = 0\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_image_bytes, 1024);
        assert_eq!(config.demo_delay(), Duration::ZERO);
    }
}
