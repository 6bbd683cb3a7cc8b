use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::theme::ThemeMode;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub result_count: u32,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7860".to_string(),
            result_count: 5,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "https://identitytoolkit.googleapis.com".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub project_id: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com".to_string(),
            project_id: String::new(),
        }
    }
}

impl RemoteConfig {
    pub fn enabled(&self) -> bool {
        !self.project_id.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UiConfig {
    pub default_theme: ThemeMode,
    pub tick_rate_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_theme: ThemeMode::Dark,
            tick_rate_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Defaults, then the optional file at `path`, then `AALIM__SECTION__KEY`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self, ::config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(::config::Environment::with_prefix("AALIM").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        app_config.api.base_url = expand_env(&app_config.api.base_url);
        app_config.auth.api_key = expand_env(&app_config.auth.api_key);
        app_config.remote.project_id = expand_env(&app_config.remote.project_id);
        app_config.storage.data_dir = expand_env(&app_config.storage.data_dir);

        Ok(app_config)
    }

    pub fn data_dir(&self) -> PathBuf {
        if !self.storage.data_dir.is_empty() {
            return PathBuf::from(&self.storage.data_dir);
        }
        dirs::data_dir()
            .map(|dir| dir.join("aalim"))
            .unwrap_or_else(|| PathBuf::from(".aalim"))
    }

    pub fn log_file(&self) -> PathBuf {
        if self.logging.file.is_empty() {
            self.data_dir().join("aalim.log")
        } else {
            PathBuf::from(&self.logging.file)
        }
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_rate_ms.max(10))
    }
}

fn expand_env(val: &str) -> String {
    match val.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => val.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("missing.toml");
        let config = AppConfig::load(missing.to_str().unwrap_or("missing.toml"))?;

        assert_eq!(config.api.result_count, 5);
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.ui.default_theme, ThemeMode::Dark);
        assert!(!config.remote.enabled());
        Ok(())
    }

    #[test]
    fn test_file_overrides_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("aalim.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "http://qa.internal:7860"
result_count = 8

[ui]
default_theme = "light"

[storage]
data_dir = "/tmp/aalim-test"
"#,
        )?;

        let config = AppConfig::load(path.to_str().unwrap_or_default())?;
        assert_eq!(config.api.base_url, "http://qa.internal:7860");
        assert_eq!(config.api.result_count, 8);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.ui.default_theme, ThemeMode::Light);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/aalim-test"));
        assert_eq!(config.log_file(), PathBuf::from("/tmp/aalim-test/aalim.log"));
        Ok(())
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("AALIM_TEST_EXPAND_KEY", "abc123");
        assert_eq!(expand_env("${AALIM_TEST_EXPAND_KEY}"), "abc123");
        assert_eq!(expand_env("${AALIM_TEST_SURELY_UNSET}"), "");
        assert_eq!(expand_env("plain"), "plain");
    }
}
