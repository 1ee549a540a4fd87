use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::addons::DEFAULT_DB_MAX_AGE_DAYS;

pub const CONFIG_FILENAME: &str = "kubejs-recipes.toml";
pub const DEFAULT_RECIPES_FILE: &str = "recipes.json";
pub const DEFAULT_ADDONS_DB_FILE: &str = "addons_db.json";
pub const DEFAULT_EXPORT_FILE: &str = "export.js";
pub const DEFAULT_ADDONS_URL: &str = "https://kubejs.com/wiki/addons";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 KubeJS Recipe Manager";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FILE: &str = "kubejs_recipes.log";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub settings: SettingsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsSection {
    pub recipes_file: String,
    pub addons_db_file: String,
    pub export_default: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            recipes_file: DEFAULT_RECIPES_FILE.to_string(),
            addons_db_file: DEFAULT_ADDONS_DB_FILE.to_string(),
            export_default: DEFAULT_EXPORT_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SettingsSection {
    pub db_max_age_days: u64,
    pub addons_url: String,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            db_max_age_days: DEFAULT_DB_MAX_AGE_DAYS,
            addons_url: DEFAULT_ADDONS_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub file: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve the addons page URL: env KUBEJS_ADDONS_URL > config.
    pub fn addons_url(&self) -> String {
        env_override("KUBEJS_ADDONS_URL").unwrap_or_else(|| self.settings.addons_url.clone())
    }

    /// Resolve user agent: env KUBEJS_USER_AGENT > config.
    pub fn user_agent(&self) -> String {
        env_override("KUBEJS_USER_AGENT").unwrap_or_else(|| self.settings.user_agent.clone())
    }

    /// Resolve cache max age: env KUBEJS_DB_MAX_AGE_DAYS > config.
    pub fn db_max_age_days(&self) -> u64 {
        env_override("KUBEJS_DB_MAX_AGE_DAYS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(self.settings.db_max_age_days)
    }

    /// Resolve log level: env KUBEJS_LOG_LEVEL > config.
    pub fn log_level(&self) -> String {
        env_override("KUBEJS_LOG_LEVEL").unwrap_or_else(|| self.logging.level.clone())
    }
}

/// Load and parse an AppConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    if !config_path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: AppConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Like [`load_config`], but writes the defaults out when the file is missing.
/// Returns the config and whether a file was written.
pub fn load_or_init_config(config_path: &Path) -> Result<(AppConfig, bool)> {
    if config_path.exists() {
        return load_config(config_path).map(|config| (config, false));
    }

    let config = AppConfig::default();
    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = toml::to_string_pretty(&config).context("failed to serialize config TOML")?;
    fs::write(config_path, rendered)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok((config, true))
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_matches_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.paths.recipes_file, "recipes.json");
        assert_eq!(config.paths.addons_db_file, "addons_db.json");
        assert_eq!(config.paths.export_default, "export.js");
        assert_eq!(config.settings.db_max_age_days, 7);
        assert_eq!(config.settings.addons_url, "https://kubejs.com/wiki/addons");
        assert_eq!(config.settings.fetch_timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/kubejs-recipes.toml")).expect("load");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_or_init_writes_defaults_once() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("nested").join(CONFIG_FILENAME);

        let (config, wrote) = load_or_init_config(&config_path).expect("init");
        assert!(wrote);
        assert_eq!(config, AppConfig::default());
        assert!(config_path.exists());

        let (reloaded, wrote) = load_or_init_config(&config_path).expect("reload");
        assert!(!wrote);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
[paths]
recipes_file = "data/my_recipes.json"

[settings]
db_max_age_days = 3
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load");
        assert_eq!(config.paths.recipes_file, "data/my_recipes.json");
        assert_eq!(config.paths.addons_db_file, "addons_db.json");
        assert_eq!(config.settings.db_max_age_days, 3);
        assert_eq!(config.settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.logging, LoggingSection::default());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "[paths\nrecipes_file = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }
}
