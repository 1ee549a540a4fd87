//! Logging setup.
//!
//! Everything goes to the configured log file. Warnings and errors are also
//! mirrored to stderr; stdout belongs to the menu text and the IPC protocol.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{AppConfig, DEFAULT_LOG_FILE, DEFAULT_LOG_LEVEL};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Normalised level (trace, debug, info, warn, error, off).
    pub level: String,
    pub file: PathBuf,
}

impl LogConfig {
    pub fn new(level: &str, file: impl Into<PathBuf>) -> Self {
        Self {
            level: Self::parse_level(level),
            file: file.into(),
        }
    }

    pub fn from_config(config: &AppConfig, log_file: &Path) -> Self {
        Self::new(&config.log_level(), log_file)
    }

    #[must_use]
    pub fn parse_level(value: &str) -> String {
        match value.trim().to_lowercase().as_str() {
            "trace" => "trace".to_string(),
            "debug" => "debug".to_string(),
            "info" => "info".to_string(),
            "warn" | "warning" => "warn".to_string(),
            "error" | "critical" => "error".to_string(),
            "off" | "none" | "disabled" => "off".to_string(),
            _ => DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.level != "off"
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_LEVEL, DEFAULT_LOG_FILE)
    }
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init(config: &LogConfig) -> Result<()> {
    if !config.enabled() {
        return Ok(());
    }

    let directory = config
        .file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = config
        .file
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
    fs::create_dir_all(&directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let file_appender = tracing_appender::rolling::never(&directory, file_name);

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr.with_max_level(Level::WARN))
        .with_target(false);

    if tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_err()
    {
        return Ok(());
    }

    tracing::info!("logging configured");
    tracing::info!("log file: {}", config.file.display());
    tracing::info!("log level: {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_normalises_names() {
        assert_eq!(LogConfig::parse_level("DEBUG"), "debug");
        assert_eq!(LogConfig::parse_level("warning"), "warn");
        assert_eq!(LogConfig::parse_level("CRITICAL"), "error");
        assert_eq!(LogConfig::parse_level("none"), "off");
        assert_eq!(LogConfig::parse_level("loud"), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn off_level_disables_logging() {
        let config = LogConfig::new("off", "ignored.log");
        assert!(!config.enabled());
        init(&config).expect("noop");
    }

    #[test]
    fn default_points_at_default_file() {
        let config = LogConfig::default();
        assert_eq!(config.file, PathBuf::from(DEFAULT_LOG_FILE));
        assert!(config.enabled());
    }
}
