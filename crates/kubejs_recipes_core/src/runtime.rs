use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{AppConfig, CONFIG_FILENAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

/// Project root and config location, known before the config is read.
#[derive(Debug, Clone)]
pub struct RuntimeRoot {
    pub project_root: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
}

/// Every file the application touches, resolved against the project root.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub config_path: PathBuf,
    pub recipes_file: PathBuf,
    pub addons_db_file: PathBuf,
    pub export_default: PathBuf,
    pub log_file: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
}

impl RuntimeRoot {
    pub fn resolve(&self, config: &AppConfig) -> ResolvedPaths {
        let root = &self.project_root;
        ResolvedPaths {
            project_root: root.clone(),
            config_path: self.config_path.clone(),
            recipes_file: absolutize(Path::new(&config.paths.recipes_file), root),
            addons_db_file: absolutize(Path::new(&config.paths.addons_db_file), root),
            export_default: absolutize(Path::new(&config.paths.export_default), root),
            log_file: absolutize(Path::new(&config.logging.file), root),
            root_source: self.root_source,
            config_source: self.config_source,
        }
    }
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\nconfig_path={} ({})\nrecipes_file={}\naddons_db_file={}\nexport_default={}\nlog_file={}",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
            normalize_for_display(&self.recipes_file),
            normalize_for_display(&self.addons_db_file),
            normalize_for_display(&self.export_default),
            normalize_for_display(&self.log_file),
        )
    }
}

pub fn resolve_root(context: &ResolutionContext, overrides: &PathOverrides) -> RuntimeRoot {
    resolve_root_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_root_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> RuntimeRoot
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = if let Some(path) = overrides.project_root.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = lookup_env("KUBEJS_PROJECT_ROOT").filter(|v| !v.trim().is_empty())
    {
        (
            absolutize(Path::new(value.trim()), &context.cwd),
            ValueSource::Env,
        )
    } else {
        (context.cwd.clone(), ValueSource::Default)
    };

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some(value) = lookup_env("KUBEJS_CONFIG").filter(|v| !v.trim().is_empty()) {
        (
            absolutize(Path::new(value.trim()), &project_root),
            ValueSource::Env,
        )
    } else {
        (project_root.join(CONFIG_FILENAME), ValueSource::Default)
    };

    RuntimeRoot {
        project_root,
        config_path,
        root_source,
        config_source,
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
