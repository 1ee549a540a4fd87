use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{RecipeError, RecipeResult};
use crate::scanner::absolute_url;
use crate::store::write_pretty_json;

pub const DEFAULT_DB_MAX_AGE_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Addon {
    pub name: String,
    pub url: String,
}

impl Addon {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Where addon lists come from when the cache cannot answer.
pub trait AddonSource {
    fn fetch_addons(&self) -> RecipeResult<Vec<Addon>>;
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct AddonDatabase {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    addons: Vec<Addon>,
}

#[derive(Debug, Clone, Default)]
pub struct CachedAddons {
    pub addons: Vec<Addon>,
    pub timestamp: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddonListSource {
    Cache,
    Web,
    StaleCache,
    Fallback,
}

impl AddonListSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Web => "web",
            Self::StaleCache => "stale-cache",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub addons: Vec<Addon>,
    pub source: AddonListSource,
    pub warning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddonCache {
    path: PathBuf,
    max_age_days: u64,
    origin: String,
}

impl AddonCache {
    pub fn new(path: impl Into<PathBuf>, max_age_days: u64, origin: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_age_days,
            origin: origin.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_age_days(&self) -> u64 {
        self.max_age_days
    }

    /// Reads the database file. Absent, corrupt or unreadable files yield an empty list.
    pub fn load(&self) -> CachedAddons {
        if !self.path.exists() {
            info!("addons database {} not found", self.path.display());
            return CachedAddons::default();
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                error!(
                    "failed to read addons database {}: {error}",
                    self.path.display()
                );
                return CachedAddons::default();
            }
        };
        let database: AddonDatabase = match serde_json::from_str(&content) {
            Ok(database) => database,
            Err(error) => {
                let error = RecipeError::Parse {
                    path: self.path.clone(),
                    message: error.to_string(),
                };
                error!("{error}");
                return CachedAddons::default();
            }
        };

        let timestamp = database.timestamp.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                let error = RecipeError::Parse {
                    path: self.path.clone(),
                    message: format!("invalid timestamp '{raw}'"),
                };
                warn!("{error}");
            }
            parsed
        });
        info!("loaded {} addons from local database", database.addons.len());
        CachedAddons {
            addons: database.addons,
            timestamp,
        }
    }

    /// Replaces the database wholesale with `addons` stamped now.
    pub fn save(&self, addons: &[Addon]) -> RecipeResult<()> {
        let database = AddonDatabase {
            timestamp: Some(Local::now().to_rfc3339()),
            addons: addons.to_vec(),
        };
        write_pretty_json(&self.path, &database)
            .map_err(|source| RecipeError::persistence(&self.path, source))?;
        info!("saved {} addons to local database", addons.len());
        Ok(())
    }

    pub fn refresh(&self, source: &dyn AddonSource) -> RefreshOutcome {
        let cached = self.load();
        if !cached.addons.is_empty() && !is_stale(cached.timestamp, self.max_age_days) {
            info!("using addons from local database");
            return RefreshOutcome {
                addons: cached.addons,
                source: AddonListSource::Cache,
                warning: None,
            };
        }

        info!("fetching addons from the web");
        match self.fetch(source) {
            Ok(addons) if !addons.is_empty() => {
                if let Err(error) = self.save(&addons) {
                    warn!("{error}");
                }
                RefreshOutcome {
                    addons,
                    source: AddonListSource::Web,
                    warning: None,
                }
            }
            Ok(_) => self.fall_back(cached.addons, "web fetch produced no results".to_string()),
            Err(error) => {
                error!("{error}");
                self.fall_back(cached.addons, error.to_string())
            }
        }
    }

    /// Drops the database and refetches; failures reach the caller.
    pub fn force_refresh(&self, source: &dyn AddonSource) -> RecipeResult<Vec<Addon>> {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("deleted addons database {}", self.path.display()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(RecipeError::persistence(&self.path, error)),
        }

        let addons = self.fetch(source)?;
        if addons.is_empty() {
            return Err(RecipeError::Fetch("no addons found".to_string()));
        }
        self.save(&addons)?;
        Ok(addons)
    }

    fn fetch(&self, source: &dyn AddonSource) -> RecipeResult<Vec<Addon>> {
        let addons = source.fetch_addons()?;
        Ok(addons
            .into_iter()
            .map(|addon| Addon {
                url: absolute_url(&self.origin, &addon.url),
                name: addon.name,
            })
            .collect())
    }

    fn fall_back(&self, cached: Vec<Addon>, reason: String) -> RefreshOutcome {
        if !cached.is_empty() {
            warn!("{reason}; using older addons from local database");
            return RefreshOutcome {
                addons: cached,
                source: AddonListSource::StaleCache,
                warning: Some(format!("{reason}; using cached addons")),
            };
        }

        warn!("using built-in fallback addon list");
        let addons = builtin_fallback_addons();
        if let Err(error) = self.save(&addons) {
            warn!("{error}");
        }
        RefreshOutcome {
            addons,
            source: AddonListSource::Fallback,
            warning: Some(format!("{reason}; using fallback data")),
        }
    }
}

pub fn is_stale(timestamp: Option<DateTime<Local>>, max_age_days: u64) -> bool {
    is_stale_at(timestamp, max_age_days, Local::now())
}

pub fn is_stale_at(
    timestamp: Option<DateTime<Local>>,
    max_age_days: u64,
    now: DateTime<Local>,
) -> bool {
    let Some(timestamp) = timestamp else {
        return true;
    };
    let max_age = i64::try_from(max_age_days)
        .ok()
        .and_then(TimeDelta::try_days)
        .unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(timestamp) > max_age
}

/// Accepts RFC 3339 and naive ISO-8601 local timestamps.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

pub fn builtin_fallback_addons() -> Vec<Addon> {
    [
        ("KubeJS Create", "kubejs-create"),
        ("KubeJS Mekanism", "kubejs-mekanism"),
        ("KubeJS Immersive Engineering", "kubejs-immersive-engineering"),
        ("KubeJS Thermal", "kubejs-thermal"),
        ("KubeJS Blood Magic", "kubejs-blood-magic"),
    ]
    .into_iter()
    .map(|(name, slug)| Addon::new(name, format!("https://kubejs.com/wiki/addons/{slug}")))
    .collect()
}
