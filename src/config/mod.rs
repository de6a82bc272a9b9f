use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use time::{Duration, UtcOffset};

use crate::timeline::Period;

pub mod locale;

pub use locale::Locale;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Careline";
const APP_NAME: &str = "careline";
const DEFAULT_USER: &str = "local";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("CARELINE_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("CARELINE_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("careline.db");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
        })
    }

    /// Lays every directory out under `root`. Used by tests and `--data-dir` style sandboxes.
    pub fn under(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            database_path: data_dir.join("careline.db"),
            data_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Account whose profiles are read and written. Authentication happens elsewhere.
    pub user_id: String,
    pub locale: Locale,
    /// Offset applied when rendering timestamps, in minutes east of UTC.
    pub utc_offset_minutes: i32,
    pub cooldown: CooldownConfig,
    pub timeline: TimelineOptions,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER.to_string(),
            locale: Locale::En,
            utc_offset_minutes: 0,
            cooldown: CooldownConfig::default(),
            timeline: TimelineOptions::default(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.user_id.trim().is_empty() {
            tracing::warn!("empty user_id in config, falling back to '{DEFAULT_USER}'");
            self.user_id = DEFAULT_USER.to_string();
        }
        let configured = self.user_id.clone();
        self.set_user(&configured)
            .context("validating user_id in config")?;
        if offset_from_minutes(self.utc_offset_minutes).is_none() {
            tracing::warn!(
                minutes = self.utc_offset_minutes,
                "utc offset out of range, falling back to UTC"
            );
            self.utc_offset_minutes = 0;
        }
        if self.cooldown.window_secs == 0 {
            tracing::warn!("cooldown window of 0s disables rate limiting");
        }
        Ok(())
    }

    /// Switches the acting user. The id becomes the top path segment of every
    /// stored document, so it may not contain `/`.
    pub fn set_user(&mut self, user_id: &str) -> Result<()> {
        let trimmed = user_id.trim();
        ensure!(!trimmed.is_empty(), "user id cannot be empty");
        ensure!(
            !trimmed.contains('/'),
            "user id '{trimmed}' must not contain '/'"
        );
        self.user_id = trimmed.to_string();
        Ok(())
    }

    pub fn utc_offset(&self) -> UtcOffset {
        offset_from_minutes(self.utc_offset_minutes).unwrap_or(UtcOffset::UTC)
    }
}

fn offset_from_minutes(minutes: i32) -> Option<UtcOffset> {
    minutes
        .checked_mul(60)
        .and_then(|secs| UtcOffset::from_whole_seconds(secs).ok())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub window_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self { window_secs: 60 }
    }
}

impl CooldownConfig {
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineOptions {
    pub default_period: Period,
    pub order: SortDirection,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            default_period: Period::All,
            order: SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Ascending
    }
}
