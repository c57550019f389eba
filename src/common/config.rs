//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment < CLI

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const MAX_SEARCH_RESULTS: usize = 100;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "windlass")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("windlass.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Sandbox root; every user-visible path resolves beneath it.
    pub root: PathBuf,
    /// Deadline for the metadata wait, in seconds.
    pub metadata_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/downloads"),
            metadata_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub feed_url: String,
    pub results_limit: usize,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            feed_url: "https://nyaa.si".to_string(),
            results_limit: 20,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    pub url: String,
    /// Empty token disables the media-library client.
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:32400".to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub downloads: DownloadConfig,
    pub search: SearchSettings,
    pub library: LibrarySettings,
}

impl AppConfig {
    /// Rejects unusable values before anything is wired up.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.downloads.root.as_os_str().is_empty(),
            "Invalid config: downloads.root must not be empty"
        );
        ensure!(
            self.downloads.metadata_timeout_secs > 0,
            "Invalid config: downloads.metadata_timeout_secs must be > 0"
        );
        ensure!(
            !self.search.feed_url.is_empty(),
            "Invalid config: search.feed_url must not be empty"
        );
        ensure!(
            self.search.results_limit >= 1,
            "Invalid config: search.results_limit must be >= 1"
        );
        ensure!(
            self.search.results_limit <= MAX_SEARCH_RESULTS,
            "Invalid config: search.results_limit must be <= {MAX_SEARCH_RESULTS}"
        );
        ensure!(
            self.search.timeout_secs > 0,
            "Invalid config: search.timeout_secs must be > 0"
        );
        ensure!(
            self.library.timeout_secs > 0,
            "Invalid config: library.timeout_secs must be > 0"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub root: Option<PathBuf>,
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path();

    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("WINDLASS_").split("__"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> AppConfig {
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(root) = &overrides.root {
        config.downloads.root = root.clone();
    }
    config
}
