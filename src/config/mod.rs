//! Application configuration, persisted as TOML under `~/.skilltracker`.

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host the API server binds to.
    pub host: String,
    /// Port the API server listens on.
    pub port: u16,
    /// Username granted access to the admin endpoints.
    pub admin_username: String,
    /// Session lifetime in days.
    pub session_ttl_days: i64,

    #[serde(skip)]
    pub config_path: PathBuf,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            admin_username: "admin".to_string(),
            session_ttl_days: 30,
            config_path: PathBuf::new(),
            data_dir: PathBuf::new(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let tracker_dir = home.join(".skilltracker");
        let config_path = tracker_dir.join("config.toml");

        if !tracker_dir.exists() {
            fs::create_dir_all(&tracker_dir).context("Failed to create .skilltracker directory")?;
            fs::create_dir_all(tracker_dir.join("data"))
                .context("Failed to create data directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.data_dir = tracker_dir.join("data");
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path: config_path.clone(),
                data_dir: tracker_dir.join("data"),
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Build a config rooted at an explicit data directory. Used by tests and
    /// embedders that manage their own paths.
    pub fn for_data_dir(dir: &Path) -> Self {
        Self {
            config_path: dir.join("config.toml"),
            data_dir: dir.to_path_buf(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.admin_username.trim().is_empty(),
            "admin_username must not be empty"
        );
        anyhow::ensure!(
            self.session_ttl_days > 0,
            "session_ttl_days must be positive"
        );
        Ok(())
    }
}
