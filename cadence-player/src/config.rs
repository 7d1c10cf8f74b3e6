//! Configuration loading
//!
//! Settings come from, in priority order: environment variables, an explicit
//! TOML file (or the platform config file when none is given), then compiled
//! defaults. The embedding process passes the resulting [`Config`] to
//! [`crate::Coordinator`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file path.
    pub database_path: PathBuf,

    /// Credentials for the external catalog service, handed to whichever
    /// `TrackResolver` implementation the embedder wires in.
    pub catalog_client_id: Option<String>,
    pub catalog_client_secret: Option<String>,

    /// Seconds of idleness before a session is disconnected.
    pub inactivity_timeout_secs: u64,

    /// Period of the background inactivity ticker.
    pub inactivity_poll_secs: u64,

    /// Finished-track history capacity per tenant (oldest evicted).
    pub history_capacity: usize,

    /// Volume used for tenants with no persisted setting (percent).
    pub default_volume: u16,

    /// Event broadcast channel capacity.
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cadence.db"),
            catalog_client_id: None,
            catalog_client_secret: None,
            inactivity_timeout_secs: 120,
            inactivity_poll_secs: 30,
            history_capacity: 20,
            default_volume: 50,
            event_capacity: 100,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Priority order:
    /// 1. Environment variables (`CADENCE_*`)
    /// 2. Explicit TOML file, or the platform config file when `path` is None
    /// 3. Compiled defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_file() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CADENCE_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CADENCE_CATALOG_CLIENT_ID") {
            self.catalog_client_id = Some(v);
        }
        if let Ok(v) = std::env::var("CADENCE_CATALOG_CLIENT_SECRET") {
            self.catalog_client_secret = Some(v);
        }
        if let Ok(v) = std::env::var("CADENCE_INACTIVITY_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.inactivity_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_INACTIVITY_POLL_SECS") {
            if let Ok(secs) = v.parse() {
                self.inactivity_poll_secs = secs;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.inactivity_poll_secs == 0 {
            return Err(Error::Config(
                "inactivity_poll_secs must be greater than zero".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(Error::Config(
                "history_capacity must be greater than zero".into(),
            ));
        }
        if self.default_volume > 200 {
            return Err(Error::Config("default_volume must be at most 200".into()));
        }
        Ok(())
    }
}

/// Platform config file path (`~/.config/cadence/config.toml` on Linux).
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cadence").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.inactivity_timeout_secs, 120);
        assert_eq!(config.inactivity_poll_secs, 30);
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.default_volume, 50);
        assert!(config.catalog_client_id.is_none());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            database_path = "/var/lib/cadence/cadence.db"
            inactivity_timeout_secs = 300
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.database_path,
            PathBuf::from("/var/lib/cadence/cadence.db")
        );
        assert_eq!(parsed.inactivity_timeout_secs, 300);
        // Untouched keys keep defaults.
        assert_eq!(parsed.default_volume, 50);
    }

    #[test]
    #[serial]
    fn env_overrides_file_values() {
        std::env::set_var("CADENCE_DATABASE_PATH", "/tmp/override.db");
        std::env::set_var("CADENCE_INACTIVITY_TIMEOUT_SECS", "60");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.database_path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.inactivity_timeout_secs, 60);

        std::env::remove_var("CADENCE_DATABASE_PATH");
        std::env::remove_var("CADENCE_INACTIVITY_TIMEOUT_SECS");
    }

    #[test]
    fn rejects_zero_poll_period() {
        let config = Config {
            inactivity_poll_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
