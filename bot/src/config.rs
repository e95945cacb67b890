use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::maintenance::{DEFAULT_ANNOUNCEMENT, DEFAULT_CHANNEL_NAME};
use crate::platform::discord::DEFAULT_API_BASE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level bot configuration, loaded from guildkeeper.toml.
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct BotConfig {
    pub bot: BotSection,
    pub storage: StorageSection,
    pub maintenance: MaintenanceSection,
    pub logging: LoggingSection,
    /// File the values were read from; `None` when defaults were used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct BotSection {
    /// Bot token for the REST API. Not needed for offline or dry-run use.
    pub token: Option<String>,
    pub api_base_url: String,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: DEFAULT_API_BASE.into(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct StorageSection {
    pub backup_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("backups"),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct MaintenanceSection {
    pub channel_name: String,
    pub announcement: String,
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.into(),
            announcement: DEFAULT_ANNOUNCEMENT.into(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` filter directive used when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl BotConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    ///
    /// Runs before logging is set up, so nothing is logged here; check
    /// `source` afterwards.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path.as_ref())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(path, &contents)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("DISCORD_TOKEN").filter(|v| !v.is_empty()) {
            self.bot.token = Some(v);
        }
        if let Some(v) = var("API_BASE_URL") {
            self.bot.api_base_url = v;
        }
        if let Some(v) = var("BACKUP_DIR") {
            self.storage.backup_dir = PathBuf::from(v);
        }
        if let Some(v) = var("MAINTENANCE_CHANNEL_NAME") {
            self.maintenance.channel_name = v;
        }
        if let Some(v) = var("LOG_FILTER") {
            self.logging.filter = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.bot.token, None);
        assert_eq!(config.bot.api_base_url, DEFAULT_API_BASE);
        assert_eq!(config.storage.backup_dir, PathBuf::from("backups"));
        assert_eq!(config.maintenance.channel_name, "🔧-maintenance");
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = BotConfig::parse(
            Path::new("guildkeeper.toml"),
            "[storage]\nbackup_dir = \"/var/lib/guildkeeper\"\n\n[maintenance]\nannouncement = \"Back soon\"\n",
        )
        .unwrap();
        assert_eq!(config.storage.backup_dir, PathBuf::from("/var/lib/guildkeeper"));
        assert_eq!(config.maintenance.announcement, "Back soon");
        assert_eq!(config.maintenance.channel_name, DEFAULT_CHANNEL_NAME);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let err = BotConfig::parse(Path::new("bad.toml"), "[storage\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.storage.backup_dir, PathBuf::from("backups"));
        assert_eq!(config.source, None);
    }

    #[test]
    fn test_existing_file_is_recorded_as_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guildkeeper.toml");
        std::fs::write(&path, "[logging]\nfilter = \"debug\"\n").unwrap();

        let config = BotConfig::from_file(&path).unwrap();

        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DISCORD_TOKEN", "abc"),
            ("BACKUP_DIR", "/tmp/b"),
            ("MAINTENANCE_CHANNEL_NAME", "closed"),
            ("LOG_FILTER", "guildkeeper_bot=debug"),
        ]
        .into();
        let mut config = BotConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.bot.token.as_deref(), Some("abc"));
        assert_eq!(config.storage.backup_dir, PathBuf::from("/tmp/b"));
        assert_eq!(config.maintenance.channel_name, "closed");
        assert_eq!(config.logging.filter, "guildkeeper_bot=debug");
        assert_eq!(config.bot.api_base_url, DEFAULT_API_BASE);
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let mut config = BotConfig::default();
        config.apply_overrides(|k| (k == "DISCORD_TOKEN").then(String::new));
        assert_eq!(config.bot.token, None);
    }
}
