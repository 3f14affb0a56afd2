//! TOML-based repository configuration.
//!
//! Loaded from `.relic/config.toml`. Every optional field has a serde
//! default so a partially filled file stays valid. Key/value access for the
//! `config get`/`config set` surface goes through [`ConfigKey`], a single
//! enumerated table mapping each key string to a typed accessor and
//! validator. There is no reflective field lookup anywhere.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Commit identity.
    #[serde(default)]
    pub user: UserConfig,

    /// Engine behaviour.
    #[serde(default)]
    pub core: CoreConfig,

    /// Default remote for merges.
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Commit identity. Either field may be absent here and supplied through
/// the environment instead (`RELIC_USER_NAME`, `RELIC_USER_EMAIL`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Engine behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Glob patterns excluded from staging and status scans.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Context lines around diff hunks (default 3).
    #[serde(default = "default_diff_context")]
    pub diff_context: usize,
}

fn default_diff_context() -> usize {
    3
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            diff_context: default_diff_context(),
        }
    }
}

/// Remote settings used by the merge coordinator's bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote name recorded in `sync_state` and conflict markers.
    #[serde(default = "default_remote_name")]
    pub name: String,

    /// Remote location, consumed by the (out-of-scope) transport layer.
    #[serde(default)]
    pub url: Option<String>,
}

fn default_remote_name() -> String {
    "origin".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            name: default_remote_name(),
            url: None,
        }
    }
}

impl RepoConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Serialize the configuration back to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "saved configuration");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Key table
// ---------------------------------------------------------------------------

/// Every key reachable through `config get`/`config set`, enumerated in one
/// place with its typed accessor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    UserName,
    UserEmail,
    CoreDiffContext,
    RemoteName,
    RemoteUrl,
}

impl ConfigKey {
    /// All known keys, for listing and help output.
    pub const ALL: &'static [ConfigKey] = &[
        Self::UserName,
        Self::UserEmail,
        Self::CoreDiffContext,
        Self::RemoteName,
        Self::RemoteUrl,
    ];

    /// The dotted key string.
    pub fn key(self) -> &'static str {
        match self {
            Self::UserName => "user.name",
            Self::UserEmail => "user.email",
            Self::CoreDiffContext => "core.diff_context",
            Self::RemoteName => "remote.name",
            Self::RemoteUrl => "remote.url",
        }
    }

    /// Parse a dotted key string.
    pub fn parse(key: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.key() == key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    /// Read the current value as a display string.
    pub fn get(self, config: &RepoConfig) -> Option<String> {
        match self {
            Self::UserName => config.user.name.clone(),
            Self::UserEmail => config.user.email.clone(),
            Self::CoreDiffContext => Some(config.core.diff_context.to_string()),
            Self::RemoteName => Some(config.remote.name.clone()),
            Self::RemoteUrl => config.remote.url.clone(),
        }
    }

    /// Validate and apply a new value.
    pub fn set(self, config: &mut RepoConfig, value: &str) -> Result<(), ConfigError> {
        let invalid = |detail: &str| ConfigError::InvalidValue {
            key: self.key().to_string(),
            detail: detail.to_string(),
        };
        match self {
            Self::UserName => {
                if value.trim().is_empty() {
                    return Err(invalid("name must not be empty"));
                }
                config.user.name = Some(value.to_string());
            }
            Self::UserEmail => {
                if !value.contains('@') {
                    return Err(invalid("email must contain '@'"));
                }
                config.user.email = Some(value.to_string());
            }
            Self::CoreDiffContext => {
                let context: usize = value
                    .parse()
                    .map_err(|_| invalid("expected a non-negative integer"))?;
                config.core.diff_context = context;
            }
            Self::RemoteName => {
                if value.trim().is_empty() {
                    return Err(invalid("remote name must not be empty"));
                }
                config.remote.name = value.to_string();
            }
            Self::RemoteUrl => {
                config.remote.url = Some(value.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepoConfig::default();
        assert_eq!(config.core.diff_context, 3);
        assert_eq!(config.remote.name, "origin");
        assert!(config.user.name.is_none());
    }

    #[test]
    fn test_load_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = RepoConfig::default();
        config.user.name = Some("Test User".into());
        config.core.ignore = vec!["*.tmp".into()];
        config.save(&path).unwrap();

        let loaded = RepoConfig::load(&path).unwrap();
        assert_eq!(loaded.user.name.as_deref(), Some("Test User"));
        assert_eq!(loaded.core.ignore, vec!["*.tmp".to_string()]);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[user]\nname = \"Partial\"\n").unwrap();

        let config = RepoConfig::load(&path).unwrap();
        assert_eq!(config.user.name.as_deref(), Some("Partial"));
        assert_eq!(config.core.diff_context, 3);
    }

    #[test]
    fn test_missing_file() {
        let err = RepoConfig::load("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_key_table_round_trip() {
        let mut config = RepoConfig::default();
        for key in ConfigKey::ALL {
            assert_eq!(ConfigKey::parse(key.key()).unwrap(), *key);
        }

        ConfigKey::parse("user.name")
            .unwrap()
            .set(&mut config, "Alice")
            .unwrap();
        assert_eq!(
            ConfigKey::UserName.get(&config).as_deref(),
            Some("Alice")
        );

        assert!(matches!(
            ConfigKey::parse("user.shoe_size"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_key_validation() {
        let mut config = RepoConfig::default();
        assert!(ConfigKey::UserEmail.set(&mut config, "not-an-email").is_err());
        assert!(ConfigKey::CoreDiffContext.set(&mut config, "lots").is_err());
        ConfigKey::CoreDiffContext.set(&mut config, "5").unwrap();
        assert_eq!(config.core.diff_context, 5);
    }
}
