//! Process-wide configuration
//!
//! Read once at startup. Values come from an optional YAML file named by
//! `OSFBOT_CONFIG`, then from the environment, with the environment taking
//! precedence. A `.env` file in the working directory is loaded first unless
//! `ENVIRONMENT` is set.

use std::fmt::{Debug, Formatter};

use poise::serenity_prelude::{ChannelId, GuildId, RoleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = ">";
pub const DEFAULT_VALIDATION_BASE_URL: &str = "https://osf-database-api.shuttleapp.rs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set. Make sure you have configured it in .env")]
    Missing(&'static str),

    #[error("{key} is not a valid ID: {value:?}")]
    InvalidId { key: &'static str, value: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Optional file layer. Every key may be omitted.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bot_token: Option<String>,
    pub bot_prefix: Option<String>,
    pub test_guilds: Option<Vec<u64>>,
    pub channel_log: Option<u64>,
    pub channel_devlog: Option<u64>,
    pub channel_dmlog: Option<u64>,
    pub role_moderator: Option<u64>,
    pub role_osf_member: Option<u64>,
    pub validation_base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channels {
    pub log: ChannelId,
    pub dev_log: ChannelId,
    pub dm_log: ChannelId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    pub moderator: RoleId,
    pub osf_member: RoleId,
}

#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub prefix: String,
    pub test_guilds: Vec<GuildId>,
    pub channels: Channels,
    pub roles: Roles,
    pub validation_base_url: String,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("prefix", &self.prefix)
            .field("test_guilds", &self.test_guilds)
            .field("channels", &self.channels)
            .field("roles", &self.roles)
            .field("validation_base_url", &self.validation_base_url)
            .finish()
    }
}

impl Config {
    /// Load configuration from `.env`, the optional YAML file and the environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required value is missing, an ID does not
    /// parse, or the YAML file cannot be read.
    pub fn load() -> Result<Self, ConfigError> {
        if std::env::var_os("ENVIRONMENT").is_none() {
            // A missing .env is fine, the variables may already be exported.
            let _ = dotenvy::dotenv();
        }

        let file = match std::env::var("OSFBOT_CONFIG") {
            Ok(path) => FileConfig::read(&path)?,
            Err(_) => FileConfig::default(),
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge a file layer with a key lookup (the environment in production)
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required value is missing or an ID is invalid.
    pub fn from_sources(
        file: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token = lookup("BOT_TOKEN")
            .or(file.bot_token)
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let prefix = lookup("BOT_PREFIX")
            .or(file.bot_prefix)
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let test_guilds = match lookup("TEST_GUILDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| parse_id("TEST_GUILDS", part))
                .collect::<Result<Vec<_>, _>>()?,
            None => file.test_guilds.unwrap_or_default(),
        };
        let test_guilds = test_guilds
            .into_iter()
            .map(|id| non_zero("TEST_GUILDS", id).map(GuildId::new))
            .collect::<Result<Vec<_>, _>>()?;

        let id = |key: &'static str, fallback: Option<u64>| -> Result<u64, ConfigError> {
            let value = match lookup(key) {
                Some(raw) => parse_id(key, raw.trim())?,
                None => fallback.ok_or(ConfigError::Missing(key))?,
            };
            non_zero(key, value)
        };

        let channels = Channels {
            log: ChannelId::new(id("CHANNEL_LOG", file.channel_log)?),
            dev_log: ChannelId::new(id("CHANNEL_DEVLOG", file.channel_devlog)?),
            dm_log: ChannelId::new(id("CHANNEL_DMLOG", file.channel_dmlog)?),
        };
        let roles = Roles {
            moderator: RoleId::new(id("ROLE_MODERATOR", file.role_moderator)?),
            osf_member: RoleId::new(id("ROLE_OSF_MEMBER", file.role_osf_member)?),
        };

        let validation_base_url = lookup("VALIDATION_BASE_URL")
            .or(file.validation_base_url)
            .unwrap_or_else(|| DEFAULT_VALIDATION_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            token,
            prefix,
            test_guilds,
            channels,
            roles,
            validation_base_url,
        })
    }
}

#[cfg(test)]
impl Config {
    /// A complete configuration with small fixed IDs
    pub(crate) fn test() -> Self {
        Self {
            token: "token".to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            test_guilds: Vec::new(),
            channels: Channels {
                log: ChannelId::new(100),
                dev_log: ChannelId::new(101),
                dm_log: ChannelId::new(102),
            },
            roles: Roles {
                moderator: RoleId::new(200),
                osf_member: RoleId::new(201),
            },
            validation_base_url: DEFAULT_VALIDATION_BASE_URL.to_string(),
        }
    }
}

impl FileConfig {
    /// Read the YAML layer from disk
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed.
    pub fn read(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &str, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })
    }
}

fn parse_id(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidId {
        key,
        value: raw.to_string(),
    })
}

// Discord snowflakes are never zero, and the id constructors panic on it.
fn non_zero(key: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidId {
            key,
            value: value.to_string(),
        })
    } else {
        Ok(value)
    }
}
