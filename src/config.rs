//! Configuration loading and management.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Transport endpoint and identity.
    pub network: NetworkConfig,
    /// Protocol tuning.
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Coordinated sites, one channel each. The first entry is the primary
    /// channel whose join confirmation gates the session.
    pub sites: Vec<SiteConfig>,
    /// Trusted-bot classification masks.
    #[serde(default)]
    pub trust: TrustConfig,
}

/// Transport endpoint and identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Server to connect to, `host:port`.
    pub server: String,
    /// Nickname on the coordination network.
    pub nick: String,
    /// Ident (username) sent at registration.
    #[serde(default = "default_ident")]
    pub ident: String,
    /// Realname sent at registration.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Host token used when attributing our own announcements on the wire.
    #[serde(default = "default_host")]
    pub host: String,
}

/// Protocol tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Prefix that marks command lines.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Seconds to wait for the primary channel join before the single
    /// delayed re-request.
    #[serde(default = "default_rejoin_delay")]
    pub rejoin_delay_secs: u64,
    /// Per-queue cap on deferred judgements.
    #[serde(default = "default_queue_cap")]
    pub queue_cap: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            rejoin_delay_secs: default_rejoin_delay(),
            queue_cap: default_queue_cap(),
        }
    }
}

/// One coordinated site.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier (e.g. "enwiki").
    pub name: String,
    /// Channel carrying this site's traffic (e.g. "#vn-enwiki").
    pub channel: String,
    /// Script root used to build diff links (e.g. "https://en.wikipedia.org/w/").
    pub url: Option<String>,
}

/// Trusted-bot masks; either list matching makes a sender a bot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub bot_nicks: Vec<String>,
    #[serde(default)]
    pub bot_hosts: Vec<String>,
}

fn default_ident() -> String {
    "vandalnet".to_string()
}

fn default_realname() -> String {
    "vandalnet client".to_string()
}

fn default_host() -> String {
    "client.vandalnet".to_string()
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_rejoin_delay() -> u64 {
    20
}

fn default_queue_cap() -> usize {
    crate::cache::DEFAULT_QUEUE_CAP
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.nick.is_empty() {
            return Err(ConfigError::Invalid("network.nick must not be empty".into()));
        }
        if self.sites.is_empty() {
            return Err(ConfigError::Invalid("at least one [[sites]] entry required".into()));
        }
        for (i, site) in self.sites.iter().enumerate() {
            if site.name.is_empty() || site.channel.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "sites[{i}]: name and channel must not be empty"
                )));
            }
            for other in &self.sites[..i] {
                if other.name == site.name {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate site name {:?}",
                        site.name
                    )));
                }
                if other.channel == site.channel {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate channel {:?}",
                        site.channel
                    )));
                }
            }
        }
        if self.protocol.prefix.is_empty() {
            return Err(ConfigError::Invalid("protocol.prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Channel whose join confirmation gates the session.
    pub fn primary_channel(&self) -> &str {
        &self.sites[0].channel
    }
}
