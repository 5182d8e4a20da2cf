//! Main application configuration
//!
//! Defines the primary configuration structures for the lobby-herald
//! service, including TOML file loading, environment variable overrides,
//! and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub chat: ChatSettings,
    pub feeds: FeedSettings,
    pub reconciler: ReconcilerSettings,
    pub throttle: ThrottleSettings,
    pub scheduler: SchedulerSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Chat platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Bot token for the chat platform
    pub token: String,
    /// Chat platform REST API base URL
    pub api_url: String,
    /// Reserved destination for status/error announcements
    pub operator_channel_id: String,
}

/// Lobby and replay feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub primary_url: String,
    pub secondary_url: String,
    /// Replay feed base URL; also used to build replay links
    pub replay_url: String,
    /// Primary snapshots older than this are treated as stale
    pub primary_staleness_seconds: u64,
    /// Secondary snapshots older than this are treated as stale
    pub secondary_staleness_seconds: u64,
    /// Consecutive failed secondary polls before the source flips to none
    pub secondary_failure_limit: u32,
}

/// Lobby lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    /// Grace period after a lobby vanishes before it is declared dead
    pub grace_period_seconds: u64,
    /// Replay correlation window for dead lobbies with tracked messages
    pub replay_retention_seconds: u64,
}

/// Per-channel rate limiting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub bucket_capacity: u32,
    pub refill_per_cycle: u32,
    pub idle_eviction_seconds: u64,
}

/// Cycle scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Reconciliation triggers per minute (1..=60)
    pub updates_per_minute: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "lobby-herald".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://discord.com/api/v10".to_string(),
            operator_channel_id: String::new(),
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            primary_url: "https://api.wc3stats.com/gamelist".to_string(),
            secondary_url: "https://wc3maps.com/api/lobbies".to_string(),
            replay_url: "https://api.wc3stats.com/replays".to_string(),
            primary_staleness_seconds: 300,
            secondary_staleness_seconds: 600,
            secondary_failure_limit: 5,
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            grace_period_seconds: 300,        // 5 minutes
            replay_retention_seconds: 86_400, // 24 hours
        }
    }
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            bucket_capacity: 10,
            refill_per_cycle: 2,
            idle_eviction_seconds: 1_800, // 30 minutes
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            updates_per_minute: 6,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.service.log_level = level;
        }
        if let Ok(token) = env::var("CHAT_TOKEN") {
            config.chat.token = token;
        }
        if let Ok(url) = env::var("CHAT_API_URL") {
            config.chat.api_url = url;
        }
        if let Ok(channel) = env::var("OPERATOR_CHANNEL_ID") {
            config.chat.operator_channel_id = channel;
        }
        if let Ok(url) = env::var("PRIMARY_FEED_URL") {
            config.feeds.primary_url = url;
        }
        if let Ok(url) = env::var("SECONDARY_FEED_URL") {
            config.feeds.secondary_url = url;
        }
        if let Ok(url) = env::var("REPLAY_FEED_URL") {
            config.feeds.replay_url = url;
        }
        if let Ok(value) = env::var("UPDATES_PER_MINUTE") {
            config.scheduler.updates_per_minute = value
                .parse()
                .context("UPDATES_PER_MINUTE must be an integer")?;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Validate a loaded configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.chat.token.is_empty() {
        return Err(anyhow!("chat token must be set"));
    }
    if config.chat.operator_channel_id.is_empty() {
        return Err(anyhow!("operator channel id must be set"));
    }
    if config.feeds.primary_url.is_empty() || config.feeds.secondary_url.is_empty() {
        return Err(anyhow!("feed URLs must be set"));
    }
    if !(1..=60).contains(&config.scheduler.updates_per_minute) {
        return Err(anyhow!("updates_per_minute must be between 1 and 60"));
    }
    if config.throttle.bucket_capacity == 0 {
        return Err(anyhow!("throttle bucket capacity must be greater than 0"));
    }
    if config.throttle.refill_per_cycle > config.throttle.bucket_capacity {
        return Err(anyhow!(
            "throttle refill per cycle cannot exceed bucket capacity"
        ));
    }
    if config.reconciler.grace_period_seconds == 0 {
        return Err(anyhow!("grace period must be greater than 0"));
    }
    Ok(())
}
