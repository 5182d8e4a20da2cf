//! Data source gateway
//!
//! Polls the primary lobby feed and falls back to the secondary feed on
//! empty, stale, or failed results. The gateway owns the process-wide data
//! source state and announces state flips to the operator exactly once per
//! transition.

pub mod providers;
pub mod replays;

pub use providers::{LobbyProvider, PrimaryLobbyProvider, SecondaryLobbyProvider};
pub use replays::{HttpReplayFeed, ReplayFeed};

use crate::types::{DataSource, Lobby};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Result of a gateway poll
#[derive(Debug, Clone)]
pub struct GatewayPoll {
    pub lobbies: Vec<Lobby>,
    pub data_source: DataSource,
}

/// Receives data-source state flip announcements (operator channel)
#[async_trait]
pub trait SourceAnnouncer: Send + Sync {
    async fn announce_source(&self, source: DataSource);
}

/// Staleness and failover tuning.
///
/// The two staleness thresholds are deliberately provider-specific: the
/// secondary feed is known to go stale on a different rhythm.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub primary_staleness: Duration,
    pub secondary_staleness: Duration,
    /// Consecutive failed/empty secondary polls before flipping to `none`
    pub secondary_failure_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            primary_staleness: Duration::minutes(5),
            secondary_staleness: Duration::minutes(10),
            secondary_failure_limit: 5,
        }
    }
}

#[derive(Debug)]
struct GatewayState {
    source: DataSource,
    secondary_failures: u32,
}

/// Failover gateway over the primary and secondary lobby feeds
pub struct LobbyGateway {
    primary: Arc<dyn LobbyProvider>,
    secondary: Arc<dyn LobbyProvider>,
    announcer: Arc<dyn SourceAnnouncer>,
    config: GatewayConfig,
    state: Mutex<GatewayState>,
}

impl LobbyGateway {
    pub fn new(
        primary: Arc<dyn LobbyProvider>,
        secondary: Arc<dyn LobbyProvider>,
        announcer: Arc<dyn SourceAnnouncer>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            announcer,
            config,
            state: Mutex::new(GatewayState {
                source: DataSource::Init,
                secondary_failures: 0,
            }),
        }
    }

    /// Current data source state
    pub fn data_source(&self) -> DataSource {
        self.state
            .lock()
            .map(|s| s.source)
            .unwrap_or(DataSource::None)
    }

    /// Poll for lobbies, preferring the primary feed. Returns an empty list
    /// (and the current source state) when neither feed yields usable data.
    pub async fn poll(&self, now: DateTime<Utc>) -> GatewayPoll {
        match self.primary.fetch().await {
            Ok(lobbies)
                if !lobbies.is_empty() && !is_stale(&lobbies, now, self.config.primary_staleness) =>
            {
                self.reset_secondary_failures();
                let data_source = self.ensure_source(DataSource::Primary).await;
                return GatewayPoll {
                    lobbies,
                    data_source,
                };
            }
            Ok(lobbies) => {
                if lobbies.is_empty() {
                    warn!(provider = self.primary.name(), "Feed returned no lobbies");
                } else {
                    warn!(provider = self.primary.name(), "Feed data is stale");
                }
            }
            Err(e) => error!(provider = self.primary.name(), error = %e, "Feed poll failed"),
        }

        match self.secondary.fetch().await {
            Ok(lobbies)
                if !lobbies.is_empty()
                    && !is_stale(&lobbies, now, self.config.secondary_staleness) =>
            {
                self.reset_secondary_failures();
                let data_source = self.ensure_source(DataSource::Secondary).await;
                GatewayPoll {
                    lobbies,
                    data_source,
                }
            }
            result => {
                match result {
                    Ok(_) => warn!(
                        provider = self.secondary.name(),
                        "Feed returned no usable lobbies"
                    ),
                    Err(e) => {
                        error!(provider = self.secondary.name(), error = %e, "Feed poll failed")
                    }
                }
                let data_source = self.record_secondary_failure().await;
                GatewayPoll {
                    lobbies: Vec::new(),
                    data_source,
                }
            }
        }
    }

    fn reset_secondary_failures(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.secondary_failures = 0;
        }
    }

    /// Count a failed secondary poll; past the limit the source flips to none
    async fn record_secondary_failure(&self) -> DataSource {
        let (flip, current) = {
            let Ok(mut state) = self.state.lock() else {
                return DataSource::None;
            };
            state.secondary_failures += 1;
            (
                state.secondary_failures > self.config.secondary_failure_limit,
                state.source,
            )
        };
        if flip {
            self.ensure_source(DataSource::None).await
        } else {
            current
        }
    }

    /// Transition the data source state, announcing only actual changes
    async fn ensure_source(&self, source: DataSource) -> DataSource {
        let changed = {
            let Ok(mut state) = self.state.lock() else {
                return source;
            };
            if state.source == source {
                false
            } else {
                state.source = source;
                true
            }
        };
        if changed {
            info!(%source, "Lobby feed data source changed");
            self.announcer.announce_source(source).await;
        }
        source
    }
}

/// A snapshot is stale when its most recent `created` timestamp is older
/// than the staleness window. Snapshots without any timestamps cannot be
/// judged and are treated as fresh.
fn is_stale(lobbies: &[Lobby], now: DateTime<Utc>, staleness: Duration) -> bool {
    let newest = lobbies.iter().filter_map(|l| l.created).max();
    match newest.and_then(|secs| Utc.timestamp_opt(secs, 0).single()) {
        Some(created) => now - created > staleness,
        None => false,
    }
}
