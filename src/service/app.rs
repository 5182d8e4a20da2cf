//! Main application state and service coordination
//!
//! Builds all components from configuration and owns the scheduler's
//! lifecycle. The explicit wiring here replaces any ambient globals: the
//! gateway owns the data-source state, the rate limiter owns the throttle
//! table, and both are injected where needed.

use crate::chat::{ChatClient, DiscordClient};
use crate::config::{validate_config, AppConfig};
use crate::correlator::ReplayCorrelator;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::feeds::{
    GatewayConfig, HttpReplayFeed, LobbyGateway, PrimaryLobbyProvider, SecondaryLobbyProvider,
    SourceAnnouncer,
};
use crate::reconciler::{Reconciler, ReconcilerConfig};
use crate::scheduler::Scheduler;
use crate::store::{AlertStore, LobbyStore, MemoryStore, MetaStore};
use crate::throttle::{RateLimiter, ThrottleConfig};
use crate::types::CycleStats;
use crate::utils::current_timestamp;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Fully wired application state
pub struct AppState {
    config: AppConfig,
    store: Arc<MemoryStore>,
    reconciler: Arc<Reconciler>,
    scheduler: Arc<Scheduler>,
    shutdown: watch::Sender<bool>,
    scheduler_handle: Option<JoinHandle<()>>,
}

impl AppState {
    /// Build all components from configuration
    pub async fn new(config: AppConfig) -> Result<Self> {
        validate_config(&config)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let store = Arc::new(MemoryStore::new());
        let alerts: Arc<dyn AlertStore> = store.clone();
        let lobbies: Arc<dyn LobbyStore> = store.clone();
        let meta: Arc<dyn MetaStore> = store.clone();

        let chat: Arc<dyn ChatClient> = Arc::new(DiscordClient::with_api_url(
            http.clone(),
            &config.chat.token,
            &config.chat.api_url,
        ));

        let limiter = Arc::new(RateLimiter::new(ThrottleConfig {
            capacity: config.throttle.bucket_capacity,
            refill_per_cycle: config.throttle.refill_per_cycle,
            idle_eviction: ChronoDuration::seconds(config.throttle.idle_eviction_seconds as i64),
        }));

        let dispatcher = Arc::new(Dispatcher::new(
            chat,
            alerts.clone(),
            limiter.clone(),
            &config.chat.operator_channel_id,
            &config.feeds.replay_url,
        ));

        let gateway = Arc::new(LobbyGateway::new(
            Arc::new(PrimaryLobbyProvider::new(
                http.clone(),
                &config.feeds.primary_url,
            )),
            Arc::new(SecondaryLobbyProvider::new(
                http.clone(),
                &config.feeds.secondary_url,
            )),
            dispatcher.clone() as Arc<dyn SourceAnnouncer>,
            GatewayConfig {
                primary_staleness: ChronoDuration::seconds(
                    config.feeds.primary_staleness_seconds as i64,
                ),
                secondary_staleness: ChronoDuration::seconds(
                    config.feeds.secondary_staleness_seconds as i64,
                ),
                secondary_failure_limit: config.feeds.secondary_failure_limit,
            },
        ));

        let correlator = Arc::new(ReplayCorrelator::new(
            Arc::new(HttpReplayFeed::new(http, &config.feeds.replay_url)),
            meta,
        ));

        let reconciler = Arc::new(Reconciler::new(
            gateway,
            lobbies,
            alerts,
            correlator,
            dispatcher,
            limiter,
            ReconcilerConfig {
                grace_period: ChronoDuration::seconds(
                    config.reconciler.grace_period_seconds as i64,
                ),
                replay_retention: ChronoDuration::seconds(
                    config.reconciler.replay_retention_seconds as i64,
                ),
            },
        ));

        let scheduler = Arc::new(Scheduler::new(
            reconciler.clone(),
            config.scheduler.updates_per_minute,
        ));

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            store,
            reconciler,
            scheduler,
            shutdown,
            scheduler_handle: None,
        })
    }

    /// Start the scheduling loop
    pub fn start(&mut self) {
        info!(
            updates_per_minute = self.config.scheduler.updates_per_minute,
            "Starting reconciliation scheduler"
        );
        self.scheduler_handle = Some(self.scheduler.clone().start(self.shutdown.subscribe()));
    }

    /// Run a single reconciliation cycle immediately (dry runs, diagnostics)
    pub async fn run_cycle_once(&self) -> Result<CycleStats> {
        self.reconciler.run_cycle(current_timestamp()).await
    }

    /// Stop the scheduler and wait for its loop to exit
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.scheduler_handle.take() {
            let _ = handle.await;
        }
        info!("Scheduler stopped");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared in-process store (presentation layers read from here)
    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }
}
