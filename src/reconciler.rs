//! Lobby reconciliation state machine
//!
//! One cycle diffs the latest poll against stored state and drives lifecycle
//! transitions: new lobbies are announced to matching alerts, changed lobbies
//! get alive updates, vanished lobbies walk the missing → dead path with a
//! grace period, and dead lobbies are held for replay correlation before
//! final deletion.
//!
//! All inputs are gathered concurrently at the start of the cycle; the diff
//! itself is deterministic given the poll, stored state, alerts, replays,
//! and the passed-in `now`. Per-lobby failures never abort the cycle; only a
//! feed outage (empty poll) short-circuits, to avoid mass-marking every
//! lobby missing.

use crate::correlator::ReplayCorrelator;
use crate::dispatch::Dispatcher;
use crate::feeds::{GatewayPoll, LobbyGateway};
use crate::matcher;
use crate::store::{AlertStore, LobbyStore};
use crate::throttle::RateLimiter;
use crate::types::{Alert, CycleStats, Lobby, LobbyId, LobbyStatus};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle timing knobs
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How long a vanished lobby stays "missing" before it is declared dead
    pub grace_period: Duration,
    /// How long a dead lobby with tracked messages awaits replay correlation
    pub replay_retention: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::minutes(5),
            replay_retention: Duration::hours(24),
        }
    }
}

/// The central reconciliation driver
pub struct Reconciler {
    gateway: Arc<LobbyGateway>,
    lobbies: Arc<dyn LobbyStore>,
    alerts: Arc<dyn AlertStore>,
    correlator: Arc<ReplayCorrelator>,
    dispatcher: Arc<Dispatcher>,
    limiter: Arc<RateLimiter>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<LobbyGateway>,
        lobbies: Arc<dyn LobbyStore>,
        alerts: Arc<dyn AlertStore>,
        correlator: Arc<ReplayCorrelator>,
        dispatcher: Arc<Dispatcher>,
        limiter: Arc<RateLimiter>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            gateway,
            lobbies,
            alerts,
            correlator,
            dispatcher,
            limiter,
            config,
        }
    }

    /// Run one reconciliation cycle against the given clock
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleStats> {
        let (poll, stored, alerts, replays) = tokio::join!(
            self.gateway.poll(now),
            self.lobbies.list_lobbies(),
            self.alerts.list_alerts(),
            self.correlator.fetch_recent(),
        );
        let stored = stored?;
        let alerts = alerts?;

        // Refill is driven by cycle cadence, not wall time
        self.limiter.replenish(now);

        let GatewayPoll {
            lobbies: new_lobbies,
            data_source,
        } = poll;

        let mut stats = CycleStats {
            found: new_lobbies.len(),
            ..Default::default()
        };

        if new_lobbies.is_empty() {
            // A feed outage must not mass-mark every stored lobby missing
            warn!("Found no lobbies, skipping reconciliation");
            return Ok(stats);
        }

        let mut stored_map = self.heal_stored(stored).await;
        let new_ids: HashSet<LobbyId> = new_lobbies.iter().map(|l| l.id).collect();

        for lobby in new_lobbies {
            self.reconcile_present(lobby, &mut stored_map, &alerts, data_source, now, &mut stats)
                .await;
        }

        for (id, lobby) in stored_map {
            if new_ids.contains(&id) {
                continue;
            }
            self.reconcile_absent(
                lobby,
                replays.as_deref(),
                &alerts,
                data_source,
                now,
                &mut stats,
            )
            .await;
        }

        info!(
            found = stats.found,
            source = %data_source,
            new = stats.new,
            updated = stats.updated,
            reappeared = stats.reappeared,
            stable = stats.stable,
            missing = stats.missing,
            dead = stats.dead,
            dying = stats.dying,
            "Reconciliation cycle complete"
        );

        Ok(stats)
    }

    /// Rewrite any stored record whose key disagrees with its declared
    /// identity, then index records by their derived key.
    async fn heal_stored(&self, stored: Vec<(LobbyId, Lobby)>) -> HashMap<LobbyId, Lobby> {
        let mut map = HashMap::with_capacity(stored.len());
        for (key, mut lobby) in stored {
            let derived = lobby.derived_id();
            if key != derived || lobby.id != derived {
                warn!(key, derived, lobby = %lobby.name, "Healing lobby stored under stale identity");
                lobby.id = derived;
                self.persist(&lobby).await;
                if key != derived {
                    self.remove(key).await;
                }
            }
            map.insert(derived, lobby);
        }
        map
    }

    /// Step 1: a lobby present in the poll
    async fn reconcile_present(
        &self,
        mut lobby: Lobby,
        stored_map: &mut HashMap<LobbyId, Lobby>,
        alerts: &[Alert],
        data_source: crate::types::DataSource,
        now: DateTime<Utc>,
        stats: &mut CycleStats,
    ) {
        let prior = match stored_map.get(&lobby.id) {
            // A host re-hosting an identical lobby must not be conflated
            // with the expiring record; drop the old one and start fresh.
            Some(prior) if prior.dead => {
                self.remove(lobby.id).await;
                stored_map.remove(&lobby.id);
                None
            }
            prior => prior.cloned(),
        };

        match prior {
            None => {
                debug!(lobby = %lobby.name, "New lobby");
                let matching: Vec<Alert> = alerts
                    .iter()
                    .filter(|alert| matcher::matches(&alert.rules, &lobby))
                    .cloned()
                    .collect();
                lobby.messages = self
                    .dispatcher
                    .broadcast_new(&lobby, &matching, data_source)
                    .await;
                stats.new += 1;
                self.persist(&lobby).await;
            }
            Some(prior) => {
                lobby.messages = prior.messages.clone();
                if lobby.slots_taken != prior.slots_taken || prior.dead_at.is_some() {
                    self.dispatcher
                        .broadcast_status(
                            &mut lobby,
                            LobbyStatus::Alive,
                            data_source,
                            alerts,
                            None,
                            now,
                        )
                        .await;
                    if prior.dead_at.is_some() {
                        stats.reappeared += 1;
                    } else {
                        stats.updated += 1;
                    }
                } else {
                    stats.stable += 1;
                }
                self.persist(&lobby).await;
            }
        }
    }

    /// Step 2: a stored lobby absent from the poll
    async fn reconcile_absent(
        &self,
        mut lobby: Lobby,
        replays: Option<&[crate::types::Replay]>,
        alerts: &[Alert],
        data_source: crate::types::DataSource,
        now: DateTime<Utc>,
        stats: &mut CycleStats,
    ) {
        // Correlation first: a matched replay closes the lobby immediately,
        // whatever its grace state. A failed replay fetch skips this.
        if let Some(replays) = replays {
            if let Some(replay_id) = self.correlator.find_replay(&lobby, replays).await {
                self.dispatcher
                    .broadcast_status(
                        &mut lobby,
                        LobbyStatus::Dead,
                        data_source,
                        alerts,
                        Some(replay_id),
                        now,
                    )
                    .await;
                self.remove(lobby.id).await;
                stats.dead += 1;
                return;
            }
        }

        match lobby.dead_at {
            None => {
                lobby.dead_at = Some(now + self.config.grace_period);
                self.dispatcher
                    .broadcast_status(
                        &mut lobby,
                        LobbyStatus::Missing,
                        data_source,
                        alerts,
                        None,
                        now,
                    )
                    .await;
                stats.missing += 1;
                self.persist(&lobby).await;
            }
            Some(dead_at) if now >= dead_at => {
                if !lobby.dead {
                    self.dispatcher
                        .broadcast_status(
                            &mut lobby,
                            LobbyStatus::Dead,
                            data_source,
                            alerts,
                            None,
                            now,
                        )
                        .await;
                    stats.dead += 1;
                    if lobby.messages.is_empty() {
                        // Nothing to correlate for; no reason to retain
                        self.remove(lobby.id).await;
                    } else {
                        lobby.dead = true;
                        self.persist(&lobby).await;
                    }
                } else if now - dead_at >= self.config.replay_retention
                    || lobby.messages.is_empty()
                {
                    debug!(lobby = %lobby.name, "Retiring dead lobby, replay window closed");
                    self.remove(lobby.id).await;
                } else {
                    stats.dying += 1;
                }
            }
            // Still within the missing grace period
            Some(_) => stats.dying += 1,
        }
    }

    async fn persist(&self, lobby: &Lobby) {
        if let Err(e) = self.lobbies.put_lobby(lobby.id, lobby).await {
            error!(lobby = %lobby.name, error = %e, "Failed to persist lobby");
        }
    }

    async fn remove(&self, id: LobbyId) {
        if let Err(e) = self.lobbies.delete_lobby(id).await {
            error!(id, error = %e, "Failed to delete lobby");
        }
    }
}
