//! In-memory store implementation
//!
//! Serves the process when no external storage engine is wired in, and backs
//! the integration tests. All operations are per-key and idempotent, matching
//! the contract the reconciler assumes.

use crate::error::{HeraldError, Result};
use crate::store::{AlertStore, LobbyStore, MetaStore};
use crate::types::{Alert, Lobby, LobbyId, ReplayId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe in-memory key-value store for lobbies, alerts, and metadata
#[derive(Debug, Default)]
pub struct MemoryStore {
    lobbies: RwLock<HashMap<LobbyId, Lobby>>,
    alerts: RwLock<HashMap<String, Alert>>,
    replay_offset: RwLock<ReplayId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> anyhow::Error {
    HeraldError::StoreFailed {
        message: "store lock poisoned".to_string(),
    }
    .into()
}

#[async_trait]
impl LobbyStore for MemoryStore {
    async fn get_lobby(&self, id: LobbyId) -> Result<Option<Lobby>> {
        let lobbies = self.lobbies.read().map_err(|_| lock_poisoned())?;
        Ok(lobbies.get(&id).cloned())
    }

    async fn put_lobby(&self, id: LobbyId, lobby: &Lobby) -> Result<()> {
        let mut lobbies = self.lobbies.write().map_err(|_| lock_poisoned())?;
        lobbies.insert(id, lobby.clone());
        Ok(())
    }

    async fn delete_lobby(&self, id: LobbyId) -> Result<()> {
        let mut lobbies = self.lobbies.write().map_err(|_| lock_poisoned())?;
        lobbies.remove(&id);
        Ok(())
    }

    async fn list_lobbies(&self) -> Result<Vec<(LobbyId, Lobby)>> {
        let lobbies = self.lobbies.read().map_err(|_| lock_poisoned())?;
        Ok(lobbies.iter().map(|(k, v)| (*k, v.clone())).collect())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn get_alert(&self, channel_id: &str) -> Result<Option<Alert>> {
        let alerts = self.alerts.read().map_err(|_| lock_poisoned())?;
        Ok(alerts.get(channel_id).cloned())
    }

    async fn upsert_alert(&self, alert: &Alert) -> Result<()> {
        if alert.rules.is_empty() {
            return Err(HeraldError::InvalidAlert {
                channel_id: alert.channel_id.clone(),
                reason: "rules must be non-empty".to_string(),
            }
            .into());
        }
        let mut alerts = self.alerts.write().map_err(|_| lock_poisoned())?;
        alerts.insert(alert.channel_id.clone(), alert.clone());
        Ok(())
    }

    async fn delete_alert(&self, channel_id: &str) -> Result<()> {
        let mut alerts = self.alerts.write().map_err(|_| lock_poisoned())?;
        alerts.remove(channel_id);
        Ok(())
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().map_err(|_| lock_poisoned())?;
        Ok(alerts.values().cloned().collect())
    }
}

#[async_trait]
impl MetaStore for MemoryStore {
    async fn replay_offset(&self) -> Result<ReplayId> {
        let offset = self.replay_offset.read().map_err(|_| lock_poisoned())?;
        Ok(*offset)
    }

    async fn set_replay_offset(&self, id: ReplayId) -> Result<()> {
        let mut offset = self.replay_offset.write().map_err(|_| lock_poisoned())?;
        *offset = id;
        Ok(())
    }
}
