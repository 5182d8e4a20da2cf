//! Persisted store boundary
//!
//! The reconciler only relies on the read/write contract below; the actual
//! storage engine behind it is an external collaborator. Records are written
//! per-key with overwrite semantics and no cross-key transactions.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{Alert, Lobby, LobbyId, ReplayId};
use async_trait::async_trait;

/// Read/write contract for the lobby collection.
///
/// `list_lobbies` returns the storage key alongside each record so callers
/// can detect records persisted under a stale identity.
#[async_trait]
pub trait LobbyStore: Send + Sync {
    async fn get_lobby(&self, id: LobbyId) -> Result<Option<Lobby>>;
    async fn put_lobby(&self, id: LobbyId, lobby: &Lobby) -> Result<()>;
    async fn delete_lobby(&self, id: LobbyId) -> Result<()>;
    async fn list_lobbies(&self) -> Result<Vec<(LobbyId, Lobby)>>;
}

/// Read/write contract for the alert collection, keyed by destination channel
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn get_alert(&self, channel_id: &str) -> Result<Option<Alert>>;
    async fn upsert_alert(&self, alert: &Alert) -> Result<()>;
    async fn delete_alert(&self, channel_id: &str) -> Result<()>;
    async fn list_alerts(&self) -> Result<Vec<Alert>>;
}

/// Small metadata records shared across cycles
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Replay feed cursor: the id of the last consumed replay
    async fn replay_offset(&self) -> Result<ReplayId>;
    async fn set_replay_offset(&self, id: ReplayId) -> Result<()>;
}
