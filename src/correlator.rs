//! Replay correlation
//!
//! Heuristically links a just-departed lobby to a completed-match record:
//! exact name match plus host membership in the replay's player list,
//! confirmed by resolving the replay's map name. All lookup errors are
//! swallowed and reported as "no match" so the reconciler's dead path stays
//! robust.

use crate::feeds::ReplayFeed;
use crate::store::MetaStore;
use crate::types::{Lobby, Replay, ReplayId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Links dead lobbies to replays via the replay feed and its offset cursor
pub struct ReplayCorrelator {
    feed: Arc<dyn ReplayFeed>,
    meta: Arc<dyn MetaStore>,
}

impl ReplayCorrelator {
    pub fn new(feed: Arc<dyn ReplayFeed>, meta: Arc<dyn MetaStore>) -> Self {
        Self { feed, meta }
    }

    /// Fetch replays published since the stored cursor, advancing it past
    /// the newest record. Returns `None` when the fetch fails, which tells
    /// the reconciler to skip correlation for the cycle.
    pub async fn fetch_recent(&self) -> Option<Vec<Replay>> {
        let since = match self.meta.replay_offset().await {
            Ok(offset) => offset,
            Err(e) => {
                warn!(error = %e, "Could not read replay cursor, skipping correlation");
                return None;
            }
        };

        let replays = match self.feed.recent(since).await {
            Ok(replays) => replays,
            Err(e) => {
                warn!(error = %e, "Replay feed fetch failed, skipping correlation");
                return None;
            }
        };

        if let Some(last) = replays.last() {
            if let Err(e) = self.meta.set_replay_offset(last.id).await {
                warn!(error = %e, "Could not advance replay cursor");
            }
        }
        Some(replays)
    }

    /// Find a replay matching the dead lobby: exact name match, host among
    /// the players, and a confirmed map name. First confirmed candidate wins.
    pub async fn find_replay(&self, lobby: &Lobby, replays: &[Replay]) -> Option<ReplayId> {
        let candidates = replays
            .iter()
            .filter(|r| r.name == lobby.name && r.players.iter().any(|p| p == &lobby.host));

        for candidate in candidates {
            match self.feed.map_name(candidate.id).await {
                Ok(map) if map == lobby.map => {
                    debug!(
                        replay_id = candidate.id,
                        lobby = %lobby.name,
                        "Correlated dead lobby to replay"
                    );
                    return Some(candidate.id);
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!(replay_id = candidate.id, error = %e, "Replay map lookup failed");
                    continue;
                }
            }
        }
        None
    }
}
