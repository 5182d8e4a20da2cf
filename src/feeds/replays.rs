//! Replay feed client
//!
//! Completed-match records are consumed incrementally by offset cursor; a
//! companion endpoint resolves a single replay's map name for correlation
//! confirmation.

use crate::error::{HeraldError, Result};
use crate::types::{Replay, ReplayId};
use crate::utils::normalize_map_name;
use async_trait::async_trait;
use serde::Deserialize;

/// Read-only surface of the replay feed
#[async_trait]
pub trait ReplayFeed: Send + Sync {
    /// Replays published after the given cursor id
    async fn recent(&self, since: ReplayId) -> Result<Vec<Replay>>;

    /// Normalized map name of a single replay
    async fn map_name(&self, id: ReplayId) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ReplayList {
    body: Vec<RawReplay>,
}

#[derive(Debug, Deserialize)]
struct RawReplay {
    id: ReplayId,
    name: String,
    players: Vec<RawPlayer>,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReplayDetail {
    body: ReplayDetailBody,
}

#[derive(Debug, Deserialize)]
struct ReplayDetailBody {
    data: ReplayData,
}

#[derive(Debug, Deserialize)]
struct ReplayData {
    game: ReplayGame,
}

#[derive(Debug, Deserialize)]
struct ReplayGame {
    map: String,
}

/// HTTP implementation of the replay feed
pub struct HttpReplayFeed {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReplayFeed {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReplayFeed for HttpReplayFeed {
    async fn recent(&self, since: ReplayId) -> Result<Vec<Replay>> {
        let url = format!("{}?since={}", self.base_url, since);
        let response =
            self.http
                .get(&url)
                .send()
                .await
                .map_err(|e| HeraldError::FeedUnavailable {
                    message: format!("replay feed: {e}"),
                })?;
        let list: ReplayList = response
            .json()
            .await
            .map_err(|e| HeraldError::FeedMalformed {
                message: format!("replay feed: {e}"),
            })?;

        Ok(list
            .body
            .into_iter()
            .map(|raw| Replay {
                id: raw.id,
                name: raw.name,
                players: raw.players.into_iter().map(|p| p.name).collect(),
            })
            .collect())
    }

    async fn map_name(&self, id: ReplayId) -> Result<String> {
        let url = format!("{}/{}", self.base_url, id);
        let response =
            self.http
                .get(&url)
                .send()
                .await
                .map_err(|e| HeraldError::FeedUnavailable {
                    message: format!("replay detail: {e}"),
                })?;
        let detail: ReplayDetail =
            response
                .json()
                .await
                .map_err(|e| HeraldError::FeedMalformed {
                    message: format!("replay detail: {e}"),
                })?;

        Ok(normalize_map_name(&detail.body.data.game.map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_list_wire_shape() {
        let payload = r#"{"body": [
            {"id": 7, "name": "DotA", "players": [{"name": "P1"}, {"name": "P2"}]}
        ]}"#;
        let list: ReplayList = serde_json::from_str(payload).unwrap();
        assert_eq!(list.body[0].id, 7);
        assert_eq!(list.body[0].players.len(), 2);
    }

    #[test]
    fn test_replay_detail_wire_shape() {
        let payload = r#"{"body": {"data": {"game": {"map": "DotA_Allstars.w3x"}}}}"#;
        let detail: ReplayDetail = serde_json::from_str(payload).unwrap();
        assert_eq!(normalize_map_name(&detail.body.data.game.map), "DotA Allstars");
    }
}
