//! Lobby feed providers
//!
//! HTTP implementations of [`LobbyProvider`] for the primary and secondary
//! listing feeds. Each provider normalizes its own wire shape into the common
//! [`Lobby`] form (map extension stripped, underscores replaced, identity key
//! derived).

use crate::error::{HeraldError, Result};
use crate::types::Lobby;
use crate::utils::normalize_map_name;
use async_trait::async_trait;
use serde::Deserialize;

/// A source of lobby listings
#[async_trait]
pub trait LobbyProvider: Send + Sync {
    /// Provider name for logs and announcements
    fn name(&self) -> &str;

    /// Fetch and normalize the current lobby list
    async fn fetch(&self) -> Result<Vec<Lobby>>;
}

/// Primary feed wire shape: `{"body": [{...camelCase...}]}`
#[derive(Debug, Deserialize)]
struct PrimaryGameList {
    body: Vec<PrimaryLobby>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryLobby {
    host: String,
    map: String,
    name: String,
    server: String,
    slots_taken: u32,
    slots_total: u32,
    #[serde(default)]
    created: Option<i64>,
}

/// HTTP client for the primary lobby feed
pub struct PrimaryLobbyProvider {
    http: reqwest::Client,
    url: String,
}

impl PrimaryLobbyProvider {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl LobbyProvider for PrimaryLobbyProvider {
    fn name(&self) -> &str {
        "primary"
    }

    async fn fetch(&self) -> Result<Vec<Lobby>> {
        let response = self.http.get(&self.url).send().await.map_err(|e| {
            HeraldError::FeedUnavailable {
                message: format!("primary feed: {e}"),
            }
        })?;
        let list: PrimaryGameList =
            response
                .json()
                .await
                .map_err(|e| HeraldError::FeedMalformed {
                    message: format!("primary feed: {e}"),
                })?;

        Ok(list
            .body
            .into_iter()
            .map(|raw| {
                Lobby::new(
                    raw.name,
                    raw.host,
                    normalize_map_name(&raw.map),
                    raw.server,
                    raw.slots_taken,
                    raw.slots_total,
                    raw.created,
                )
            })
            .collect())
    }
}

/// Secondary feed wire shape: `{"results": [{...snake_case...}]}` with
/// provider-specific field names
#[derive(Debug, Deserialize)]
struct SecondaryGameList {
    results: Vec<SecondaryLobby>,
}

#[derive(Debug, Deserialize)]
struct SecondaryLobby {
    host: String,
    path: String,
    name: String,
    region: String,
    slots_taken: u32,
    slots_total: u32,
    #[serde(default)]
    created: Option<i64>,
}

/// HTTP client for the fallback lobby feed
pub struct SecondaryLobbyProvider {
    http: reqwest::Client,
    url: String,
}

impl SecondaryLobbyProvider {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl LobbyProvider for SecondaryLobbyProvider {
    fn name(&self) -> &str {
        "secondary"
    }

    async fn fetch(&self) -> Result<Vec<Lobby>> {
        let response = self.http.get(&self.url).send().await.map_err(|e| {
            HeraldError::FeedUnavailable {
                message: format!("secondary feed: {e}"),
            }
        })?;
        let list: SecondaryGameList =
            response
                .json()
                .await
                .map_err(|e| HeraldError::FeedMalformed {
                    message: format!("secondary feed: {e}"),
                })?;

        Ok(list
            .results
            .into_iter()
            .map(|raw| {
                Lobby::new(
                    raw.name,
                    raw.host,
                    normalize_map_name(&raw.path),
                    raw.region,
                    raw.slots_taken,
                    raw.slots_total,
                    raw.created,
                )
            })
            .collect())
    }
}
