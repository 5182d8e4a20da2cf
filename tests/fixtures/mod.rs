//! Shared test doubles and a fully wired reconciler harness

#![allow(dead_code)]

use async_trait::async_trait;
use lobby_herald::chat::{ChatClient, ChatError, OutboundMessage};
use lobby_herald::correlator::ReplayCorrelator;
use lobby_herald::dispatch::Dispatcher;
use lobby_herald::error::Result;
use lobby_herald::feeds::{GatewayConfig, LobbyGateway, LobbyProvider, ReplayFeed};
use lobby_herald::reconciler::{Reconciler, ReconcilerConfig};
use lobby_herald::store::{AlertStore, LobbyStore, MemoryStore, MetaStore};
use lobby_herald::throttle::{RateLimiter, ThrottleConfig};
use lobby_herald::types::{
    Alert, Lobby, MessageId, Replay, ReplayId, Rule, RuleKey, RuleValue,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Destination for operator announcements in every harness
pub const OPERATOR_CHANNEL: &str = "operator";

/// Failure a mock chat call should produce for a given channel
#[derive(Debug, Clone, Copy)]
pub enum ScriptedFailure {
    Forbidden,
    UnknownChannel,
    UnknownMessage,
    Api,
}

impl ScriptedFailure {
    fn to_error(self, channel: &str, message: &str) -> ChatError {
        match self {
            ScriptedFailure::Forbidden => ChatError::Forbidden {
                channel_id: channel.to_string(),
            },
            ScriptedFailure::UnknownChannel => ChatError::UnknownChannel {
                channel_id: channel.to_string(),
            },
            ScriptedFailure::UnknownMessage => ChatError::UnknownMessage {
                channel_id: channel.to_string(),
                message_id: message.to_string(),
            },
            ScriptedFailure::Api => ChatError::Api {
                code: 500,
                message: "scripted failure".to_string(),
            },
        }
    }
}

/// One recorded create or edit call
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel: String,
    pub message_id: String,
    pub payload: OutboundMessage,
}

/// In-memory chat client recording every call, with per-channel scriptable
/// failures
#[derive(Default)]
pub struct MockChatClient {
    next_id: AtomicU64,
    created: Mutex<Vec<SentMessage>>,
    edited: Mutex<Vec<SentMessage>>,
    fail_create: Mutex<HashMap<String, ScriptedFailure>>,
    fail_edit: Mutex<HashMap<String, ScriptedFailure>>,
}

impl MockChatClient {
    pub fn fail_create_with(&self, channel: &str, failure: ScriptedFailure) {
        self.fail_create
            .lock()
            .unwrap()
            .insert(channel.to_string(), failure);
    }

    pub fn fail_edit_with(&self, channel: &str, failure: ScriptedFailure) {
        self.fail_edit
            .lock()
            .unwrap()
            .insert(channel.to_string(), failure);
    }

    pub fn created(&self) -> Vec<SentMessage> {
        self.created.lock().unwrap().clone()
    }

    pub fn edited(&self) -> Vec<SentMessage> {
        self.edited.lock().unwrap().clone()
    }

    pub fn created_in(&self, channel: &str) -> Vec<SentMessage> {
        self.created()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }

    pub fn edits_in(&self, channel: &str) -> Vec<SentMessage> {
        self.edited()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn create_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> std::result::Result<MessageId, ChatError> {
        if let Some(failure) = self.fail_create.lock().unwrap().get(channel_id) {
            return Err(failure.to_error(channel_id, ""));
        }
        let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.created.lock().unwrap().push(SentMessage {
            channel: channel_id.to_string(),
            message_id: id.clone(),
            payload: message.clone(),
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &OutboundMessage,
    ) -> std::result::Result<(), ChatError> {
        if let Some(failure) = self.fail_edit.lock().unwrap().get(channel_id) {
            return Err(failure.to_error(channel_id, message_id));
        }
        self.edited.lock().unwrap().push(SentMessage {
            channel: channel_id.to_string(),
            message_id: message_id.to_string(),
            payload: message.clone(),
        });
        Ok(())
    }
}

/// Lobby provider serving a fixed, settable snapshot
pub struct StaticLobbyProvider {
    name: &'static str,
    lobbies: Mutex<Vec<Lobby>>,
    fail: Mutex<bool>,
}

impl StaticLobbyProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lobbies: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        }
    }

    pub fn set_lobbies(&self, lobbies: Vec<Lobby>) {
        *self.lobbies.lock().unwrap() = lobbies;
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl LobbyProvider for StaticLobbyProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Vec<Lobby>> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("{} is down", self.name);
        }
        Ok(self.lobbies.lock().unwrap().clone())
    }
}

/// Replay feed serving fixed records and map lookups
#[derive(Default)]
pub struct StaticReplayFeed {
    replays: Mutex<Vec<Replay>>,
    maps: Mutex<HashMap<ReplayId, String>>,
    fail: Mutex<bool>,
}

impl StaticReplayFeed {
    pub fn publish(&self, replay: Replay, map: &str) {
        self.maps.lock().unwrap().insert(replay.id, map.to_string());
        self.replays.lock().unwrap().push(replay);
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ReplayFeed for StaticReplayFeed {
    async fn recent(&self, since: ReplayId) -> Result<Vec<Replay>> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("replay feed is down");
        }
        Ok(self
            .replays
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.id > since)
            .cloned()
            .collect())
    }

    async fn map_name(&self, id: ReplayId) -> Result<String> {
        self.maps
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown replay {id}"))
    }
}

/// Fully wired reconciler over in-memory collaborators
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub chat: Arc<MockChatClient>,
    pub primary: Arc<StaticLobbyProvider>,
    pub secondary: Arc<StaticLobbyProvider>,
    pub replays: Arc<StaticReplayFeed>,
    pub limiter: Arc<RateLimiter>,
    pub reconciler: Reconciler,
}

pub fn harness() -> Harness {
    harness_with(ReconcilerConfig::default())
}

pub fn harness_with(config: ReconcilerConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let chat = Arc::new(MockChatClient::default());
    let limiter = Arc::new(RateLimiter::new(ThrottleConfig::default()));

    let alerts: Arc<dyn AlertStore> = store.clone();
    let lobbies: Arc<dyn LobbyStore> = store.clone();
    let meta: Arc<dyn MetaStore> = store.clone();

    let dispatcher = Arc::new(Dispatcher::new(
        chat.clone(),
        alerts.clone(),
        limiter.clone(),
        OPERATOR_CHANNEL,
        "https://replays.example.test",
    ));

    let primary = Arc::new(StaticLobbyProvider::new("primary"));
    let secondary = Arc::new(StaticLobbyProvider::new("secondary"));
    let gateway = Arc::new(LobbyGateway::new(
        primary.clone(),
        secondary.clone(),
        dispatcher.clone(),
        GatewayConfig::default(),
    ));

    let replays = Arc::new(StaticReplayFeed::default());
    let correlator = Arc::new(ReplayCorrelator::new(replays.clone(), meta));

    let reconciler = Reconciler::new(
        gateway,
        lobbies,
        alerts,
        correlator,
        dispatcher,
        limiter.clone(),
        config,
    );

    Harness {
        store,
        chat,
        primary,
        secondary,
        replays,
        limiter,
        reconciler,
    }
}

/// A joinable lobby on the US realm with a couple of players in it
pub fn lobby(name: &str, host: &str, map: &str) -> Lobby {
    Lobby::new(name, host, map, "us", 2, 10, None)
}

/// An alert subscribing `channel` to lobbies whose map contains `map`
pub fn map_alert(channel: &str, map: &str) -> Alert {
    Alert {
        channel_id: channel.to_string(),
        message: None,
        rules: vec![Rule {
            key: RuleKey::Map,
            value: RuleValue::Literal(map.to_string()),
        }],
        advanced: None,
        meta: None,
    }
}

pub fn replay(id: ReplayId, name: &str, players: &[&str]) -> Replay {
    Replay {
        id,
        name: name.to_string(),
        players: players.iter().map(|p| p.to_string()).collect(),
    }
}
