//! Common types used throughout the lobby notification service

use crate::utils::lobby_key;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Deterministic identity key for lobbies, derived from `name+host+map`
pub type LobbyId = i64;

/// Chat platform channel identifier
pub type ChannelId = String;

/// Chat platform message identifier
pub type MessageId = String;

/// Replay record identifier from the replay feed
pub type ReplayId = u64;

/// Which provider supplied the current lobby snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// No poll has completed yet
    Init,
    /// Neither provider is yielding usable data
    None,
    Primary,
    Secondary,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Init => write!(f, "init"),
            DataSource::None => write!(f, "none"),
            DataSource::Primary => write!(f, "primary"),
            DataSource::Secondary => write!(f, "secondary"),
        }
    }
}

/// Lifecycle status rendered into a lobby's tracked chat messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobbyStatus {
    Alive,
    Missing,
    Dead,
}

impl LobbyStatus {
    /// Accent color used when rendering this status
    pub fn color(&self) -> u32 {
        match self {
            LobbyStatus::Alive => 0x6edb6f,
            LobbyStatus::Missing => 0xe69500,
            LobbyStatus::Dead => 0xff7d9c,
        }
    }
}

impl std::fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LobbyStatus::Alive => write!(f, "alive"),
            LobbyStatus::Missing => write!(f, "missing"),
            LobbyStatus::Dead => write!(f, "dead"),
        }
    }
}

/// A chat message currently representing a lobby in some channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub message: MessageId,
}

/// A transient, joinable game session advertised by an external listing feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    pub id: LobbyId,
    pub name: String,
    /// Normalized map name (no file extension, underscores replaced)
    pub map: String,
    pub host: String,
    pub server: String,
    pub slots_taken: u32,
    pub slots_total: u32,
    /// Origin timestamp (seconds) reported by the feed, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// Every chat message currently representing this lobby
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    /// Set when the lobby first disappears from a poll; end of its grace period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_at: Option<DateTime<Utc>>,
    /// True once the grace period has fully expired; the record is then
    /// retained only for replay correlation
    #[serde(default)]
    pub dead: bool,
}

impl Lobby {
    /// Build a lobby snapshot from already-normalized fields, deriving its key
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        map: impl Into<String>,
        server: impl Into<String>,
        slots_taken: u32,
        slots_total: u32,
        created: Option<i64>,
    ) -> Self {
        let name = name.into();
        let host = host.into();
        let map = map.into();
        Self {
            id: lobby_key(&name, &host, &map),
            name,
            map,
            host,
            server: server.into(),
            slots_taken,
            slots_total,
            created,
            messages: Vec::new(),
            dead_at: None,
            dead: false,
        }
    }

    /// Recompute the identity key from the lobby's declared fields
    pub fn derived_id(&self) -> LobbyId {
        lobby_key(&self.name, &self.host, &self.map)
    }

    /// Field value addressed by a rule key
    pub fn rule_field(&self, key: RuleKey) -> &str {
        match key {
            RuleKey::Map => &self.map,
            RuleKey::Host => &self.host,
            RuleKey::Name => &self.name,
            RuleKey::Server => &self.server,
        }
    }
}

/// Lobby field a subscription rule is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKey {
    Map,
    Host,
    Name,
    Server,
}

/// A compiled regular expression retaining its authored source and flags
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    flags: String,
    regex: Regex,
}

impl CompiledPattern {
    /// Compile a pattern with JS-style flags (`i`, `m`, `s` honored, `g` ignored)
    pub fn new(source: &str, flags: &str) -> Result<Self, regex::Error> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                _ => {}
            }
        }
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex: builder.build()?,
        })
    }

    /// Parse a `/pattern/flags` literal. Returns `None` when the literal is
    /// not delimited correctly or the pattern fails to compile.
    pub fn parse_literal(literal: &str) -> Option<Self> {
        let rest = literal.strip_prefix('/')?;
        let slash = rest.rfind('/')?;
        let (pattern, flags) = rest.split_at(slash);
        let flags = &flags[1..];
        if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Self::new(pattern, flags).ok()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

/// A rule value is either a plain substring literal or a compiled pattern
#[derive(Debug, Clone)]
pub enum RuleValue {
    Literal(String),
    Pattern(CompiledPattern),
}

/// Wire shape for [`RuleValue`]: a bare string for literals, an object with
/// `pattern` (and optional `flags`) for regular expressions.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RuleValueRepr {
    Literal(String),
    Pattern {
        pattern: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        flags: String,
    },
}

impl Serialize for RuleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            RuleValue::Literal(s) => RuleValueRepr::Literal(s.clone()),
            RuleValue::Pattern(p) => RuleValueRepr::Pattern {
                pattern: p.source().to_string(),
                flags: p.flags().to_string(),
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RuleValueRepr::deserialize(deserializer)? {
            RuleValueRepr::Literal(s) => Ok(RuleValue::Literal(s)),
            RuleValueRepr::Pattern { pattern, flags } => CompiledPattern::new(&pattern, &flags)
                .map(RuleValue::Pattern)
                .map_err(|e| D::Error::custom(format!("invalid rule pattern: {e}"))),
        }
    }
}

/// A single subscription rule; all of an alert's rules must match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub key: RuleKey,
    pub value: RuleValue,
}

/// Display tweaks applied when rendering notifications for an alert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Descriptive information about an alert's destination. Not consulted by
/// matching logic; kept for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AlertMeta {
    Dm {
        recipients: Vec<DmRecipient>,
    },
    GuildChannel {
        guild_id: String,
        guild_name: String,
        channel_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmRecipient {
    pub id: String,
    pub username: String,
}

/// A user subscription binding a destination channel to matching rules and
/// an optional message template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Non-empty; conjunction over all rules
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced: Option<AdvancedOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<AlertMeta>,
}

/// A completed-match record from the replay feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    pub id: ReplayId,
    pub name: String,
    pub players: Vec<String>,
}

/// Per-cycle reconciliation counters, logged at the end of each cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Lobbies present in the poll
    pub found: usize,
    /// Lobbies seen for the first time
    pub new: usize,
    /// Known lobbies whose slot count changed
    pub updated: usize,
    /// Previously-missing lobbies that reappeared
    pub reappeared: usize,
    /// Known lobbies with no observable change
    pub stable: usize,
    /// Lobbies newly marked missing this cycle
    pub missing: usize,
    /// Lobbies declared dead (or correlated to a replay) this cycle
    pub dead: usize,
    /// Missing lobbies still inside their grace period or replay window
    pub dying: usize,
}
