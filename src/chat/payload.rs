//! Outbound message payloads and lobby embed rendering

use crate::types::{AdvancedOptions, DataSource, Lobby, LobbyStatus, ReplayId};
use serde::{Deserialize, Serialize};

/// Body of a created or edited chat message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
}

/// Restricts which mention classes a message may trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

impl AllowedMentions {
    /// Role and everyone pings only; no individual user mentions
    pub fn roles_and_everyone() -> Self {
        Self {
            parse: vec!["roles".to_string(), "everyone".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Render the embed representing a lobby in a given lifecycle status.
///
/// `replay` adds a correlated-replay link when a dead lobby was matched to a
/// completed game; `replay_link_base` supplies the link prefix.
pub fn build_lobby_embed(
    lobby: &Lobby,
    status: LobbyStatus,
    source: DataSource,
    advanced: Option<&AdvancedOptions>,
    replay: Option<(ReplayId, &str)>,
) -> Embed {
    let slot_offset = advanced.and_then(|a| a.slot_offset).unwrap_or(0);
    let mut fields = vec![
        EmbedField {
            name: "Game name".to_string(),
            value: lobby.name.clone(),
            inline: false,
        },
        EmbedField {
            name: "Host".to_string(),
            value: lobby.host.clone(),
            inline: true,
        },
        EmbedField {
            name: "Realm".to_string(),
            value: lobby.server.clone(),
            inline: true,
        },
        EmbedField {
            name: "Players".to_string(),
            value: format!(
                "{}/{}",
                lobby.slots_taken,
                lobby.slots_total.saturating_sub(slot_offset)
            ),
            inline: true,
        },
    ];

    if let Some((replay_id, base)) = replay {
        fields.push(EmbedField {
            name: "Replay".to_string(),
            value: format!("{}/{}", base.trim_end_matches('/'), replay_id),
            inline: false,
        });
    }

    Embed {
        color: Some(status.color()),
        title: Some(lobby.map.clone()),
        fields,
        thumbnail: advanced
            .and_then(|a| a.thumbnail.clone())
            .map(|url| EmbedImage { url }),
        footer: match source {
            DataSource::Secondary => Some(EmbedFooter {
                text: "Powered by the fallback lobby feed".to_string(),
                icon_url: None,
            }),
            _ => None,
        },
    }
}
