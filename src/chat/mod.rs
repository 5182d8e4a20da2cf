//! Chat platform boundary
//!
//! The dispatcher only depends on the [`ChatClient`] trait and the error
//! classification below; the REST transport in [`discord`] is a thin
//! collaborator kept at the interface boundary.

pub mod discord;
pub mod payload;

pub use discord::DiscordClient;
pub use payload::{build_lobby_embed, AllowedMentions, Embed, EmbedField, OutboundMessage};

use crate::types::MessageId;
use async_trait::async_trait;

/// Classified chat platform delivery failure.
///
/// The dispatcher branches on these classes: permission and unknown-channel
/// failures deactivate the offending alert, unknown-message failures prune a
/// tracked message ref, anything else is logged and retried organically.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Missing permission for channel {channel_id}")]
    Forbidden { channel_id: String },

    #[error("Unknown channel {channel_id}")]
    UnknownChannel { channel_id: String },

    #[error("Unknown message {message_id} in channel {channel_id}")]
    UnknownMessage {
        channel_id: String,
        message_id: String,
    },

    #[error("Chat API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Chat transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ChatError {
    /// True when the failure means the destination is permanently unusable
    /// and its subscription should be deactivated.
    pub fn is_deactivating(&self) -> bool {
        matches!(
            self,
            ChatError::Forbidden { .. } | ChatError::UnknownChannel { .. }
        )
    }
}

/// Minimal chat platform surface consumed by the dispatcher
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post a new message; returns the created message id
    async fn create_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageId, ChatError>;

    /// Edit an existing message in place
    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChatError>;
}
