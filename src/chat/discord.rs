//! Discord REST client
//!
//! Thin transport implementation of [`ChatClient`] over the Discord v10 HTTP
//! API. Its only non-trivial job is mapping the platform's numeric error
//! codes onto the [`ChatError`] classification the dispatcher branches on.

use crate::chat::{ChatClient, ChatError, OutboundMessage};
use crate::types::MessageId;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

// Discord JSON error codes the dispatcher cares about
const MISSING_ACCESS: i64 = 50001;
const CANNOT_MESSAGE_USER: i64 = 50007;
const MISSING_PERMISSIONS: i64 = 50013;
const UNKNOWN_CHANNEL: i64 = 10003;
const UNKNOWN_MESSAGE: i64 = 10008;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

/// Discord implementation of the chat platform boundary
pub struct DiscordClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl DiscordClient {
    pub fn new(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self::with_api_url(http, token, DEFAULT_API_URL)
    }

    /// Override the API base URL (used by tests against a local stub)
    pub fn with_api_url(
        http: reqwest::Client,
        token: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn classify(
        status: reqwest::StatusCode,
        body: ApiErrorBody,
        channel_id: &str,
        message_id: Option<&str>,
    ) -> ChatError {
        match body.code {
            MISSING_ACCESS | CANNOT_MESSAGE_USER | MISSING_PERMISSIONS => ChatError::Forbidden {
                channel_id: channel_id.to_string(),
            },
            UNKNOWN_CHANNEL => ChatError::UnknownChannel {
                channel_id: channel_id.to_string(),
            },
            UNKNOWN_MESSAGE => ChatError::UnknownMessage {
                channel_id: channel_id.to_string(),
                message_id: message_id.unwrap_or_default().to_string(),
            },
            code => ChatError::Api {
                code: if code != 0 { code } else { status.as_u16() as i64 },
                message: body.message,
            },
        }
    }

    async fn into_chat_error(
        response: reqwest::Response,
        channel_id: &str,
        message_id: Option<&str>,
    ) -> ChatError {
        let status = response.status();
        let body = response.json::<ApiErrorBody>().await.unwrap_or(ApiErrorBody {
            code: 0,
            message: status.to_string(),
        });
        Self::classify(status, body, channel_id, message_id)
    }
}

#[async_trait]
impl ChatClient for DiscordClient {
    async fn create_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageId, ChatError> {
        let url = format!("{}/channels/{}/messages", self.api_url, channel_id);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_chat_error(response, channel_id, None).await);
        }

        let created: CreatedMessage = response.json().await?;
        debug!(channel_id, message_id = %created.id, "Created chat message");
        Ok(created.id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChatError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_url, channel_id, message_id
        );
        let response = self
            .http
            .patch(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_chat_error(response, channel_id, Some(message_id)).await);
        }

        Ok(())
    }
}
