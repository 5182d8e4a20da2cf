//! Notification dispatcher
//!
//! Creates, edits, and tracks outbound chat messages per lobby/alert pair.
//! Creation is never rate-limited; `alive`/`missing` edits are shed when a
//! channel's token bucket is exhausted; `dead` edits always go out. Delivery
//! failures are classified: permanently unusable destinations get their
//! subscription deactivated with an operator notification, deleted messages
//! are pruned from the lobby's tracked list, and anything else is logged and
//! retried organically on a later cycle.

use crate::chat::{
    build_lobby_embed, AllowedMentions, ChatClient, ChatError, OutboundMessage,
};
use crate::feeds::SourceAnnouncer;
use crate::store::AlertStore;
use crate::template::TemplateEngine;
use crate::throttle::RateLimiter;
use crate::types::{
    Alert, ChannelId, DataSource, Lobby, LobbyStatus, MessageRef, ReplayId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Folded outcome counters for one status broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub delivered: usize,
    pub shed: usize,
    pub pruned: usize,
    pub failed: usize,
}

enum EditOutcome {
    Delivered,
    Shed,
    Prune(MessageRef),
    Failed,
}

/// Outbound message fan-out for lobby lifecycle notifications
pub struct Dispatcher {
    chat: Arc<dyn ChatClient>,
    alerts: Arc<dyn AlertStore>,
    limiter: Arc<RateLimiter>,
    templates: TemplateEngine,
    operator_channel: ChannelId,
    replay_link_base: String,
}

impl Dispatcher {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        alerts: Arc<dyn AlertStore>,
        limiter: Arc<RateLimiter>,
        operator_channel: impl Into<ChannelId>,
        replay_link_base: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            alerts,
            limiter,
            templates: TemplateEngine::new(),
            operator_channel: operator_channel.into(),
            replay_link_base: replay_link_base.into(),
        }
    }

    /// Post a creation notification for every matching alert concurrently,
    /// returning the refs of all successfully created messages.
    pub async fn broadcast_new(
        &self,
        lobby: &Lobby,
        matching_alerts: &[Alert],
        source: DataSource,
    ) -> Vec<MessageRef> {
        let posts = matching_alerts
            .iter()
            .map(|alert| self.post_new(lobby, alert, source));
        join_all(posts).await.into_iter().flatten().collect()
    }

    /// Post a single creation notification. Never rate-limited. Returns the
    /// created message ref, or `None` when delivery failed (the failure has
    /// already been handled per its classification).
    pub async fn post_new(
        &self,
        lobby: &Lobby,
        alert: &Alert,
        source: DataSource,
    ) -> Option<MessageRef> {
        let content = match self
            .templates
            .render(alert.message.as_deref(), &lobby.into())
        {
            Ok(content) => content.filter(|c| !c.is_empty()),
            Err(e) => {
                // A template that stopped compiling should not silence the
                // alert; fall back to the raw message text.
                warn!(
                    channel = %alert.channel_id,
                    error = %e,
                    "Alert template failed to compile, sending raw text"
                );
                alert.message.clone()
            }
        };

        let payload = OutboundMessage {
            content,
            embeds: vec![build_lobby_embed(
                lobby,
                LobbyStatus::Alive,
                source,
                alert.advanced.as_ref(),
                None,
            )],
            allowed_mentions: Some(AllowedMentions::roles_and_everyone()),
        };

        match self.chat.create_message(&alert.channel_id, &payload).await {
            Ok(message_id) => {
                info!(
                    lobby = %lobby.name,
                    map = %lobby.map,
                    channel = %alert.channel_id,
                    "Posted lobby"
                );
                Some(MessageRef {
                    channel: alert.channel_id.clone(),
                    message: message_id,
                })
            }
            Err(e) if e.is_deactivating() => {
                self.deactivate_alert(&alert.channel_id, &e).await;
                None
            }
            Err(e) => {
                error!(channel = %alert.channel_id, error = %e, "Error posting message");
                None
            }
        }
    }

    /// Edit every message tracking `lobby` to show `status`, concurrently.
    ///
    /// `alive`/`missing` edits consult the rate limiter per destination and
    /// are silently dropped when the bucket is empty; `dead` edits are always
    /// attempted. Messages the platform reports as deleted are pruned from
    /// the lobby's tracked list.
    pub async fn broadcast_status(
        &self,
        lobby: &mut Lobby,
        status: LobbyStatus,
        source: DataSource,
        alerts: &[Alert],
        replay: Option<ReplayId>,
        now: DateTime<Utc>,
    ) -> UpdateSummary {
        let refs = lobby.messages.clone();
        let edits = refs.into_iter().map(|message_ref| {
            let alert = alerts.iter().find(|a| a.channel_id == message_ref.channel);
            self.edit_status(lobby, message_ref, status, source, alert, replay, now)
        });

        let outcomes = join_all(edits).await;
        let mut summary = UpdateSummary::default();
        for outcome in outcomes {
            match outcome {
                EditOutcome::Delivered => summary.delivered += 1,
                EditOutcome::Shed => summary.shed += 1,
                EditOutcome::Failed => summary.failed += 1,
                EditOutcome::Prune(message_ref) => {
                    summary.pruned += 1;
                    lobby.messages.retain(|m| m != &message_ref);
                }
            }
        }
        summary
    }

    #[allow(clippy::too_many_arguments)]
    async fn edit_status(
        &self,
        lobby: &Lobby,
        message_ref: MessageRef,
        status: LobbyStatus,
        source: DataSource,
        alert: Option<&Alert>,
        replay: Option<ReplayId>,
        now: DateTime<Utc>,
    ) -> EditOutcome {
        if status != LobbyStatus::Dead && !self.limiter.try_acquire(&message_ref.channel, now) {
            return EditOutcome::Shed;
        }

        let payload = OutboundMessage {
            content: None,
            embeds: vec![build_lobby_embed(
                lobby,
                status,
                source,
                alert.and_then(|a| a.advanced.as_ref()),
                replay.map(|id| (id, self.replay_link_base.as_str())),
            )],
            allowed_mentions: None,
        };

        match self
            .chat
            .edit_message(&message_ref.channel, &message_ref.message, &payload)
            .await
        {
            Ok(()) => {
                debug!(
                    lobby = %lobby.name,
                    channel = %message_ref.channel,
                    %status,
                    slots = format!("{}/{}", lobby.slots_taken, lobby.slots_total),
                    "Updated lobby message"
                );
                EditOutcome::Delivered
            }
            Err(ChatError::UnknownMessage { .. }) => {
                warn!(channel = %message_ref.channel, "Tracked message was deleted, pruning");
                EditOutcome::Prune(message_ref)
            }
            Err(e) => {
                error!(channel = %message_ref.channel, error = %e, "Error updating message");
                EditOutcome::Failed
            }
        }
    }

    /// Deactivate an alert whose destination is permanently unusable and
    /// tell the operator. The triggering error is not propagated.
    async fn deactivate_alert(&self, channel_id: &str, cause: &ChatError) {
        warn!(channel = channel_id, error = %cause, "Removing alert, destination unusable");
        if let Err(e) = self.alerts.delete_alert(channel_id).await {
            error!(channel = channel_id, error = %e, "Failed to delete alert");
        }
        self.notify_operator(&format!(
            "Removing alert for channel {channel_id}: {cause}"
        ))
        .await;
    }

    /// Post a status/error announcement to the reserved operator channel
    pub async fn notify_operator(&self, content: &str) {
        let payload = OutboundMessage {
            content: Some(content.to_string()),
            embeds: Vec::new(),
            allowed_mentions: None,
        };
        if let Err(e) = self
            .chat
            .create_message(&self.operator_channel, &payload)
            .await
        {
            error!(error = %e, "Failed to notify operator channel");
        }
    }
}

#[async_trait]
impl SourceAnnouncer for Dispatcher {
    async fn announce_source(&self, source: DataSource) {
        self.notify_operator(&format!("Lobby feed: {source}")).await;
    }
}
