// Serenity-backed implementation of the MessagingGateway port.
//
// Permission refusals (HTTP 403) are mapped to their own error kind so
// the router can report them distinctly from other rejections.

use crate::core::gateway::{FetchedMessage, GatewayError, MessagingGateway};
use async_trait::async_trait;
use serenity::builder::{EditMember, GetMessages};
use serenity::http::{Http, HttpError};
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use serenity::model::Timestamp;
use std::sync::Arc;

pub struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn map_err(error: serenity::Error) -> GatewayError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(ref response)) = error {
        if response.status_code.as_u16() == 403 {
            return GatewayError::PermissionDenied(response.error.message.clone());
        }
    }
    GatewayError::Failed(error.to_string())
}

#[async_trait]
impl MessagingGateway for SerenityGateway {
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<u64, GatewayError> {
        let message = ChannelId::new(channel_id)
            .say(self.http.as_ref(), text)
            .await
            .map_err(map_err)?;
        Ok(message.id.get())
    }

    async fn delete_messages(
        &self,
        channel_id: u64,
        message_ids: &[u64],
    ) -> Result<(), GatewayError> {
        let channel = ChannelId::new(channel_id);
        match message_ids {
            [] => Ok(()),
            // Bulk deletion needs at least two messages.
            [only] => channel
                .delete_message(self.http.as_ref(), MessageId::new(*only))
                .await
                .map_err(map_err),
            many => {
                let ids: Vec<MessageId> = many.iter().map(|&id| MessageId::new(id)).collect();
                channel
                    .delete_messages(self.http.as_ref(), &ids)
                    .await
                    .map_err(map_err)
            }
        }
    }

    async fn ban_user(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), GatewayError> {
        GuildId::new(guild_id)
            .ban_with_reason(self.http.as_ref(), UserId::new(user_id), 0, reason)
            .await
            .map_err(map_err)
    }

    async fn kick_user(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), GatewayError> {
        GuildId::new(guild_id)
            .kick_with_reason(self.http.as_ref(), UserId::new(user_id), reason)
            .await
            .map_err(map_err)
    }

    async fn unban_user(&self, guild_id: u64, user_id: u64) -> Result<(), GatewayError> {
        GuildId::new(guild_id)
            .unban(self.http.as_ref(), UserId::new(user_id))
            .await
            .map_err(map_err)
    }

    async fn timeout_user(
        &self,
        guild_id: u64,
        user_id: u64,
        minutes: u32,
    ) -> Result<(), GatewayError> {
        let until_secs = chrono::Utc::now().timestamp() + i64::from(minutes) * 60;
        let until = Timestamp::from_unix_timestamp(until_secs)
            .map_err(|e| GatewayError::Failed(format!("invalid timeout duration: {e}")))?;

        GuildId::new(guild_id)
            .edit_member(
                self.http.as_ref(),
                UserId::new(user_id),
                EditMember::new().disable_communication_until_datetime(until),
            )
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn fetch_recent_messages(
        &self,
        channel_id: u64,
        count: u8,
    ) -> Result<Vec<FetchedMessage>, GatewayError> {
        let messages = ChannelId::new(channel_id)
            .messages(self.http.as_ref(), GetMessages::new().limit(count))
            .await
            .map_err(map_err)?;

        Ok(messages
            .iter()
            .map(|message| FetchedMessage {
                id: message.id.get(),
                sent_at: message.timestamp.unix_timestamp(),
            })
            .collect())
    }
}
