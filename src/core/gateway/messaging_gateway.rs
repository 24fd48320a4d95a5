// The messaging gateway port: everything the command handlers need
// from the chat platform, defined here so the core never imports the
// Discord client. The Discord layer provides the serenity-backed
// implementation; tests provide recording mocks.

use async_trait::async_trait;
use thiserror::Error;

/// A recent channel message, as much of it as the purge logic needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchedMessage {
    pub id: u64,
    /// Unix timestamp (seconds) the message was sent.
    pub sent_at: i64,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The platform refused the action for lack of permission.
    #[error("{0}")]
    PermissionDenied(String),

    /// Any other rejection from the platform. Never retried.
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send plain text to a channel, returning the new message's id.
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<u64, GatewayError>;

    /// Delete a batch of messages from a channel.
    async fn delete_messages(&self, channel_id: u64, message_ids: &[u64])
        -> Result<(), GatewayError>;

    async fn ban_user(&self, guild_id: u64, user_id: u64, reason: &str)
        -> Result<(), GatewayError>;

    async fn kick_user(&self, guild_id: u64, user_id: u64, reason: &str)
        -> Result<(), GatewayError>;

    async fn unban_user(&self, guild_id: u64, user_id: u64) -> Result<(), GatewayError>;

    /// Silence a user for `minutes` from now.
    async fn timeout_user(
        &self,
        guild_id: u64,
        user_id: u64,
        minutes: u32,
    ) -> Result<(), GatewayError>;

    /// The most recent `count` messages in a channel, newest first.
    async fn fetch_recent_messages(
        &self,
        channel_id: u64,
        count: u8,
    ) -> Result<Vec<FetchedMessage>, GatewayError>;
}
