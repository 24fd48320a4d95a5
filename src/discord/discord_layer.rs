// Discord layer - commands, event handlers, and the serenity-backed
// gateway. Everything here is translation: extract primitives from
// Discord types, call into core, send back whatever core rendered.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "gateway/serenity_gateway.rs"]
pub mod gateway;

#[path = "events/message_events.rs"]
pub mod events;

use crate::config::BotConfig;
use crate::core::leveling::LevelingService;
use crate::core::router::CommandRouter;
use crate::core::settings::SettingsService;
use crate::infra::leveling::SqliteXpStore;
use crate::infra::moderation::SqliteModerationStore;
use crate::infra::settings::SqliteSettingsStore;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// The router instantiated with the production stores.
pub type Router = CommandRouter<SqliteSettingsStore, SqliteXpStore, SqliteModerationStore>;

/// Data shared across all commands and event handlers.
pub struct Data {
    pub router: Arc<Router>,
    pub settings: Arc<SettingsService<SqliteSettingsStore>>,
    pub leveling: Arc<LevelingService<SqliteXpStore>>,
    pub config: Arc<BotConfig>,
}
