// Entry point for the bot.
//
// **Architecture overview:**
// - `core/` = business logic (platform-agnostic)
// - `infra/` = implementations of core traits (SQLite stores)
// - `discord/` = Discord-specific adapters (commands, events, gateway)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Run until the gateway stops or Ctrl-C arrives

// These attrs point each module declaration at a more descriptive root
// file so we don't end up with a pile of identical-looking mod.rs files.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::leveling::LevelingService;
use crate::core::moderation::ModerationService;
use crate::core::random::{RandomSource, StdRandomSource};
use crate::core::router::CommandRouter;
use crate::core::settings::SettingsService;
use crate::discord::{Data, Error};
use crate::infra::leveling::SqliteXpStore;
use crate::infra::moderation::SqliteModerationStore;
use crate::infra::settings::SqliteSettingsStore;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Route non-command gateway events. Only messages matter here: they
/// carry DM auto-replies, prefix commands, and XP.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        discord::events::handle_message(ctx, data, new_message).await?;
    }
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        // Render the platform's permission refusal with the configured
        // template instead of poise's default text.
        poise::FrameworkError::MissingUserPermissions { ctx, .. } => {
            let message = ctx.data().config.permission_message(ctx.author().id.get());
            if let Err(error) = ctx
                .send(poise::CreateReply::default().content(message).ephemeral(true))
                .await
            {
                tracing::error!(%error, "Failed to send permission refusal");
            }
        }
        other => {
            if let Err(error) = poise::builtins::on_error(other).await {
                tracing::error!(%error, "Error while handling command error");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening.
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists).
    dotenv::dotenv().ok();

    // Config path: CLI argument, then CONFIG_PATH, then ./config.json.
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| "config.json".to_string());
    let config = Arc::new(BotConfig::load(&config_path)?);

    if config.discord_token.is_empty() {
        anyhow::bail!(
            "no Discord token configured: set discord_token in {config_path} \
             or the DISCORD_TOKEN environment variable"
        );
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // One SQLite file, one pool, stores per subsystem, services over
    // the stores. This is the composition root - nothing below main
    // reaches for globals.

    let pool = infra::db::connect(&config.database_path)
        .await
        .context("failed to open the database")?;
    infra::db::migrate(&pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!(path = %config.database_path, "Database ready");

    let rng: Arc<dyn RandomSource> = Arc::new(StdRandomSource::from_entropy());
    let settings = Arc::new(SettingsService::new(
        SqliteSettingsStore::new(pool.clone()),
        config.default_prefix.clone(),
    ));
    let leveling = Arc::new(LevelingService::new(
        SqliteXpStore::new(pool.clone()),
        Arc::clone(&rng),
    ));
    let moderation = Arc::new(ModerationService::new(SqliteModerationStore::new(
        pool.clone(),
    )));
    let router = Arc::new(CommandRouter::new(
        Arc::clone(&settings),
        Arc::clone(&leveling),
        Arc::clone(&moderation),
        rng,
        config.default_prefix.clone(),
    ));

    let data = Data {
        router,
        settings,
        leveling,
        config: Arc::clone(&config),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                discord::commands::utility::ping(),
                discord::commands::utility::help(),
                discord::commands::utility::source(),
                discord::commands::utility::prefix(),
                discord::commands::utility::xp(),
                discord::commands::utility::leaderboard(),
                discord::commands::moderation::ban(),
                discord::commands::moderation::kick(),
                discord::commands::moderation::unban(),
                discord::commands::moderation::timeout(),
                discord::commands::moderation::clean(),
                discord::commands::moderation::mod_stats(),
                discord::commands::fun::eight_ball(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                // Global registration can take a while to propagate;
                // for instant updates during development, register in a
                // test guild instead.
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!(user = %ready.user.name, "Connected, commands registered");

                ctx.set_presence(
                    Some(serenity::ActivityData::watching("over the server")),
                    serenity::OnlineStatus::Online,
                );

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("failed to create the Discord client")?;

    // Exit 0 on interrupt: shut the shards down and let start() return.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client
        .start()
        .await
        .context("gateway connection failed")?;

    Ok(())
}
