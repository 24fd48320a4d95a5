// SQLite bootstrap: one database file, one shared pool, all
// migrations in one place.
//
// Tables (ids are stored as decimal TEXT so 64-bit snowflakes survive
// any tooling that reads the file as JSON or CSV):
// - guild_settings: per-guild prefix and feature flags
// - user_xp: per-guild-per-user XP ledger
// - mod_actions: append-only moderation audit log
// - spam_warnings: per-guild-per-user warning counters
// - auto_clean_config: reserved for a scheduled-purge feature; created
//   for schema compatibility, never read

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Open (creating if missing) the bot's database file.
pub async fn connect(database_path: &str) -> anyhow::Result<Pool<Sqlite>> {
    if database_path != ":memory:" && !Path::new(database_path).exists() {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::File::create(database_path)?;
    }

    let pool = SqlitePoolOptions::new()
        .connect(&format!("sqlite://{database_path}"))
        .await?;
    Ok(pool)
}

/// Create every table the stores expect. Idempotent.
pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS guild_settings (
            guild_id TEXT PRIMARY KEY,
            prefix TEXT DEFAULT '.',
            spam_filter_enabled INTEGER DEFAULT 0,
            leveling_enabled INTEGER DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_xp (
            user_id TEXT NOT NULL,
            guild_id TEXT NOT NULL,
            xp INTEGER DEFAULT 0,
            level INTEGER DEFAULT 0,
            PRIMARY KEY (user_id, guild_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mod_actions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id TEXT NOT NULL,
            moderator_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            action_type TEXT NOT NULL,
            reason TEXT,
            timestamp INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spam_warnings (
            user_id TEXT NOT NULL,
            guild_id TEXT NOT NULL,
            warnings INTEGER DEFAULT 0,
            last_warning INTEGER,
            PRIMARY KEY (user_id, guild_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auto_clean_config (
            guild_id TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            interval_minutes INTEGER DEFAULT 60,
            message_count INTEGER DEFAULT 100,
            enabled INTEGER DEFAULT 1,
            PRIMARY KEY (guild_id, channel_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_mod_actions_guild ON mod_actions(guild_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mod_actions_moderator ON mod_actions(moderator_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_xp_guild ON user_xp(guild_id)")
        .execute(pool)
        .await?;

    Ok(())
}
