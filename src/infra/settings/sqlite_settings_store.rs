// SQLite-backed guild settings store.

use crate::core::settings::{GuildSettings, SettingsError, SettingsStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteSettingsStore {
    pool: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_settings(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError> {
        let row = sqlx::query(
            "SELECT prefix, spam_filter_enabled, leveling_enabled \
             FROM guild_settings WHERE guild_id = ?",
        )
        .bind(guild_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SettingsError::StorageError(e.to_string()))?;

        Ok(row.map(|row| GuildSettings {
            guild_id,
            prefix: row.get::<String, _>("prefix"),
            spam_filter_enabled: row.get::<i64, _>("spam_filter_enabled") != 0,
            leveling_enabled: row.get::<i64, _>("leveling_enabled") != 0,
        }))
    }

    async fn save_settings(&self, settings: &GuildSettings) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, prefix, spam_filter_enabled, leveling_enabled)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                prefix = excluded.prefix,
                spam_filter_enabled = excluded.spam_filter_enabled,
                leveling_enabled = excluded.leveling_enabled
            "#,
        )
        .bind(settings.guild_id.to_string())
        .bind(&settings.prefix)
        .bind(i64::from(settings.spam_filter_enabled))
        .bind(i64::from(settings.leveling_enabled))
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsError::StorageError(e.to_string()))?;

        Ok(())
    }
}
