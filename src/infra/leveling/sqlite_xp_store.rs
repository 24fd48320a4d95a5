// SQLite-backed XP store.
//
// Ids are stored as decimal TEXT; the leaderboard casts them back to
// integers so ties still break in numeric id order.

use crate::core::leveling::{LevelingError, UserXp, XpStore};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteXpStore {
    pool: Pool<Sqlite>,
}

impl SqliteXpStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn parse_id(row: &SqliteRow, column: &str) -> Result<u64, LevelingError> {
    row.get::<String, _>(column)
        .parse()
        .map_err(|_| LevelingError::StorageError(format!("corrupt id in column {column}")))
}

#[async_trait]
impl XpStore for SqliteXpStore {
    async fn get_user_xp(&self, user_id: u64, guild_id: u64) -> Result<UserXp, LevelingError> {
        let row = sqlx::query("SELECT xp, level FROM user_xp WHERE user_id = ? AND guild_id = ?")
            .bind(user_id.to_string())
            .bind(guild_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(match row {
            Some(row) => UserXp {
                user_id,
                guild_id,
                xp: row.get::<i64, _>("xp") as u64,
                level: row.get::<i64, _>("level") as u32,
            },
            None => UserXp {
                user_id,
                guild_id,
                xp: 0,
                level: 0,
            },
        })
    }

    async fn add_xp(&self, user_id: u64, guild_id: u64, amount: u64) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO user_xp (user_id, guild_id, xp, level)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(user_id, guild_id) DO UPDATE SET xp = xp + excluded.xp
            "#,
        )
        .bind(user_id.to_string())
        .bind(guild_id.to_string())
        .bind(amount as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn set_level(
        &self,
        user_id: u64,
        guild_id: u64,
        level: u32,
    ) -> Result<(), LevelingError> {
        sqlx::query("UPDATE user_xp SET level = ? WHERE user_id = ? AND guild_id = ?")
            .bind(i64::from(level))
            .bind(user_id.to_string())
            .bind(guild_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<UserXp>, LevelingError> {
        let rows = sqlx::query(
            "SELECT user_id, xp, level FROM user_xp WHERE guild_id = ? \
             ORDER BY xp DESC, CAST(user_id AS INTEGER) ASC LIMIT ?",
        )
        .bind(guild_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(UserXp {
                    user_id: parse_id(row, "user_id")?,
                    guild_id,
                    xp: row.get::<i64, _>("xp") as u64,
                    level: row.get::<i64, _>("level") as u32,
                })
            })
            .collect()
    }
}
