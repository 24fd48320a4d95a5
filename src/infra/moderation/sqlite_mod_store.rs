// SQLite-backed moderation store: the append-only action ledger and
// the spam-warning counters.

use crate::core::moderation::{
    ActionKind, ModAction, ModStats, ModerationError, ModerationStore, NewModAction,
};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteModerationStore {
    pool: Pool<Sqlite>,
}

impl SqliteModerationStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn parse_id(row: &SqliteRow, column: &str) -> Result<u64, ModerationError> {
    row.get::<String, _>(column)
        .parse()
        .map_err(|_| ModerationError::StorageError(format!("corrupt id in column {column}")))
}

#[async_trait]
impl ModerationStore for SqliteModerationStore {
    async fn append_action(&self, action: &NewModAction) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO mod_actions (guild_id, moderator_id, target_id, action_type, reason, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(action.guild_id.to_string())
        .bind(action.moderator_id.to_string())
        .bind(action.target_id.to_string())
        .bind(action.kind.as_str())
        .bind(&action.reason)
        .bind(action.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn recent_actions(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<ModAction>, ModerationError> {
        let rows = sqlx::query(
            "SELECT id, moderator_id, target_id, action_type, reason, timestamp \
             FROM mod_actions WHERE guild_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(guild_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let kind_str: String = row.get("action_type");
                let kind = ActionKind::parse(&kind_str).ok_or_else(|| {
                    ModerationError::StorageError(format!("unknown action type {kind_str}"))
                })?;
                Ok(ModAction {
                    id: row.get("id"),
                    guild_id,
                    moderator_id: parse_id(row, "moderator_id")?,
                    target_id: parse_id(row, "target_id")?,
                    kind,
                    reason: row
                        .get::<Option<String>, _>("reason")
                        .unwrap_or_else(|| crate::core::moderation::DEFAULT_REASON.to_string()),
                    timestamp: row.get("timestamp"),
                })
            })
            .collect()
    }

    async fn action_stats(
        &self,
        guild_id: u64,
        moderator_id: u64,
    ) -> Result<ModStats, ModerationError> {
        let rows = sqlx::query(
            "SELECT action_type, COUNT(*) AS count FROM mod_actions \
             WHERE guild_id = ? AND moderator_id = ? GROUP BY action_type",
        )
        .bind(guild_id.to_string())
        .bind(moderator_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        let mut stats = ModStats::default();
        for row in rows {
            let kind: String = row.get("action_type");
            let count = row.get::<i64, _>("count") as u32;
            match kind.as_str() {
                "ban" => stats.bans = count,
                "kick" => stats.kicks = count,
                "timeout" => stats.timeouts = count,
                // Unbans stay out of the stats triple.
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn add_spam_warning(
        &self,
        user_id: u64,
        guild_id: u64,
        timestamp: i64,
    ) -> Result<u32, ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO spam_warnings (user_id, guild_id, warnings, last_warning)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(user_id, guild_id) DO UPDATE SET
                warnings = warnings + 1,
                last_warning = excluded.last_warning
            "#,
        )
        .bind(user_id.to_string())
        .bind(guild_id.to_string())
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        self.spam_warnings(user_id, guild_id).await
    }

    async fn spam_warnings(&self, user_id: u64, guild_id: u64) -> Result<u32, ModerationError> {
        let row =
            sqlx::query("SELECT warnings FROM spam_warnings WHERE user_id = ? AND guild_id = ?")
                .bind(user_id.to_string())
                .bind(guild_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(row.map(|row| row.get::<i64, _>("warnings") as u32).unwrap_or(0))
    }

    async fn reset_spam_warnings(
        &self,
        user_id: u64,
        guild_id: u64,
    ) -> Result<(), ModerationError> {
        sqlx::query("DELETE FROM spam_warnings WHERE user_id = ? AND guild_id = ?")
            .bind(user_id.to_string())
            .bind(guild_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::test_support::temp_pool;

    fn action(kind: ActionKind, target_id: u64, timestamp: i64) -> NewModAction {
        NewModAction {
            guild_id: 500,
            moderator_id: 700,
            target_id,
            kind,
            reason: "test".to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn ledger_appends_and_reads_back_newest_first() {
        let (pool, _dir) = temp_pool().await;
        let store = SqliteModerationStore::new(pool);

        store
            .append_action(&action(ActionKind::Ban, 1, 1000))
            .await
            .unwrap();
        store
            .append_action(&action(ActionKind::Kick, 2, 1001))
            .await
            .unwrap();

        let log = store.recent_actions(500, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, ActionKind::Kick);
        assert_eq!(log[0].target_id, 2);
        assert_eq!(log[1].kind, ActionKind::Ban);
        assert!(log[0].id > log[1].id);
    }

    #[tokio::test]
    async fn stats_group_by_kind_and_ignore_unbans() {
        let (pool, _dir) = temp_pool().await;
        let store = SqliteModerationStore::new(pool);

        store
            .append_action(&action(ActionKind::Ban, 1, 1000))
            .await
            .unwrap();
        store
            .append_action(&action(ActionKind::Ban, 2, 1001))
            .await
            .unwrap();
        store
            .append_action(&action(ActionKind::Kick, 3, 1002))
            .await
            .unwrap();
        store
            .append_action(&action(ActionKind::Unban, 1, 1003))
            .await
            .unwrap();

        let stats = store.action_stats(500, 700).await.unwrap();
        assert_eq!(stats.bans, 2);
        assert_eq!(stats.kicks, 1);
        assert_eq!(stats.timeouts, 0);
    }

    #[tokio::test]
    async fn stats_for_unknown_moderator_are_zero() {
        let (pool, _dir) = temp_pool().await;
        let store = SqliteModerationStore::new(pool);

        let stats = store.action_stats(500, 999).await.unwrap();
        assert_eq!(stats, ModStats::default());
    }

    #[tokio::test]
    async fn spam_warning_counter_upserts_and_resets() {
        let (pool, _dir) = temp_pool().await;
        let store = SqliteModerationStore::new(pool);

        assert_eq!(store.add_spam_warning(5, 500, 1000).await.unwrap(), 1);
        assert_eq!(store.add_spam_warning(5, 500, 1001).await.unwrap(), 2);
        assert_eq!(store.spam_warnings(5, 500).await.unwrap(), 2);

        store.reset_spam_warnings(5, 500).await.unwrap();
        assert_eq!(store.spam_warnings(5, 500).await.unwrap(), 0);
    }
}
