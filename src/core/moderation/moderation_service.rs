// The moderation ledger: an append-only record of every ban, kick,
// unban, and timeout, plus the spam-warning counters.
//
// Records are immutable once written. Stats aggregate per moderator;
// unbans are recorded for the audit trail but deliberately excluded
// from the stats triple.

use async_trait::async_trait;
use thiserror::Error;

/// Stored when a reason was not supplied.
pub const DEFAULT_REASON: &str = "No reason provided";

/// The closed set of recordable actions. Invalid kinds are
/// unrepresentable, so the ledger never needs to validate strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Ban,
    Kick,
    Unban,
    Timeout,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Ban => "ban",
            ActionKind::Kick => "kick",
            ActionKind::Unban => "unban",
            ActionKind::Timeout => "timeout",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ban" => Some(ActionKind::Ban),
            "kick" => Some(ActionKind::Kick),
            "unban" => Some(ActionKind::Unban),
            "timeout" => Some(ActionKind::Timeout),
            _ => None,
        }
    }
}

/// One row of the ledger, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModAction {
    pub id: i64,
    pub guild_id: u64,
    pub moderator_id: u64,
    pub target_id: u64,
    pub kind: ActionKind,
    pub reason: String,
    pub timestamp: i64,
}

/// A row to append. The store assigns the sequence id.
#[derive(Debug, Clone)]
pub struct NewModAction {
    pub guild_id: u64,
    pub moderator_id: u64,
    pub target_id: u64,
    pub kind: ActionKind,
    pub reason: String,
    pub timestamp: i64,
}

/// Per-moderator counts. Unbans are not part of this triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModStats {
    pub bans: u32,
    pub kicks: u32,
    pub timeouts: u32,
}

impl ModStats {
    pub fn total(self) -> u32 {
        self.bans + self.kicks + self.timeouts
    }
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Trait for persisting moderation data.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Append one ledger row.
    async fn append_action(&self, action: &NewModAction) -> Result<(), ModerationError>;

    /// Most recent actions first, at most `limit`.
    async fn recent_actions(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<ModAction>, ModerationError>;

    /// Group-by-count of a moderator's ban/kick/timeout rows.
    async fn action_stats(
        &self,
        guild_id: u64,
        moderator_id: u64,
    ) -> Result<ModStats, ModerationError>;

    /// Increment the spam-warning counter, returning the new count.
    async fn add_spam_warning(
        &self,
        user_id: u64,
        guild_id: u64,
        timestamp: i64,
    ) -> Result<u32, ModerationError>;

    /// Current warning count (0 when absent).
    async fn spam_warnings(&self, user_id: u64, guild_id: u64) -> Result<u32, ModerationError>;

    /// Drop the warning row entirely.
    async fn reset_spam_warnings(&self, user_id: u64, guild_id: u64)
        -> Result<(), ModerationError>;
}

pub struct ModerationService<S: ModerationStore> {
    store: S,
}

impl<S: ModerationStore> ModerationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Append an action to the ledger. An empty or missing reason is
    /// replaced with the fixed sentinel before the row is written.
    pub async fn record(
        &self,
        guild_id: u64,
        moderator_id: u64,
        target_id: u64,
        kind: ActionKind,
        reason: Option<&str>,
        timestamp: i64,
    ) -> Result<(), ModerationError> {
        let reason = match reason {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => DEFAULT_REASON.to_string(),
        };

        self.store
            .append_action(&NewModAction {
                guild_id,
                moderator_id,
                target_id,
                kind,
                reason,
                timestamp,
            })
            .await
    }

    /// (bans, kicks, timeouts) for one moderator in one guild.
    pub async fn stats_for(
        &self,
        guild_id: u64,
        moderator_id: u64,
    ) -> Result<ModStats, ModerationError> {
        self.store.action_stats(guild_id, moderator_id).await
    }

    /// The full audit log, most recent first.
    #[allow(dead_code)]
    pub async fn action_log(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<ModAction>, ModerationError> {
        self.store.recent_actions(guild_id, limit).await
    }

    // Spam-warning surface. No command drives these yet; they exist for
    // the spam filter flag in guild settings to hook into.

    #[allow(dead_code)]
    pub async fn add_spam_warning(
        &self,
        user_id: u64,
        guild_id: u64,
        timestamp: i64,
    ) -> Result<u32, ModerationError> {
        self.store
            .add_spam_warning(user_id, guild_id, timestamp)
            .await
    }

    #[allow(dead_code)]
    pub async fn spam_warnings(&self, user_id: u64, guild_id: u64) -> Result<u32, ModerationError> {
        self.store.spam_warnings(user_id, guild_id).await
    }

    #[allow(dead_code)]
    pub async fn reset_spam_warnings(
        &self,
        user_id: u64,
        guild_id: u64,
    ) -> Result<(), ModerationError> {
        self.store.reset_spam_warnings(user_id, guild_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Mutex;

    struct MockModerationStore {
        actions: Mutex<Vec<ModAction>>,
        warnings: DashMap<(u64, u64), (u32, i64)>,
    }

    impl MockModerationStore {
        fn new() -> Self {
            Self {
                actions: Mutex::new(Vec::new()),
                warnings: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl ModerationStore for MockModerationStore {
        async fn append_action(&self, action: &NewModAction) -> Result<(), ModerationError> {
            let mut actions = self.actions.lock().unwrap();
            let id = actions.len() as i64 + 1;
            actions.push(ModAction {
                id,
                guild_id: action.guild_id,
                moderator_id: action.moderator_id,
                target_id: action.target_id,
                kind: action.kind,
                reason: action.reason.clone(),
                timestamp: action.timestamp,
            });
            Ok(())
        }

        async fn recent_actions(
            &self,
            guild_id: u64,
            limit: usize,
        ) -> Result<Vec<ModAction>, ModerationError> {
            let actions = self.actions.lock().unwrap();
            let mut rows: Vec<ModAction> = actions
                .iter()
                .filter(|a| a.guild_id == guild_id)
                .cloned()
                .collect();
            rows.reverse();
            rows.truncate(limit);
            Ok(rows)
        }

        async fn action_stats(
            &self,
            guild_id: u64,
            moderator_id: u64,
        ) -> Result<ModStats, ModerationError> {
            let actions = self.actions.lock().unwrap();
            let mut stats = ModStats::default();
            for action in actions
                .iter()
                .filter(|a| a.guild_id == guild_id && a.moderator_id == moderator_id)
            {
                match action.kind {
                    ActionKind::Ban => stats.bans += 1,
                    ActionKind::Kick => stats.kicks += 1,
                    ActionKind::Timeout => stats.timeouts += 1,
                    ActionKind::Unban => {}
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
            let mut entry = self.warnings.entry((user_id, guild_id)).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = timestamp;
            Ok(entry.0)
        }

        async fn spam_warnings(
            &self,
            user_id: u64,
            guild_id: u64,
        ) -> Result<u32, ModerationError> {
            Ok(self
                .warnings
                .get(&(user_id, guild_id))
                .map(|e| e.0)
                .unwrap_or(0))
        }

        async fn reset_spam_warnings(
            &self,
            user_id: u64,
            guild_id: u64,
        ) -> Result<(), ModerationError> {
            self.warnings.remove(&(user_id, guild_id));
            Ok(())
        }
    }

    fn make_service() -> ModerationService<MockModerationStore> {
        ModerationService::new(MockModerationStore::new())
    }

    #[tokio::test]
    async fn stats_count_per_kind_and_exclude_unbans() {
        let service = make_service();

        service
            .record(1, 100, 200, ActionKind::Ban, Some("spam"), 1000)
            .await
            .unwrap();
        service
            .record(1, 100, 201, ActionKind::Ban, None, 1001)
            .await
            .unwrap();
        service
            .record(1, 100, 202, ActionKind::Kick, Some("rude"), 1002)
            .await
            .unwrap();
        service
            .record(1, 100, 201, ActionKind::Unban, Some("appealed"), 1003)
            .await
            .unwrap();

        let stats = service.stats_for(1, 100).await.unwrap();
        assert_eq!(stats, ModStats {
            bans: 2,
            kicks: 1,
            timeouts: 0,
        });
        assert_eq!(stats.total(), 3);

        // The unban is still in the full log.
        let log = service.action_log(1, 100).await.unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].kind, ActionKind::Unban);
    }

    #[tokio::test]
    async fn stats_are_scoped_to_moderator_and_guild() {
        let service = make_service();

        service
            .record(1, 100, 200, ActionKind::Ban, None, 1000)
            .await
            .unwrap();
        service
            .record(1, 101, 200, ActionKind::Kick, None, 1001)
            .await
            .unwrap();
        service
            .record(2, 100, 200, ActionKind::Timeout, None, 1002)
            .await
            .unwrap();

        let stats = service.stats_for(1, 100).await.unwrap();
        assert_eq!(stats.bans, 1);
        assert_eq!(stats.kicks, 0);
        assert_eq!(stats.timeouts, 0);
    }

    #[tokio::test]
    async fn missing_reason_becomes_sentinel() {
        let service = make_service();

        service
            .record(1, 100, 200, ActionKind::Kick, None, 1000)
            .await
            .unwrap();
        service
            .record(1, 100, 201, ActionKind::Kick, Some("   "), 1001)
            .await
            .unwrap();

        let log = service.action_log(1, 10).await.unwrap();
        assert!(log.iter().all(|a| a.reason == DEFAULT_REASON));
    }

    #[tokio::test]
    async fn unknown_moderator_has_zeroed_stats() {
        let service = make_service();
        let stats = service.stats_for(1, 999).await.unwrap();
        assert_eq!(stats, ModStats::default());
    }

    #[tokio::test]
    async fn spam_warnings_increment_and_reset() {
        let service = make_service();

        assert_eq!(service.spam_warnings(5, 1).await.unwrap(), 0);
        assert_eq!(service.add_spam_warning(5, 1, 1000).await.unwrap(), 1);
        assert_eq!(service.add_spam_warning(5, 1, 1001).await.unwrap(), 2);
        assert_eq!(service.spam_warnings(5, 1).await.unwrap(), 2);

        service.reset_spam_warnings(5, 1).await.unwrap();
        assert_eq!(service.spam_warnings(5, 1).await.unwrap(), 0);
    }

    #[test]
    fn action_kind_round_trips_through_strings() {
        for kind in [
            ActionKind::Ban,
            ActionKind::Kick,
            ActionKind::Unban,
            ActionKind::Timeout,
        ] {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::parse("warn"), None);
    }
}
