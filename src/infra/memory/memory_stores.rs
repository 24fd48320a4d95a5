// In-memory implementations of the store traits.
//
// These exist so the router and service tests can run against real
// store semantics without setting up SQLite. They follow the same
// contracts as the sqlx-backed stores, including leaderboard ordering
// and ledger sequence ids.

use crate::core::leveling::{LevelingError, UserXp, XpStore};
use crate::core::moderation::{
    ActionKind, ModAction, ModStats, ModerationError, ModerationStore, NewModAction,
};
use crate::core::settings::{GuildSettings, SettingsError, SettingsStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;

pub struct InMemorySettingsStore {
    rows: DashMap<u64, GuildSettings>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_settings(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError> {
        Ok(self.rows.get(&guild_id).map(|row| row.clone()))
    }

    async fn save_settings(&self, settings: &GuildSettings) -> Result<(), SettingsError> {
        self.rows.insert(settings.guild_id, settings.clone());
        Ok(())
    }
}

pub struct InMemoryXpStore {
    rows: DashMap<(u64, u64), (u64, u32)>,
}

impl InMemoryXpStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

#[async_trait]
impl XpStore for InMemoryXpStore {
    async fn get_user_xp(&self, user_id: u64, guild_id: u64) -> Result<UserXp, LevelingError> {
        let (xp, level) = self
            .rows
            .get(&(user_id, guild_id))
            .map(|row| *row)
            .unwrap_or((0, 0));
        Ok(UserXp {
            user_id,
            guild_id,
            xp,
            level,
        })
    }

    async fn add_xp(&self, user_id: u64, guild_id: u64, amount: u64) -> Result<(), LevelingError> {
        self.rows
            .entry((user_id, guild_id))
            .and_modify(|(xp, _)| *xp = xp.saturating_add(amount))
            .or_insert((amount, 0));
        Ok(())
    }

    async fn set_level(
        &self,
        user_id: u64,
        guild_id: u64,
        level: u32,
    ) -> Result<(), LevelingError> {
        if let Some(mut row) = self.rows.get_mut(&(user_id, guild_id)) {
            row.1 = level;
        }
        Ok(())
    }

    async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<UserXp>, LevelingError> {
        let mut rows: Vec<UserXp> = self
            .rows
            .iter()
            .filter(|entry| entry.key().1 == guild_id)
            .map(|entry| UserXp {
                user_id: entry.key().0,
                guild_id,
                xp: entry.value().0,
                level: entry.value().1,
            })
            .collect();
        // XP descending, ties by ascending user id.
        rows.sort_by(|a, b| b.xp.cmp(&a.xp).then(a.user_id.cmp(&b.user_id)));
        rows.truncate(limit);
        Ok(rows)
    }
}

pub struct InMemoryModerationStore {
    actions: Mutex<Vec<ModAction>>,
    warnings: DashMap<(u64, u64), (u32, i64)>,
}

impl InMemoryModerationStore {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            warnings: DashMap::new(),
        }
    }
}

#[async_trait]
impl ModerationStore for InMemoryModerationStore {
    async fn append_action(&self, action: &NewModAction) -> Result<(), ModerationError> {
        let mut actions = self.actions.lock().expect("action log lock poisoned");
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
        let actions = self.actions.lock().expect("action log lock poisoned");
        let mut rows: Vec<ModAction> = actions
            .iter()
            .filter(|action| action.guild_id == guild_id)
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
        let actions = self.actions.lock().expect("action log lock poisoned");
        let mut stats = ModStats::default();
        for action in actions
            .iter()
            .filter(|a| a.guild_id == guild_id && a.moderator_id == moderator_id)
        {
            match action.kind {
                ActionKind::Ban => stats.bans += 1,
                ActionKind::Kick => stats.kicks += 1,
                ActionKind::Timeout => stats.timeouts += 1,
                // Audit-only; never counted.
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

    async fn spam_warnings(&self, user_id: u64, guild_id: u64) -> Result<u32, ModerationError> {
        Ok(self
            .warnings
            .get(&(user_id, guild_id))
            .map(|entry| entry.0)
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
