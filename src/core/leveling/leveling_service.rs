// The leveling engine: XP accumulation and level computation.
//
// Level is derived from total XP with a square-root curve and persisted
// alongside it. The stored level only ever ratchets upward - the engine
// writes a new level exactly when the computed value exceeds what is
// stored, and that is also the moment a level-up event is emitted for
// the caller to announce.

use crate::core::random::RandomSource;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Message XP roll bounds: uniform in [15, 26), i.e. 11 possible values.
pub const XP_ROLL_MIN: u64 = 15;
pub const XP_ROLL_MAX_EXCLUSIVE: u64 = 26;

/// A user's XP row for one guild. Missing rows read as xp=0, level=0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserXp {
    pub user_id: u64,
    pub guild_id: u64,
    pub xp: u64,
    pub level: u32,
}

/// Emitted when a message roll pushes a user past a level threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUpEvent {
    pub user_id: u64,
    pub guild_id: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub total_xp: u64,
}

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid user or guild ID")]
    InvalidId,
}

/// Level from total XP: floor(sqrt(xp / 100)).
///
/// Level 1 at 100 XP, level 2 at 400, level 10 at 10000. Cheap enough
/// to recompute on every message.
pub fn level_for_xp(xp: u64) -> u32 {
    (xp as f64 / 100.0).sqrt() as u32
}

/// Total XP required to reach `level + 1`.
pub fn xp_for_next_level(level: u32) -> u64 {
    let next = u64::from(level) + 1;
    next * next * 100
}

/// Percent progress toward the next level threshold.
pub fn progress_to_next_level(xp: u64, level: u32) -> u64 {
    xp * 100 / xp_for_next_level(level)
}

/// Trait for persisting XP data.
///
/// Same shape as the other store ports: the engine defines WHAT it
/// needs, the infra layer decides HOW rows are kept.
#[async_trait]
pub trait XpStore: Send + Sync {
    /// Read a user's row, defaulting to xp=0, level=0 when absent.
    async fn get_user_xp(&self, user_id: u64, guild_id: u64) -> Result<UserXp, LevelingError>;

    /// Add XP, creating the row on first gain. Must be a single upsert.
    async fn add_xp(&self, user_id: u64, guild_id: u64, amount: u64) -> Result<(), LevelingError>;

    /// Persist a reconciled level.
    async fn set_level(&self, user_id: u64, guild_id: u64, level: u32)
        -> Result<(), LevelingError>;

    /// Top users by XP descending; ties break by ascending user id.
    async fn leaderboard(&self, guild_id: u64, limit: usize)
        -> Result<Vec<UserXp>, LevelingError>;
}

pub struct LevelingService<S: XpStore> {
    store: S,
    rng: Arc<dyn RandomSource>,
}

impl<S: XpStore> LevelingService<S> {
    pub fn new(store: S, rng: Arc<dyn RandomSource>) -> Self {
        Self { store, rng }
    }

    fn validate_ids(user_id: u64, guild_id: u64) -> Result<(), LevelingError> {
        if user_id == 0 || guild_id == 0 {
            Err(LevelingError::InvalidId)
        } else {
            Ok(())
        }
    }

    /// Award XP for one eligible chat message.
    ///
    /// The caller is responsible for eligibility (not a bot, not a
    /// command, leveling enabled for the guild); this method just rolls
    /// the amount, stores it, and reconciles the level.
    ///
    /// Returns `Ok(Some(event))` when the user crossed a level
    /// threshold, `Ok(None)` otherwise.
    pub async fn award_message_xp(
        &self,
        user_id: u64,
        guild_id: u64,
    ) -> Result<Option<LevelUpEvent>, LevelingError> {
        Self::validate_ids(user_id, guild_id)?;

        let amount = self.rng.roll_range(XP_ROLL_MIN, XP_ROLL_MAX_EXCLUSIVE);
        self.store.add_xp(user_id, guild_id, amount).await?;

        let current = self.store.get_user_xp(user_id, guild_id).await?;
        let computed = level_for_xp(current.xp);

        // One-directional ratchet: never lower a stored level.
        if computed > current.level {
            self.store.set_level(user_id, guild_id, computed).await?;
            Ok(Some(LevelUpEvent {
                user_id,
                guild_id,
                old_level: current.level,
                new_level: computed,
                total_xp: current.xp,
            }))
        } else {
            Ok(None)
        }
    }

    /// A user's current XP row (defaults when they never chatted).
    pub async fn user_stats(&self, user_id: u64, guild_id: u64) -> Result<UserXp, LevelingError> {
        Self::validate_ids(user_id, guild_id)?;
        self.store.get_user_xp(user_id, guild_id).await
    }

    /// Top `limit` users in the guild by XP.
    pub async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<UserXp>, LevelingError> {
        if guild_id == 0 {
            return Err(LevelingError::InvalidId);
        }
        self.store.leaderboard(guild_id, limit).await
    }
}
