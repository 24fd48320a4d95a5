// Per-guild settings: command prefix and feature flags.
//
// Settings rows are created lazily on first write. Reads with no row
// present return the configured defaults, so the rest of the bot never
// has to care whether a guild has been seen before.

use async_trait::async_trait;
use thiserror::Error;

/// Prefixes longer than this are rejected everywhere they can be set.
pub const MAX_PREFIX_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub prefix: String,
    pub spam_filter_enabled: bool,
    pub leveling_enabled: bool,
}

impl GuildSettings {
    /// The defaults a guild gets before anyone has configured it:
    /// leveling on, spam filter off.
    pub fn defaults(guild_id: u64, prefix: &str) -> Self {
        Self {
            guild_id,
            prefix: prefix.to_string(),
            spam_filter_enabled: false,
            leveling_enabled: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Prefix must be 1-{MAX_PREFIX_LEN} characters")]
    InvalidPrefix,
}

/// Trait for persisting guild settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns `None` when the guild has never been written.
    async fn get_settings(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError>;

    /// Single-row upsert.
    async fn save_settings(&self, settings: &GuildSettings) -> Result<(), SettingsError>;
}

pub struct SettingsService<S: SettingsStore> {
    store: S,
    default_prefix: String,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S, default_prefix: String) -> Self {
        Self {
            store,
            default_prefix,
        }
    }

    /// The guild's settings, falling back to defaults when no row exists.
    pub async fn settings_or_default(&self, guild_id: u64) -> Result<GuildSettings, SettingsError> {
        Ok(self
            .store
            .get_settings(guild_id)
            .await?
            .unwrap_or_else(|| GuildSettings::defaults(guild_id, &self.default_prefix)))
    }

    /// The prefix commands must start with in this guild.
    pub async fn effective_prefix(&self, guild_id: u64) -> Result<String, SettingsError> {
        Ok(self.settings_or_default(guild_id).await?.prefix)
    }

    /// Whether message XP is awarded in this guild (default: yes).
    pub async fn leveling_enabled(&self, guild_id: u64) -> Result<bool, SettingsError> {
        Ok(self.settings_or_default(guild_id).await?.leveling_enabled)
    }

    /// Change the guild's prefix. Length is validated here so both the
    /// slash and free-text forms of the command behave identically.
    pub async fn set_prefix(&self, guild_id: u64, prefix: &str) -> Result<(), SettingsError> {
        if prefix.is_empty() || prefix.chars().count() > MAX_PREFIX_LEN {
            return Err(SettingsError::InvalidPrefix);
        }

        let mut settings = self.settings_or_default(guild_id).await?;
        settings.prefix = prefix.to_string();
        self.store.save_settings(&settings).await
    }
}
