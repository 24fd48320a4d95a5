// Startup configuration: a JSON file with environment fallback.
//
// Resolution order for the file path is handled in main (CLI arg, then
// CONFIG_PATH, then ./config.json). A missing file is not an error -
// everything can come from the environment instead. The token can
// always be overridden by DISCORD_TOKEN so it stays out of the file.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub discord_token: String,
    pub default_prefix: String,
    pub database_path: String,
    /// User ids (decimal strings) with bot-owner privileges.
    pub master_users: Vec<String>,
    /// Warning count the spam filter escalates at. The counter surface
    /// exists in the store; no detection heuristic drives it yet.
    #[allow(dead_code)]
    pub spam_max_warnings: u32,
    /// Auto-reply for direct messages.
    pub dm_message: String,
    /// Template for permission refusals; `${author}` expands to a
    /// mention of the invoker.
    pub insufficient_permissions_message: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            default_prefix: ".".to_string(),
            database_path: "warden.db".to_string(),
            master_users: Vec::new(),
            spam_max_warnings: 3,
            dm_message: "I'm just a bot, I can't answer you here.".to_string(),
            insufficient_permissions_message: "${author} You don't have permission to do that."
                .to_string(),
        }
    }
}

impl BotConfig {
    /// Load from a JSON file, or fall back to the environment when the
    /// file doesn't exist. DISCORD_TOKEN always wins over the file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if !Path::new(path).exists() {
            tracing::info!("Config file {path} not found, using environment variables");
            return Ok(Self::from_env());
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let mut config: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse config file {path}"))?;

        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            if !token.is_empty() {
                config.discord_token = token;
            }
        }

        Ok(config)
    }

    /// Build a config purely from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.discord_token = std::env::var("DISCORD_TOKEN").unwrap_or_default();
        if let Ok(prefix) = std::env::var("DEFAULT_PREFIX") {
            config.default_prefix = prefix;
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = path;
        }
        if let Ok(message) = std::env::var("DM_MESSAGE") {
            config.dm_message = message;
        }
        if let Ok(warnings) = std::env::var("SPAM_MAX_WARNINGS") {
            if let Ok(warnings) = warnings.parse() {
                config.spam_max_warnings = warnings;
            }
        }
        if let Ok(master) = std::env::var("MASTER_USER") {
            if !master.is_empty() {
                config.master_users.push(master);
            }
        }

        config
    }

    #[allow(dead_code)] // Owner-only commands will check this.
    pub fn is_master_user(&self, user_id: u64) -> bool {
        let id = user_id.to_string();
        self.master_users.iter().any(|master| master == &id)
    }

    /// Render the permission-refusal template for one invoker.
    pub fn permission_message(&self, invoker_id: u64) -> String {
        self.insufficient_permissions_message
            .replace("${author}", &format!("<@{invoker_id}>"))
    }
}
