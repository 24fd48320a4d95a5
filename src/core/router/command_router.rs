// The command router: one static table of commands, two ways in.
//
// Slash interactions arrive with named, typed arguments; prefix
// messages arrive as free text. Both binding paths consult the same
// argument schemas and produce the same typed `Invocation`, so a
// handler can never tell which transport a command came from.
//
// Handlers receive their collaborators (stores, gateway, RNG, config
// values) by injection - there are no process-wide singletons.

use crate::core::gateway::{GatewayError, MessagingGateway};
use crate::core::leveling::{LevelingService, LevelingError, XpStore};
use crate::core::moderation::{
    ActionKind, ModerationError, ModerationService, ModerationStore, DEFAULT_REASON,
};
use crate::core::random::RandomSource;
use crate::core::responses as formatter;
use crate::core::settings::{SettingsError, SettingsService, SettingsStore};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// The closed failure taxonomy every command funnels into. The
/// response layer renders each kind uniformly; nothing is retried.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Missing or invalid arguments; reported verbatim to the invoker.
    #[error("{0}")]
    Validation(String),

    /// The platform refused an action for lack of permission.
    #[error("{0}")]
    PermissionDenied(String),

    /// The gateway rejected an action for any other reason.
    #[error("{0}")]
    Transport(String),

    /// The store failed. Fatal for this command only.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Not in the routing table. Both transports report this.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl From<SettingsError> for CommandError {
    fn from(error: SettingsError) -> Self {
        match error {
            SettingsError::InvalidPrefix => CommandError::Validation(error.to_string()),
            SettingsError::StorageError(message) => CommandError::Storage(message),
        }
    }
}

impl From<LevelingError> for CommandError {
    fn from(error: LevelingError) -> Self {
        match error {
            LevelingError::InvalidId => CommandError::Validation(error.to_string()),
            LevelingError::StorageError(message) => CommandError::Storage(message),
        }
    }
}

impl From<ModerationError> for CommandError {
    fn from(error: ModerationError) -> Self {
        match error {
            ModerationError::StorageError(message) => CommandError::Storage(message),
        }
    }
}

/// Wrap a gateway rejection with the action that failed, preserving
/// the collaborator's error text.
fn gateway_failure(what: &str, error: GatewayError) -> CommandError {
    match error {
        GatewayError::PermissionDenied(message) => {
            CommandError::PermissionDenied(format!("{what}: {message}"))
        }
        GatewayError::Failed(message) => CommandError::Transport(format!("{what}: {message}")),
    }
}

// ============================================================================
// COMMAND TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A user reference: `<@id>`, `<@!id>`, or a bare decimal id.
    User,
    /// A raw decimal user id (no mention syntax), as `unban` takes.
    RawUserId,
    Int,
    /// A single whitespace-delimited token.
    Str,
    /// The rest of the line, whitespace and all.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgReq {
    Required,
    Optional,
    /// Required from the structured transport, omittable in free text
    /// (omission means "report the current value").
    RequiredInStructured,
}

pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub req: ArgReq,
}

pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub args: &'static [ArgSpec],
}

/// The routing table, enumerated once. Help text renders from it and
/// both binders consult it, so there is exactly one source of truth
/// for what is routable.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "ping",
        description: "Check that the bot is responding",
        args: &[],
    },
    CommandSpec {
        name: "help",
        description: "Show this command list",
        args: &[],
    },
    CommandSpec {
        name: "source",
        description: "Where to find the bot's source code",
        args: &[],
    },
    CommandSpec {
        name: "prefix",
        description: "Show or change the command prefix",
        args: &[ArgSpec {
            name: "prefix",
            kind: ArgKind::Str,
            req: ArgReq::RequiredInStructured,
        }],
    },
    CommandSpec {
        name: "ban",
        description: "Ban a user from the server",
        args: &[
            ArgSpec {
                name: "user",
                kind: ArgKind::User,
                req: ArgReq::Required,
            },
            ArgSpec {
                name: "reason",
                kind: ArgKind::Text,
                req: ArgReq::Optional,
            },
        ],
    },
    CommandSpec {
        name: "kick",
        description: "Kick a user from the server",
        args: &[
            ArgSpec {
                name: "user",
                kind: ArgKind::User,
                req: ArgReq::Required,
            },
            ArgSpec {
                name: "reason",
                kind: ArgKind::Text,
                req: ArgReq::Optional,
            },
        ],
    },
    CommandSpec {
        name: "unban",
        description: "Lift a ban by user id",
        args: &[
            ArgSpec {
                name: "user_id",
                kind: ArgKind::RawUserId,
                req: ArgReq::Required,
            },
            ArgSpec {
                name: "reason",
                kind: ArgKind::Text,
                req: ArgReq::Optional,
            },
        ],
    },
    CommandSpec {
        name: "timeout",
        description: "Time a user out for a number of minutes",
        args: &[
            ArgSpec {
                name: "user",
                kind: ArgKind::User,
                req: ArgReq::Required,
            },
            ArgSpec {
                name: "minutes",
                kind: ArgKind::Int,
                req: ArgReq::Required,
            },
            ArgSpec {
                name: "reason",
                kind: ArgKind::Text,
                req: ArgReq::Optional,
            },
        ],
    },
    CommandSpec {
        name: "clean",
        description: "Delete recent messages from this channel",
        args: &[ArgSpec {
            name: "count",
            kind: ArgKind::Int,
            req: ArgReq::Optional,
        }],
    },
    CommandSpec {
        name: "mod-stats",
        description: "Show a moderator's action counts",
        args: &[ArgSpec {
            name: "user",
            kind: ArgKind::User,
            req: ArgReq::Optional,
        }],
    },
    CommandSpec {
        name: "xp",
        description: "Check XP and level",
        args: &[ArgSpec {
            name: "user",
            kind: ArgKind::User,
            req: ArgReq::Optional,
        }],
    },
    CommandSpec {
        name: "leaderboard",
        description: "Show the server's XP rankings",
        args: &[],
    },
    CommandSpec {
        name: "8ball",
        description: "Ask the magic 8-ball a question",
        args: &[ArgSpec {
            name: "question",
            kind: ArgKind::Text,
            req: ArgReq::Required,
        }],
    },
];

pub fn command_spec(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

// ============================================================================
// ARGUMENT BINDING
// ============================================================================

/// A named argument as delivered by the structured transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    User(u64),
    Str(String),
    Int(i64),
}

/// Builder for the structured form's name -> value mapping.
#[derive(Debug, Default)]
pub struct NamedArgs(Vec<(&'static str, ArgValue)>);

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, name: &'static str, id: u64) -> Self {
        self.0.push((name, ArgValue::User(id)));
        self
    }

    pub fn string(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.push((name, ArgValue::Str(value.into())));
        self
    }

    pub fn int(mut self, name: &'static str, value: i64) -> Self {
        self.0.push((name, ArgValue::Int(value)));
        self
    }

    pub fn opt_user(self, name: &'static str, id: Option<u64>) -> Self {
        match id {
            Some(id) => self.user(name, id),
            None => self,
        }
    }

    pub fn opt_string(self, name: &'static str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.string(name, value),
            None => self,
        }
    }

    pub fn opt_int(self, name: &'static str, value: Option<i64>) -> Self {
        match value {
            Some(value) => self.int(name, value),
            None => self,
        }
    }
}

/// Parse a user reference token: `<@id>`, `<@!id>`, or a bare decimal
/// id. Anything else is "not found", never a panic.
pub fn parse_user_ref(token: &str) -> Option<u64> {
    let token = token.trim();
    if let Some(inner) = token.strip_prefix("<@").and_then(|t| t.strip_suffix('>')) {
        let inner = inner.strip_prefix('!').unwrap_or(inner);
        return inner.parse().ok();
    }
    token.parse().ok()
}

/// Arguments after binding, uniform across both transports.
#[derive(Debug, Default)]
struct BoundArgs(HashMap<&'static str, ArgValue>);

impl BoundArgs {
    fn insert(&mut self, name: &'static str, value: ArgValue) {
        self.0.insert(name, value);
    }

    fn take_str(&mut self, name: &str) -> Option<String> {
        match self.0.remove(name) {
            Some(ArgValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    fn take_user(&mut self, name: &str) -> Option<u64> {
        match self.0.remove(name) {
            Some(ArgValue::User(id)) => Some(id),
            _ => None,
        }
    }

    fn take_int(&mut self, name: &str) -> Option<i64> {
        match self.0.remove(name) {
            Some(ArgValue::Int(value)) => Some(value),
            _ => None,
        }
    }
}

fn missing_arg(spec: &CommandSpec, name: &str) -> CommandError {
    CommandError::Validation(format!(
        "Missing required argument `{name}` for `{}`",
        spec.name
    ))
}

/// A fully validated command, ready to dispatch. One variant per
/// routable command, with its arguments as typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Ping,
    Help,
    Source,
    Prefix { prefix: Option<String> },
    Ban { user: u64, reason: Option<String> },
    Kick { user: u64, reason: Option<String> },
    Unban { user_id: u64, reason: Option<String> },
    Timeout {
        user: u64,
        minutes: u32,
        reason: Option<String>,
    },
    Clean { count: u8 },
    ModStats { user: Option<u64> },
    Xp { user: Option<u64> },
    Leaderboard,
    EightBall { question: String },
}

/// Bind named, typed arguments from the structured transport.
pub fn bind_structured(name: &str, args: NamedArgs) -> Result<Invocation, CommandError> {
    let spec =
        command_spec(name).ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

    let mut provided: HashMap<&'static str, ArgValue> = args.0.into_iter().collect();
    let mut bound = BoundArgs::default();

    for arg in spec.args {
        match provided.remove(arg.name) {
            Some(value) => {
                let matches_kind = matches!(
                    (&arg.kind, &value),
                    (ArgKind::User, ArgValue::User(_))
                        | (ArgKind::RawUserId, ArgValue::Str(_))
                        | (ArgKind::Int, ArgValue::Int(_))
                        | (ArgKind::Str, ArgValue::Str(_))
                        | (ArgKind::Text, ArgValue::Str(_))
                );
                if !matches_kind {
                    return Err(CommandError::Validation(format!(
                        "Invalid value for `{}`",
                        arg.name
                    )));
                }
                bound.insert(arg.name, value);
            }
            None => {
                if matches!(arg.req, ArgReq::Required | ArgReq::RequiredInStructured) {
                    return Err(missing_arg(spec, arg.name));
                }
            }
        }
    }

    build_invocation(spec, bound)
}

/// Bind the free-text remainder of a prefix command. Tokens are split
/// on whitespace and matched positionally against the schema; a `Text`
/// argument swallows the rest of the line.
pub fn bind_prefix(name: &str, rest: &str) -> Result<Invocation, CommandError> {
    let spec =
        command_spec(name).ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

    let mut cursor = rest.trim();
    let mut bound = BoundArgs::default();

    for arg in spec.args {
        let token = match arg.kind {
            ArgKind::Text => {
                let text = cursor.trim();
                cursor = "";
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            _ => next_token(&mut cursor),
        };

        match token {
            Some(token) => {
                let value = match arg.kind {
                    ArgKind::User => ArgValue::User(parse_user_ref(token).ok_or_else(|| {
                        CommandError::Validation("I couldn't find that user".to_string())
                    })?),
                    ArgKind::RawUserId => ArgValue::Str(token.to_string()),
                    ArgKind::Int => ArgValue::Int(token.parse().map_err(|_| {
                        CommandError::Validation(format!("`{}` must be a number", arg.name))
                    })?),
                    ArgKind::Str | ArgKind::Text => ArgValue::Str(token.to_string()),
                };
                bound.insert(arg.name, value);
            }
            None => {
                if matches!(arg.req, ArgReq::Required) {
                    return Err(missing_arg(spec, arg.name));
                }
            }
        }
    }

    build_invocation(spec, bound)
}

fn next_token<'a>(cursor: &mut &'a str) -> Option<&'a str> {
    let trimmed = cursor.trim_start();
    if trimmed.is_empty() {
        *cursor = "";
        return None;
    }
    match trimmed.find(char::is_whitespace) {
        Some(pos) => {
            let (token, rest) = trimmed.split_at(pos);
            *cursor = rest;
            Some(token)
        }
        None => {
            *cursor = "";
            Some(trimmed)
        }
    }
}

/// Shared semantic validation: whichever binder produced the bound
/// arguments, the same rules apply from here on.
fn build_invocation(spec: &CommandSpec, mut bound: BoundArgs) -> Result<Invocation, CommandError> {
    match spec.name {
        "ping" => Ok(Invocation::Ping),
        "help" => Ok(Invocation::Help),
        "source" => Ok(Invocation::Source),
        "prefix" => Ok(Invocation::Prefix {
            prefix: bound.take_str("prefix"),
        }),
        "ban" => Ok(Invocation::Ban {
            user: bound
                .take_user("user")
                .ok_or_else(|| missing_arg(spec, "user"))?,
            reason: bound.take_str("reason"),
        }),
        "kick" => Ok(Invocation::Kick {
            user: bound
                .take_user("user")
                .ok_or_else(|| missing_arg(spec, "user"))?,
            reason: bound.take_str("reason"),
        }),
        "unban" => {
            let raw = bound
                .take_str("user_id")
                .ok_or_else(|| missing_arg(spec, "user_id"))?;
            let user_id = raw.trim().parse::<u64>().map_err(|_| {
                CommandError::Validation("Please specify a valid user ID to unban".to_string())
            })?;
            Ok(Invocation::Unban {
                user_id,
                reason: bound.take_str("reason"),
            })
        }
        "timeout" => {
            let user = bound
                .take_user("user")
                .ok_or_else(|| missing_arg(spec, "user"))?;
            let minutes = bound
                .take_int("minutes")
                .ok_or_else(|| missing_arg(spec, "minutes"))?;
            if minutes <= 0 {
                return Err(CommandError::Validation(
                    "Duration must be at least 1 minute".to_string(),
                ));
            }
            Ok(Invocation::Timeout {
                user,
                minutes: u32::try_from(minutes).unwrap_or(u32::MAX),
                reason: bound.take_str("reason"),
            })
        }
        "clean" => {
            let count = bound.take_int("count").unwrap_or(10);
            if count < 1 {
                return Err(CommandError::Validation(
                    "Count must be at least 1".to_string(),
                ));
            }
            Ok(Invocation::Clean {
                count: count.min(100) as u8,
            })
        }
        "mod-stats" => Ok(Invocation::ModStats {
            user: bound.take_user("user"),
        }),
        "xp" => Ok(Invocation::Xp {
            user: bound.take_user("user"),
        }),
        "leaderboard" => Ok(Invocation::Leaderboard),
        "8ball" => {
            let question = bound
                .take_str("question")
                .filter(|q| !q.trim().is_empty())
                .ok_or_else(|| {
                    CommandError::Validation("You need to ask a question".to_string())
                })?;
            Ok(Invocation::EightBall { question })
        }
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Where a command came from, independent of transport.
#[derive(Debug, Clone, Copy)]
pub struct CommandOrigin {
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub invoker_id: u64,
    /// The chat message that carried the command, when there was one.
    /// Slash interactions have none; `clean` uses this to avoid
    /// counting the command message among the deletions it reports.
    pub trigger_message_id: Option<u64>,
}

/// A rendered reply plus delivery hints for the transport layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Slash replies marked private are shown only to the invoker.
    pub private: bool,
    /// Prefix replies marked transient are deleted after a short pause.
    pub transient: bool,
}

impl Reply {
    pub fn public(text: String) -> Self {
        Self {
            text,
            private: false,
            transient: false,
        }
    }

    fn quiet(text: String) -> Self {
        Self {
            text,
            private: true,
            transient: true,
        }
    }
}

const LEADERBOARD_SIZE: usize = 10;
const PURGE_MAX_AGE_DAYS: i64 = 14;

pub struct CommandRouter<S, X, M>
where
    S: SettingsStore,
    X: XpStore,
    M: ModerationStore,
{
    settings: Arc<SettingsService<S>>,
    leveling: Arc<LevelingService<X>>,
    moderation: Arc<ModerationService<M>>,
    rng: Arc<dyn RandomSource>,
    default_prefix: String,
}

impl<S, X, M> CommandRouter<S, X, M>
where
    S: SettingsStore,
    X: XpStore,
    M: ModerationStore,
{
    pub fn new(
        settings: Arc<SettingsService<S>>,
        leveling: Arc<LevelingService<X>>,
        moderation: Arc<ModerationService<M>>,
        rng: Arc<dyn RandomSource>,
        default_prefix: String,
    ) -> Self {
        Self {
            settings,
            leveling,
            moderation,
            rng,
            default_prefix,
        }
    }

    /// Run one validated invocation to completion.
    pub async fn dispatch(
        &self,
        gateway: &dyn MessagingGateway,
        origin: &CommandOrigin,
        invocation: Invocation,
    ) -> Result<Reply, CommandError> {
        match invocation {
            Invocation::Ping => Ok(Reply::public(formatter::pong())),

            Invocation::Help => {
                let prefix = match origin.guild_id {
                    Some(guild_id) => self.settings.effective_prefix(guild_id).await?,
                    None => self.default_prefix.clone(),
                };
                Ok(Reply::public(formatter::help(&prefix)))
            }

            Invocation::Source => Ok(Reply::public(formatter::source())),

            Invocation::Prefix { prefix } => {
                let guild_id = require_guild(origin)?;
                match prefix {
                    Some(new_prefix) => {
                        self.settings.set_prefix(guild_id, &new_prefix).await?;
                        Ok(Reply::public(formatter::prefix_updated(&new_prefix)))
                    }
                    None => {
                        let current = self.settings.effective_prefix(guild_id).await?;
                        Ok(Reply::public(formatter::current_prefix(&current)))
                    }
                }
            }

            Invocation::Ban { user, reason } => {
                let guild_id = require_guild(origin)?;
                let reason_text = reason.as_deref().unwrap_or(DEFAULT_REASON);

                gateway
                    .ban_user(guild_id, user, reason_text)
                    .await
                    .map_err(|e| gateway_failure("Failed to ban", e))?;
                self.moderation
                    .record(
                        guild_id,
                        origin.invoker_id,
                        user,
                        ActionKind::Ban,
                        reason.as_deref(),
                        Utc::now().timestamp(),
                    )
                    .await?;

                tracing::info!(guild_id, target_id = user, "User banned");
                Ok(Reply::public(formatter::banned(
                    user,
                    origin.invoker_id,
                    reason_text,
                )))
            }

            Invocation::Kick { user, reason } => {
                let guild_id = require_guild(origin)?;
                let reason_text = reason.as_deref().unwrap_or(DEFAULT_REASON);

                gateway
                    .kick_user(guild_id, user, reason_text)
                    .await
                    .map_err(|e| gateway_failure("Failed to kick", e))?;
                self.moderation
                    .record(
                        guild_id,
                        origin.invoker_id,
                        user,
                        ActionKind::Kick,
                        reason.as_deref(),
                        Utc::now().timestamp(),
                    )
                    .await?;

                tracing::info!(guild_id, target_id = user, "User kicked");
                Ok(Reply::public(formatter::kicked(
                    user,
                    origin.invoker_id,
                    reason_text,
                )))
            }

            Invocation::Unban { user_id, reason } => {
                let guild_id = require_guild(origin)?;
                let reason_text = reason.as_deref().unwrap_or(DEFAULT_REASON);

                gateway
                    .unban_user(guild_id, user_id)
                    .await
                    .map_err(|e| gateway_failure("Failed to unban", e))?;
                self.moderation
                    .record(
                        guild_id,
                        origin.invoker_id,
                        user_id,
                        ActionKind::Unban,
                        reason.as_deref(),
                        Utc::now().timestamp(),
                    )
                    .await?;

                tracing::info!(guild_id, target_id = user_id, "User unbanned");
                Ok(Reply::public(formatter::unbanned(
                    user_id,
                    origin.invoker_id,
                    reason_text,
                )))
            }

            Invocation::Timeout {
                user,
                minutes,
                reason,
            } => {
                let guild_id = require_guild(origin)?;
                let reason_text = reason.as_deref().unwrap_or(DEFAULT_REASON);

                gateway
                    .timeout_user(guild_id, user, minutes)
                    .await
                    .map_err(|e| gateway_failure("Failed to timeout", e))?;
                // The ledger keeps the duration with the reason.
                let recorded_reason = format!("{reason_text} ({minutes} minutes)");
                self.moderation
                    .record(
                        guild_id,
                        origin.invoker_id,
                        user,
                        ActionKind::Timeout,
                        Some(&recorded_reason),
                        Utc::now().timestamp(),
                    )
                    .await?;

                tracing::info!(guild_id, target_id = user, minutes, "User timed out");
                Ok(Reply::public(formatter::timed_out(
                    user,
                    minutes,
                    origin.invoker_id,
                    reason_text,
                )))
            }

            Invocation::Clean { count } => {
                // Fetch one extra when the command itself is a channel
                // message so it doesn't eat into the requested count.
                let fetch_count = if origin.trigger_message_id.is_some() {
                    count.saturating_add(1)
                } else {
                    count
                };

                let messages = gateway
                    .fetch_recent_messages(origin.channel_id, fetch_count)
                    .await
                    .map_err(|e| gateway_failure("Failed to clean", e))?;

                // Messages older than 14 days can't be bulk-deleted.
                let cutoff = (Utc::now() - Duration::days(PURGE_MAX_AGE_DAYS)).timestamp();
                let deletable: Vec<u64> = messages
                    .iter()
                    .filter(|m| m.sent_at > cutoff)
                    .map(|m| m.id)
                    .collect();

                gateway
                    .delete_messages(origin.channel_id, &deletable)
                    .await
                    .map_err(|e| gateway_failure("Failed to clean", e))?;

                let trigger_deleted = origin
                    .trigger_message_id
                    .is_some_and(|id| deletable.contains(&id));
                let deleted = deletable.len() - usize::from(trigger_deleted);

                Ok(Reply::quiet(formatter::cleaned(deleted)))
            }

            Invocation::ModStats { user } => {
                let guild_id = require_guild(origin)?;
                let moderator_id = user.unwrap_or(origin.invoker_id);
                let stats = self.moderation.stats_for(guild_id, moderator_id).await?;
                Ok(Reply::public(formatter::mod_stats(moderator_id, stats)))
            }

            Invocation::Xp { user } => {
                let guild_id = require_guild(origin)?;
                let user_id = user.unwrap_or(origin.invoker_id);
                let stats = self.leveling.user_stats(user_id, guild_id).await?;
                Ok(Reply::public(formatter::xp_stats(&stats)))
            }

            Invocation::Leaderboard => {
                let guild_id = require_guild(origin)?;
                let entries = self
                    .leveling
                    .leaderboard(guild_id, LEADERBOARD_SIZE)
                    .await?;
                Ok(Reply::public(formatter::leaderboard(&entries)))
            }

            Invocation::EightBall { question } => {
                let answer =
                    formatter::ORACLE_ANSWERS[self.rng.pick(formatter::ORACLE_ANSWERS.len())];
                Ok(Reply::public(formatter::eight_ball(&question, answer)))
            }
        }
    }
}

fn require_guild(origin: &CommandOrigin) -> Result<u64, CommandError> {
    origin.guild_id.ok_or_else(|| {
        CommandError::Validation("This command can only be used in a server".to_string())
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gateway::FetchedMessage;
    use crate::core::random::StdRandomSource;
    use crate::infra::memory::{
        InMemoryModerationStore, InMemorySettingsStore, InMemoryXpStore,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every gateway call; configurable fetch results and
    /// failure injection.
    struct MockGateway {
        calls: Mutex<Vec<String>>,
        recent: Mutex<Vec<FetchedMessage>>,
        deleted: Mutex<Vec<Vec<u64>>>,
        fail_next: Mutex<Option<GatewayError>>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                recent: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                fail_next: Mutex::new(None),
            }
        }

        fn with_recent(self, messages: Vec<FetchedMessage>) -> Self {
            *self.recent.lock().unwrap() = messages;
            self
        }

        fn fail_with(self, error: GatewayError) -> Self {
            *self.fail_next.lock().unwrap() = Some(error);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn check_failure(&self) -> Result<(), GatewayError> {
            match self.fail_next.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl MessagingGateway for MockGateway {
        async fn send_text(&self, channel_id: u64, text: &str) -> Result<u64, GatewayError> {
            self.check_failure()?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("send:{channel_id}:{text}"));
            Ok(1)
        }

        async fn delete_messages(
            &self,
            channel_id: u64,
            message_ids: &[u64],
        ) -> Result<(), GatewayError> {
            self.check_failure()?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete:{channel_id}:{}", message_ids.len()));
            self.deleted.lock().unwrap().push(message_ids.to_vec());
            Ok(())
        }

        async fn ban_user(
            &self,
            guild_id: u64,
            user_id: u64,
            reason: &str,
        ) -> Result<(), GatewayError> {
            self.check_failure()?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("ban:{guild_id}:{user_id}:{reason}"));
            Ok(())
        }

        async fn kick_user(
            &self,
            guild_id: u64,
            user_id: u64,
            reason: &str,
        ) -> Result<(), GatewayError> {
            self.check_failure()?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("kick:{guild_id}:{user_id}:{reason}"));
            Ok(())
        }

        async fn unban_user(&self, guild_id: u64, user_id: u64) -> Result<(), GatewayError> {
            self.check_failure()?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("unban:{guild_id}:{user_id}"));
            Ok(())
        }

        async fn timeout_user(
            &self,
            guild_id: u64,
            user_id: u64,
            minutes: u32,
        ) -> Result<(), GatewayError> {
            self.check_failure()?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("timeout:{guild_id}:{user_id}:{minutes}"));
            Ok(())
        }

        async fn fetch_recent_messages(
            &self,
            channel_id: u64,
            count: u8,
        ) -> Result<Vec<FetchedMessage>, GatewayError> {
            self.check_failure()?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("fetch:{channel_id}:{count}"));
            let recent = self.recent.lock().unwrap();
            Ok(recent.iter().take(count as usize).copied().collect())
        }
    }

    type TestRouter =
        CommandRouter<InMemorySettingsStore, InMemoryXpStore, InMemoryModerationStore>;

    struct Fixture {
        router: TestRouter,
        moderation: Arc<ModerationService<InMemoryModerationStore>>,
        leveling: Arc<LevelingService<InMemoryXpStore>>,
    }

    fn make_fixture() -> Fixture {
        let settings = Arc::new(SettingsService::new(
            InMemorySettingsStore::new(),
            ".".to_string(),
        ));
        let leveling = Arc::new(LevelingService::new(
            InMemoryXpStore::new(),
            Arc::new(StdRandomSource::seeded(1)),
        ));
        let moderation = Arc::new(ModerationService::new(InMemoryModerationStore::new()));
        let router = CommandRouter::new(
            Arc::clone(&settings),
            Arc::clone(&leveling),
            Arc::clone(&moderation),
            Arc::new(StdRandomSource::seeded(2)),
            ".".to_string(),
        );
        Fixture {
            router,
            moderation,
            leveling,
        }
    }

    fn guild_origin() -> CommandOrigin {
        CommandOrigin {
            guild_id: Some(500),
            channel_id: 600,
            invoker_id: 700,
            trigger_message_id: None,
        }
    }

    // ---- binding -----------------------------------------------------------

    #[test]
    fn user_refs_parse_all_accepted_shapes() {
        assert_eq!(
            parse_user_ref("<@123456789012345678>"),
            Some(123456789012345678)
        );
        assert_eq!(
            parse_user_ref("<@!123456789012345678>"),
            Some(123456789012345678)
        );
        assert_eq!(
            parse_user_ref("123456789012345678"),
            Some(123456789012345678)
        );
        assert_eq!(parse_user_ref("@somebody"), None);
        assert_eq!(parse_user_ref("<@notanumber>"), None);
        assert_eq!(parse_user_ref(""), None);
    }

    #[test]
    fn both_binders_produce_the_same_invocation() {
        let structured = bind_structured(
            "timeout",
            NamedArgs::new()
                .user("user", 42)
                .int("minutes", 10)
                .string("reason", "cool off"),
        )
        .unwrap();
        let prefix = bind_prefix("timeout", "<@42> 10 cool off").unwrap();
        assert_eq!(structured, prefix);
    }

    #[test]
    fn prefix_ban_takes_mention_then_rest_as_reason() {
        let invocation = bind_prefix("ban", "<@99> being rude all day").unwrap();
        assert_eq!(
            invocation,
            Invocation::Ban {
                user: 99,
                reason: Some("being rude all day".to_string()),
            }
        );
    }

    #[test]
    fn prefix_ban_without_reason_has_none() {
        let invocation = bind_prefix("ban", "99").unwrap();
        assert_eq!(
            invocation,
            Invocation::Ban {
                user: 99,
                reason: None,
            }
        );
    }

    #[test]
    fn unparseable_user_ref_is_a_validation_error() {
        let err = bind_prefix("ban", "somebody").unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
    }

    #[test]
    fn unban_only_accepts_raw_ids() {
        assert!(bind_prefix("unban", "12345").is_ok());
        let err = bind_prefix("unban", "<@12345>").unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));

        let err = bind_structured("unban", NamedArgs::new().string("user_id", "abc")).unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
    }

    #[test]
    fn unknown_commands_error_in_both_forms() {
        assert!(matches!(
            bind_structured("dance", NamedArgs::new()),
            Err(CommandError::UnknownCommand(_))
        ));
        assert!(matches!(
            bind_prefix("dance", ""),
            Err(CommandError::UnknownCommand(_))
        ));
    }

    #[test]
    fn prefix_arg_is_required_only_in_structured_form() {
        let err = bind_structured("prefix", NamedArgs::new()).unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));

        // Free-text omission means "report the current prefix".
        let invocation = bind_prefix("prefix", "").unwrap();
        assert_eq!(invocation, Invocation::Prefix { prefix: None });
    }

    #[test]
    fn timeout_rejects_nonpositive_minutes_in_both_forms() {
        let err = bind_prefix("timeout", "<@42> 0").unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));

        let err = bind_structured(
            "timeout",
            NamedArgs::new().user("user", 42).int("minutes", -5),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
    }

    #[test]
    fn clean_count_defaults_and_clamps() {
        assert_eq!(bind_prefix("clean", "").unwrap(), Invocation::Clean { count: 10 });
        assert_eq!(
            bind_prefix("clean", "500").unwrap(),
            Invocation::Clean { count: 100 }
        );
        assert_eq!(
            bind_structured("clean", NamedArgs::new().int("count", 500)).unwrap(),
            Invocation::Clean { count: 100 }
        );
        assert!(matches!(
            bind_prefix("clean", "0"),
            Err(CommandError::Validation(_))
        ));
    }

    #[test]
    fn eight_ball_requires_a_question_in_both_forms() {
        assert!(matches!(
            bind_prefix("8ball", "   "),
            Err(CommandError::Validation(_))
        ));
        assert!(matches!(
            bind_structured("8ball", NamedArgs::new()),
            Err(CommandError::Validation(_))
        ));
        assert!(bind_prefix("8ball", "will it work?").is_ok());
    }

    // ---- dispatch ----------------------------------------------------------

    #[tokio::test]
    async fn ban_calls_gateway_and_records_with_sentinel_reason() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();

        let reply = fixture
            .router
            .dispatch(
                &gateway,
                &guild_origin(),
                Invocation::Ban {
                    user: 42,
                    reason: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(gateway.calls(), vec!["ban:500:42:No reason provided"]);
        assert!(reply.text.contains("<@42>"));

        let log = fixture.moderation.action_log(500, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, ActionKind::Ban);
        assert_eq!(log[0].moderator_id, 700);
        assert_eq!(log[0].reason, DEFAULT_REASON);
    }

    #[tokio::test]
    async fn gateway_rejection_surfaces_as_transport_error_with_text() {
        let fixture = make_fixture();
        let gateway =
            MockGateway::new().fail_with(GatewayError::Failed("Unknown Member".to_string()));

        let err = fixture
            .router
            .dispatch(
                &gateway,
                &guild_origin(),
                Invocation::Kick {
                    user: 42,
                    reason: None,
                },
            )
            .await
            .unwrap_err();

        match err {
            CommandError::Transport(message) => {
                assert!(message.contains("Failed to kick"));
                assert!(message.contains("Unknown Member"));
            }
            other => panic!("expected transport error, got {other:?}"),
        }

        // Nothing was recorded for a failed action.
        let log = fixture.moderation.action_log(500, 10).await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn permission_rejection_keeps_its_kind() {
        let fixture = make_fixture();
        let gateway = MockGateway::new()
            .fail_with(GatewayError::PermissionDenied("Missing Permissions".to_string()));

        let err = fixture
            .router
            .dispatch(
                &gateway,
                &guild_origin(),
                Invocation::Ban {
                    user: 42,
                    reason: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn timeout_records_duration_in_reason() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();

        fixture
            .router
            .dispatch(
                &gateway,
                &guild_origin(),
                Invocation::Timeout {
                    user: 42,
                    minutes: 15,
                    reason: Some("cool off".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(gateway.calls(), vec!["timeout:500:42:15"]);
        let log = fixture.moderation.action_log(500, 10).await.unwrap();
        assert_eq!(log[0].reason, "cool off (15 minutes)");
    }

    #[tokio::test]
    async fn clean_excludes_stale_messages_and_the_trigger() {
        let fixture = make_fixture();
        let now = Utc::now().timestamp();
        let fifteen_days = 15 * 24 * 3600;
        let gateway = MockGateway::new().with_recent(vec![
            FetchedMessage {
                id: 900,
                sent_at: now,
            },
            FetchedMessage {
                id: 901,
                sent_at: now - 60,
            },
            FetchedMessage {
                id: 902,
                sent_at: now - fifteen_days,
            },
            FetchedMessage {
                id: 903,
                sent_at: now - 120,
            },
        ]);

        let origin = CommandOrigin {
            trigger_message_id: Some(900),
            ..guild_origin()
        };
        let reply = fixture
            .router
            .dispatch(&gateway, &origin, Invocation::Clean { count: 3 })
            .await
            .unwrap();

        // Fetched count+1 for the trigger, deleted the three fresh
        // messages, reported two (trigger excluded from the count).
        assert_eq!(gateway.calls(), vec!["fetch:600:4", "delete:600:3"]);
        let deleted = gateway.deleted.lock().unwrap().clone();
        assert_eq!(deleted, vec![vec![900, 901, 903]]);
        assert_eq!(reply.text, formatter::cleaned(2));
        assert!(reply.private);
        assert!(reply.transient);
    }

    #[tokio::test]
    async fn mod_stats_defaults_to_the_invoker() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();

        fixture
            .moderation
            .record(500, 700, 42, ActionKind::Ban, None, 1000)
            .await
            .unwrap();

        let reply = fixture
            .router
            .dispatch(&gateway, &guild_origin(), Invocation::ModStats { user: None })
            .await
            .unwrap();

        assert!(reply.text.contains("<@700>"));
        assert!(reply.text.contains("Bans: 1"));
    }

    #[tokio::test]
    async fn prefix_roundtrip_and_validation_through_dispatch() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();
        let origin = guild_origin();

        // Report default first.
        let invocation = bind_prefix("prefix", "").unwrap();
        let reply = fixture
            .router
            .dispatch(&gateway, &origin, invocation)
            .await
            .unwrap();
        assert_eq!(reply.text, formatter::current_prefix("."));

        // Update through the structured form.
        let invocation =
            bind_structured("prefix", NamedArgs::new().string("prefix", "!")).unwrap();
        fixture
            .router
            .dispatch(&gateway, &origin, invocation)
            .await
            .unwrap();
        let invocation = bind_prefix("prefix", "").unwrap();
        let reply = fixture
            .router
            .dispatch(&gateway, &origin, invocation)
            .await
            .unwrap();
        assert_eq!(reply.text, formatter::current_prefix("!"));

        // Over-long prefixes are rejected through both forms.
        let invocation =
            bind_structured("prefix", NamedArgs::new().string("prefix", "toolong")).unwrap();
        let err = fixture
            .router
            .dispatch(&gateway, &origin, invocation)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));

        let invocation = bind_prefix("prefix", "toolong").unwrap();
        let err = fixture
            .router
            .dispatch(&gateway, &origin, invocation)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
    }

    #[tokio::test]
    async fn guild_commands_reject_direct_messages() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();
        let origin = CommandOrigin {
            guild_id: None,
            channel_id: 600,
            invoker_id: 700,
            trigger_message_id: None,
        };

        let err = fixture
            .router
            .dispatch(&gateway, &origin, Invocation::Leaderboard)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_leaderboard_renders_placeholder() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();

        let reply = fixture
            .router
            .dispatch(&gateway, &guild_origin(), Invocation::Leaderboard)
            .await
            .unwrap();
        assert!(reply.text.contains("No one has earned XP yet~"));
    }

    #[tokio::test]
    async fn xp_command_reflects_awarded_xp() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();

        fixture.leveling.award_message_xp(700, 500).await.unwrap();

        let reply = fixture
            .router
            .dispatch(&gateway, &guild_origin(), Invocation::Xp { user: None })
            .await
            .unwrap();
        assert!(reply.text.contains("<@700>"));
        assert!(reply.text.contains("Level:** 0"));
    }

    #[tokio::test]
    async fn eight_ball_answers_come_from_the_pool_deterministically() {
        let fixture = make_fixture();
        let gateway = MockGateway::new();

        let reply = fixture
            .router
            .dispatch(
                &gateway,
                &guild_origin(),
                Invocation::EightBall {
                    question: "will it work?".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(formatter::ORACLE_ANSWERS
            .iter()
            .any(|answer| reply.text.contains(answer)));

        // A second fixture with the same seed gives the same answer.
        let fixture2 = make_fixture();
        let reply2 = fixture2
            .router
            .dispatch(
                &gateway,
                &guild_origin(),
                Invocation::EightBall {
                    question: "will it work?".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(reply.text, reply2.text);
    }
}
