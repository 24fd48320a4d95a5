// Response formatting: pure functions from handler results to display
// text. No state, no I/O - everything here is trivially testable and
// the only place reply wording lives.

use crate::core::leveling::{progress_to_next_level, UserXp};
use crate::core::moderation::ModStats;
use crate::core::router::{CommandError, COMMANDS};

const SOURCE_URL: &str = "https://github.com/warden-bot/warden";

/// The full 8-ball pool: 10 positive, 5 neutral, 5 negative answers.
/// Selection is uniform across all 20 regardless of tier.
pub const ORACLE_ANSWERS: [&str; 20] = [
    // Positive
    "It is certain.",
    "It is decidedly so.",
    "Without a doubt.",
    "Yes, definitely.",
    "You may rely on it.",
    "As I see it, yes.",
    "Most likely.",
    "Outlook good.",
    "Yes.",
    "Signs point to yes.",
    // Neutral
    "Reply hazy, try again.",
    "Ask again later.",
    "Better not tell you now.",
    "Cannot predict now.",
    "Concentrate and ask again.",
    // Negative
    "Don't count on it.",
    "My reply is no.",
    "My sources say no.",
    "Outlook not so good.",
    "Very doubtful.",
];

fn mention(user_id: u64) -> String {
    format!("<@{user_id}>")
}

pub fn pong() -> String {
    "🏓 **Pong!**".to_string()
}

/// The command list, rendered from the router's static table so help
/// never drifts from what is actually routable.
pub fn help(prefix: &str) -> String {
    let mut text = format!("📖 **Commands** (prefix: `{prefix}`)\n");
    for spec in COMMANDS {
        text.push_str(&format!("`{}` — {}\n", spec.name, spec.description));
    }
    text
}

pub fn source() -> String {
    format!("📜 **Source code**\n{SOURCE_URL}")
}

pub fn current_prefix(prefix: &str) -> String {
    format!("Current prefix: `{prefix}`")
}

pub fn prefix_updated(prefix: &str) -> String {
    format!("🔧 **Prefix updated!** New prefix: `{prefix}`")
}

pub fn banned(target_id: u64, moderator_id: u64, reason: &str) -> String {
    format!(
        "🔨 **Banned**\n**User:** {}\n**Moderator:** {}\n**Reason:** {}",
        mention(target_id),
        mention(moderator_id),
        reason
    )
}

pub fn kicked(target_id: u64, moderator_id: u64, reason: &str) -> String {
    format!(
        "👢 **Kicked**\n**User:** {}\n**Moderator:** {}\n**Reason:** {}",
        mention(target_id),
        mention(moderator_id),
        reason
    )
}

pub fn unbanned(target_id: u64, moderator_id: u64, reason: &str) -> String {
    format!(
        "♻️ **Unbanned**\n**User:** {}\n**Moderator:** {}\n**Reason:** {}",
        mention(target_id),
        mention(moderator_id),
        reason
    )
}

pub fn timed_out(target_id: u64, minutes: u32, moderator_id: u64, reason: &str) -> String {
    format!(
        "⏰ **Timed out**\n**User:** {}\n**Duration:** {} minutes\n**Moderator:** {}\n**Reason:** {}",
        mention(target_id),
        minutes,
        mention(moderator_id),
        reason
    )
}

pub fn cleaned(deleted: usize) -> String {
    format!("🧹 Deleted {deleted} messages.")
}

pub fn mod_stats(moderator_id: u64, stats: ModStats) -> String {
    format!(
        "📊 **Moderation stats for {}**\n**Total actions:** {}\n🔨 Bans: {}\n👢 Kicks: {}\n⏰ Timeouts: {}",
        mention(moderator_id),
        stats.total(),
        stats.bans,
        stats.kicks,
        stats.timeouts
    )
}

pub fn xp_stats(stats: &UserXp) -> String {
    format!(
        "✨ **XP stats for {}**\n**Level:** {}\n**XP:** {}\n**Progress to next level:** {}%",
        mention(stats.user_id),
        stats.level,
        stats.xp,
        progress_to_next_level(stats.xp, stats.level)
    )
}

pub fn leaderboard(entries: &[UserXp]) -> String {
    let mut text = "🏆 **Server Leaderboard**\n".to_string();

    if entries.is_empty() {
        text.push_str("No one has earned XP yet~");
        return text;
    }

    for (index, entry) in entries.iter().enumerate() {
        let medal = match index {
            0 => "🥇 ",
            1 => "🥈 ",
            2 => "🥉 ",
            _ => "",
        };
        text.push_str(&format!(
            "{}{}. {} — Level {} ({} XP)\n",
            medal,
            index + 1,
            mention(entry.user_id),
            entry.level,
            entry.xp
        ));
    }
    text
}

pub fn eight_ball(question: &str, answer: &str) -> String {
    format!("🎱 **Magic 8-Ball**\n**Question:** {question}\n**Answer:** {answer}")
}

pub fn level_up(user_id: u64, new_level: u32) -> String {
    format!(
        "✨ **Level up!** Congratulations {}, you've reached level **{}**!",
        mention(user_id),
        new_level
    )
}

/// Uniform rendering for every command failure. Validation messages go
/// back verbatim; storage details stay in the logs.
pub fn error_text(error: &CommandError) -> String {
    match error {
        CommandError::Validation(message) => format!("❌ {message}"),
        CommandError::PermissionDenied(message) => format!("⛔ {message}"),
        CommandError::Transport(message) => format!("❌ {message}"),
        CommandError::Storage(_) => "❌ Something went wrong. Please try again later.".to_string(),
        CommandError::UnknownCommand(name) => format!("❌ Unknown command: `{name}`"),
    }
}
