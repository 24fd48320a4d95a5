// Fun commands.

use super::run_slash;
use crate::core::router::NamedArgs;
use crate::discord::{Context, Error};

/// Ask the magic 8-ball a question.
#[poise::command(slash_command, rename = "8ball")]
pub async fn eight_ball(
    ctx: Context<'_>,
    #[description = "Your question"] question: String,
) -> Result<(), Error> {
    run_slash(ctx, "8ball", NamedArgs::new().string("question", question)).await
}
