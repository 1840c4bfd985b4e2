//! Information and statistics about the bot

use std::time::Duration;

use tracing::debug;

use crate::embed::{Colors, LogRecord};
use crate::{Context, Error};

/// Reply body for `ping`. A zero latency means no heartbeat was acknowledged yet.
#[must_use]
pub fn latency_record(latency: Duration) -> LogRecord {
    let description = if latency.is_zero() {
        "Gateway Latency: unknown".to_string()
    } else {
        format!("Gateway Latency: {}ms", latency.as_millis())
    };
    LogRecord::new(Colors::BLUE)
        .title("Pong!")
        .description(description)
        .without_timestamp()
}

/// Uses of `ping` allowed per user within `PING_WINDOW`
pub const PING_USES: usize = 3;
pub const PING_WINDOW: Duration = Duration::from_secs(15);

/// Returns the latency of the bot.
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    if let Err(remaining) = ctx.data().ping_limit.try_use(ctx.author().id) {
        debug!(user_id = %ctx.author().id, "Ping rate limited");
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "You're too fast. Please wait {} seconds before retrying",
                    remaining.as_secs().max(1)
                ))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let latency = ctx.ping().await;
    ctx.send(poise::CreateReply::default().embed(latency_record(latency).to_embed()))
        .await?;
    Ok(())
}
