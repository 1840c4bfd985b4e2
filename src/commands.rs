use crate::moderation::{messages, validate};
use crate::utils::stats;
use crate::{Context, Data, Error};

/// Every command the bot registers
#[must_use]
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![messages::message(), validate::validate(), stats::ping()]
}

/// Command check: the invoking member holds the moderator role
pub async fn is_moderator(ctx: Context<'_>) -> Result<bool, Error> {
    let moderator = ctx.data().config.roles.moderator;
    let Some(member) = ctx.author_member().await else {
        return Ok(false);
    };
    Ok(member.roles.contains(&moderator))
}
