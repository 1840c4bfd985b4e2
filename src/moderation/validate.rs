//! OSF membership validation on join and on `/validate`

use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, ChannelId, RoleId};
use tracing::{error, info};

use super::{LogChannel, MemberView};
use crate::data::Resolved;
use crate::discord::{DiscordService, SerenityDiscordService};
use crate::embed::{Colors, LogRecord};
use crate::error::BotError;
use crate::membership::{MembershipApi, ValidationStatus};
use crate::{Context, Error};

pub struct Validation {
    log_channel: LogChannel,
    member_role_id: RoleId,
    member_role: Resolved<RoleId>,
    api: Arc<dyn MembershipApi>,
}

impl Validation {
    #[must_use]
    pub fn new(
        log_channel_id: ChannelId,
        member_role_id: RoleId,
        api: Arc<dyn MembershipApi>,
    ) -> Self {
        Self {
            log_channel: LogChannel::new("log channel", log_channel_id),
            member_role_id,
            member_role: Resolved::new("OSF Member role"),
            api,
        }
    }

    #[must_use]
    pub const fn channel(&self) -> &LogChannel {
        &self.log_channel
    }

    /// Look the member up and act on the answer
    pub async fn validate_member(
        &self,
        discord: &dyn DiscordService,
        member: &MemberView,
    ) -> ValidationStatus {
        let status = self.api.validate(member.user.id.get()).await;
        info!(user_id = %member.user.id, %status, "Membership validated");
        self.process_status(discord, member, status).await
    }

    /// Grant the role or report the outcome; posts exactly one notice
    ///
    /// Returns the status that was reported, which becomes an error if the
    /// role could not be granted.
    pub async fn process_status(
        &self,
        discord: &dyn DiscordService,
        member: &MemberView,
        status: ValidationStatus,
    ) -> ValidationStatus {
        let status = match status {
            ValidationStatus::Member => match self.grant_role(discord, member).await {
                Ok(()) => ValidationStatus::Member,
                Err(err) => {
                    error!(
                        user_id = %member.user.id,
                        error = %err,
                        "Failed to grant OSF Member role"
                    );
                    ValidationStatus::Error(err.to_string())
                }
            },
            other => other,
        };

        self.log_channel
            .post(discord, notice_record(member, &status))
            .await;
        status
    }

    async fn grant_role(
        &self,
        discord: &dyn DiscordService,
        member: &MemberView,
    ) -> Result<(), BotError> {
        let role_id = self
            .member_role
            .get_or_resolve(|| discord.resolve_role(member.guild_id, self.member_role_id))
            .await
            .copied()
            .ok_or(BotError::Unresolved {
                kind: "OSF Member role",
                id: self.member_role_id.get(),
            })?;
        discord.add_role(member.guild_id, member.user.id, role_id).await
    }
}

/// Notice for the log channel
fn notice_record(member: &MemberView, status: &ValidationStatus) -> LogRecord {
    let user = &member.user;
    match status {
        ValidationStatus::Member => LogRecord::new(Colors::GREEN)
            .title(format!("OSF Member Added ({})", user.id))
            .description(format!("{} was validated by the bot.", user.describe())),
        ValidationStatus::NotMember => LogRecord::new(Colors::ORANGE)
            .title(format!("OSF Validation Failed ({})", user.id))
            .description(format!(
                "{} could not be verified as a part of Manipal OSF.",
                user.describe()
            )),
        ValidationStatus::Error(payload) => LogRecord::new(Colors::RED)
            .title(format!("OSF Validation Error ({})", user.id))
            .description(format!("```{payload}```")),
    }
}

/// Ephemeral reply for whoever ran `/validate`
fn reply_record(member: &MemberView, status: &ValidationStatus) -> LogRecord {
    let user = &member.user;
    match status {
        ValidationStatus::Member => LogRecord::new(Colors::GREEN)
            .title(format!("OSF Validation Successful ({})", user.id))
            .description(format!(
                "{} was verified, and has been given the relevant roles.",
                user.mention()
            )),
        ValidationStatus::NotMember => LogRecord::new(Colors::ORANGE)
            .title(format!("OSF Validation Failed ({})", user.id))
            .description(format!(
                "Could not verify {} as a part of Manipal OSF.",
                user.mention()
            )),
        ValidationStatus::Error(_) => LogRecord::new(Colors::RED)
            .title(format!("OSF Validation Error ({})", user.id))
            .description("Could not validate user. Moderators have been informed of the error."),
    }
}

/// Command to validate users already in the server.
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn validate(
    ctx: Context<'_>,
    #[description = "Member to validate, defaults to you"] member: Option<serenity::Member>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let member = match member {
        Some(member) => MemberView::from(&member),
        None => {
            let author = ctx
                .author_member()
                .await
                .ok_or("This command can only be used by guild members")?;
            MemberView::from(author.as_ref())
        }
    };

    let discord = SerenityDiscordService::from(ctx.serenity_context());
    let status = ctx.data().validation.validate_member(&discord, &member).await;

    let reply = reply_record(&member, &status);
    ctx.send(poise::CreateReply::default().embed(reply.to_embed()))
        .await?;
    Ok(())
}
