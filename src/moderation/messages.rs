//! DM relay: incoming DMs are mirrored to the DM log channel, and moderators
//! can DM members through the bot with `/message`.

use poise::serenity_prelude::{self as serenity, ChannelId};
use tracing::info;

use super::{LogChannel, MessageView, UserView};
use crate::commands::is_moderator;
use crate::discord::{DiscordService, SerenityDiscordService};
use crate::embed::{Colors, LogRecord};
use crate::error::BotResult;
use crate::{Context, Error};

pub struct DirectMessages {
    dm_log_channel: LogChannel,
}

impl DirectMessages {
    #[must_use]
    pub fn new(dm_log_channel_id: ChannelId) -> Self {
        Self {
            dm_log_channel: LogChannel::new("DM log channel", dm_log_channel_id),
        }
    }

    #[must_use]
    pub const fn channel(&self) -> &LogChannel {
        &self.dm_log_channel
    }

    /// Mirror a DM the bot received. Guild messages and the bot's own
    /// messages are ignored.
    pub async fn relay_inbound(
        &self,
        discord: &dyn DiscordService,
        bot: &UserView,
        message: &MessageView,
    ) -> bool {
        if !message.is_direct() || message.author.id == bot.id {
            return false;
        }
        let record = relay_record(&message.author, bot, &message.content);
        self.dm_log_channel.post(discord, record).await
    }

    /// DM `receiver` on behalf of `author` and log it once delivered
    ///
    /// # Errors
    ///
    /// Returns `BotError::Forbidden` if the user does not accept DMs from the
    /// bot, or any other Discord error from the send.
    pub async fn send(
        &self,
        discord: &dyn DiscordService,
        author: &UserView,
        receiver: &UserView,
        content: &str,
    ) -> BotResult<()> {
        info!("Sending message {content:?} to {}", receiver.tag);
        discord
            .send_direct_message(receiver.id, content.to_string())
            .await?;
        self.dm_log_channel
            .post(discord, relay_record(author, receiver, content))
            .await;
        Ok(())
    }
}

/// Record for one relayed DM, in either direction
#[must_use]
pub fn relay_record(author: &UserView, receiver: &UserView, content: &str) -> LogRecord {
    let description = if content.is_empty() { "<N/A>" } else { content };
    LogRecord::new(Colors::CLIENT_DARK)
        .description(description)
        .author(
            format!("{} ({})", author.tag, author.id),
            Some(author.avatar_url.clone()),
        )
        .footer(
            format!("{} -> {}", author.name, receiver.name),
            Some(receiver.avatar_url.clone()),
        )
}

fn failed_record(author: &UserView, receiver: &UserView) -> LogRecord {
    LogRecord::new(Colors::RED).title("DM Failed").footer(
        format!("{} -> {}", author.tag, receiver.tag),
        Some(author.avatar_url.clone()),
    )
}

/// Allows moderators to DM specific users.
#[poise::command(slash_command, guild_only, ephemeral, check = "is_moderator")]
pub async fn message(
    ctx: Context<'_>,
    #[description = "Who to message"] user: serenity::User,
    #[description = "What to send"] message: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let discord = SerenityDiscordService::from(ctx.serenity_context());
    let author = UserView::from(ctx.author());
    let receiver = UserView::from(&user);

    match ctx
        .data()
        .messages
        .send(&discord, &author, &receiver, &message)
        .await
    {
        Ok(()) => {
            ctx.say("DM Sent.").await?;
        }
        Err(err) if err.is_forbidden() => {
            let record = failed_record(&author, &receiver);
            ctx.send(poise::CreateReply::default().embed(record.to_embed()))
                .await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::MockDiscordService;
    use crate::error::BotError;
    use crate::moderation::testing::recording_discord;
    use poise::serenity_prelude::{GuildId, MessageId};

    fn dm(author: UserView, guild: Option<u64>) -> MessageView {
        MessageView {
            id: MessageId::new(1),
            channel_id: ChannelId::new(2),
            guild_id: guild.map(GuildId::new),
            author,
            content: "hello there".to_string(),
            link: String::new(),
        }
    }

    #[tokio::test]
    async fn test_inbound_dm_produces_one_record() {
        let (discord, sent) = recording_discord();
        let relay = DirectMessages::new(ChannelId::new(77));
        let bot = UserView::test_user(1, "osfbot");
        let sender = UserView::test_user(42, "ada");

        assert!(relay.relay_inbound(&discord, &bot, &dm(sender, None)).await);

        let sent = sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        let (channel, record) = &sent[0];
        assert_eq!(*channel, ChannelId::new(77));
        assert_eq!(record.description.as_deref(), Some("hello there"));
        assert_eq!(record.author.as_ref().map(|a| a.text.as_str()), Some("ada (42)"));
        assert_eq!(
            record.footer.as_ref().map(|f| f.text.as_str()),
            Some("ada -> osfbot")
        );
    }

    #[tokio::test]
    async fn test_own_and_guild_messages_are_not_relayed() {
        let mut discord = MockDiscordService::new();
        discord.expect_resolve_channel().never();
        discord.expect_send_record().never();
        let relay = DirectMessages::new(ChannelId::new(77));
        let bot = UserView::test_user(1, "osfbot");

        assert!(!relay.relay_inbound(&discord, &bot, &dm(bot.clone(), None)).await);
        let member = UserView::test_user(42, "ada");
        assert!(!relay.relay_inbound(&discord, &bot, &dm(member, Some(5))).await);
    }

    #[tokio::test]
    async fn test_outbound_dm_is_logged_with_moderator_as_sender() {
        let (mut discord, sent) = recording_discord();
        discord
            .expect_send_direct_message()
            .withf(|user, content| *user == serenity::UserId::new(42) && content == "welcome")
            .times(1)
            .returning(|_, _| Ok(()));
        let relay = DirectMessages::new(ChannelId::new(77));
        let moderator = UserView::test_user(9, "mod");
        let user = UserView::test_user(42, "ada");

        relay
            .send(&discord, &moderator, &user, "welcome")
            .await
            .expect("sent");

        let sent = sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1.footer.as_ref().map(|f| f.text.as_str()),
            Some("mod -> ada")
        );
    }

    #[tokio::test]
    async fn test_forbidden_dm_is_not_logged() {
        let mut discord = MockDiscordService::new();
        discord
            .expect_send_direct_message()
            .returning(|_, _| Err(BotError::Forbidden("Cannot send messages to this user".into())));
        discord.expect_send_record().never();
        let relay = DirectMessages::new(ChannelId::new(77));

        let err = relay
            .send(
                &discord,
                &UserView::test_user(9, "mod"),
                &UserView::test_user(42, "ada"),
                "hi",
            )
            .await
            .expect_err("forbidden");
        assert!(err.is_forbidden());
    }

    #[test]
    fn test_empty_dm_placeholder() {
        let record = relay_record(
            &UserView::test_user(1, "a"),
            &UserView::test_user(2, "b"),
            "",
        );
        assert_eq!(record.description.as_deref(), Some("<N/A>"));
    }

    #[test]
    fn test_failed_record() {
        let record = failed_record(&UserView::test_user(9, "mod"), &UserView::test_user(42, "ada"));
        assert_eq!(record.title.as_deref(), Some("DM Failed"));
        assert_eq!(record.color, Colors::RED);
        assert_eq!(record.footer.map(|f| f.text), Some("mod -> ada".to_string()));
    }

    #[test]
    fn test_message_command_definition() {
        let cmd = message();
        assert_eq!(cmd.name, "message");
        assert!(cmd.guild_only);
        assert_eq!(cmd.checks.len(), 1);
        assert!(cmd.create_as_slash_command().is_some());
    }
}
