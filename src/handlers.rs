use poise::serenity_prelude::{
    self as serenity, ChannelId, Context, EventHandler, GuildId, GuildMemberUpdateEvent, Member,
    Message, MessageId, MessageUpdateEvent, Ready, User,
};
use tracing::{debug, info, warn};

use crate::data::Data;
use crate::discord::{DiscordService, SerenityDiscordService};
use crate::embed::{Colors, LogRecord};
use crate::moderation::{MemberView, MessageView, UserView};
use crate::EVENT_TARGET;

/// Gateway event handler, forwarding events to the moderation adapters
pub struct Handler {
    data: Data,
}

impl Handler {
    #[must_use]
    pub const fn new(data: Data) -> Self {
        Self { data }
    }

    /// Keep a guild message around for the delete log. Bot messages are kept
    /// too, so their deletion is recognised and skipped.
    fn remember_message(&self, message: MessageView) {
        self.data.recent_messages.insert(message);
    }

    async fn log_deleted(
        &self,
        discord: &dyn DiscordService,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> bool {
        let cached = self.data.recent_messages.take(message_id);
        self.data
            .logs
            .message_deleted(discord, channel_id, message_id, cached.as_ref())
            .await
    }
}

/// Startup notice for the dev log channel
#[must_use]
pub fn ready_record(bot: &UserView, shard: u32, guilds: usize) -> LogRecord {
    LogRecord::new(Colors::GREEN)
        .title("Bot ready!")
        .description(format!(
            "Connected as {} on shard {shard}, serving {guilds} guild(s).",
            bot.describe()
        ))
        .thumbnail(&bot.avatar_url)
}

fn current_user(ctx: &Context) -> UserView {
    UserView::from(&**ctx.cache.current_user())
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let bot = UserView::from(&*ready.user);
        let shard_id = ctx.shard_id;
        info!(target: EVENT_TARGET, "Connected as {}, shard {shard_id}", bot.tag);

        let discord = SerenityDiscordService::from(&ctx);
        let record = ready_record(&bot, shard_id.0, ready.guilds.len());
        self.data.dev_log.post(&discord, record).await;
    }

    /// Remember guild messages for delete logs, relay DMs.
    async fn message(&self, ctx: Context, new_message: Message) {
        let message = MessageView::from(&new_message);
        if !message.is_direct() {
            self.remember_message(message);
            return;
        }

        let discord = SerenityDiscordService::from(&ctx);
        let bot = current_user(&ctx);
        if self.data.messages.relay_inbound(&discord, &bot, &message).await {
            debug!(target: EVENT_TARGET, author = %message.author.id, "Relayed direct message");
        }
    }

    async fn message_update(
        &self,
        ctx: Context,
        old_if_available: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let Some(before) = old_if_available
            .as_ref()
            .map(MessageView::from)
            .or_else(|| self.data.recent_messages.get(event.id))
        else {
            debug!(target: EVENT_TARGET, message_id = %event.id, "Edited message not cached");
            return;
        };
        if before.is_direct() {
            return;
        }

        let after = match new.as_ref() {
            Some(message) => MessageView::from(message),
            None => match event.content {
                Some(content) => MessageView { content, ..before.clone() },
                // Embed-only updates carry no content
                None => return,
            },
        };
        self.data
            .recent_messages
            .update_content(after.id, &after.content);

        let discord = SerenityDiscordService::from(&ctx);
        self.data.logs.message_edited(&discord, &before, &after).await;
    }

    async fn message_delete(
        &self,
        ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        if guild_id.is_none() {
            return;
        }

        let discord = SerenityDiscordService::from(&ctx);
        self.log_deleted(&discord, channel_id, deleted_message_id).await;
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let member = MemberView::from(&new_member);
        info!(
            target: EVENT_TARGET,
            user_id = %member.user.id,
            guild_id = %member.guild_id,
            "Member joined"
        );

        let discord = SerenityDiscordService::from(&ctx);
        tokio::join!(
            self.data.logs.member_joined(&discord, &member.user),
            self.data.validation.validate_member(&discord, &member),
        );
    }

    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        info!(target: EVENT_TARGET, user_id = %user.id, guild_id = %guild_id, "Member left");
        let discord = SerenityDiscordService::from(&ctx);
        self.data
            .logs
            .member_left(&discord, &UserView::from(&user))
            .await;
    }

    async fn guild_member_update(
        &self,
        ctx: Context,
        old_if_available: Option<Member>,
        new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let Some(before) = old_if_available.as_ref().map(MemberView::from) else {
            debug!(
                target: EVENT_TARGET,
                user_id = %event.user.id,
                "Previous member state not cached"
            );
            return;
        };
        let after = match new.as_ref() {
            Some(member) => MemberView::from(member),
            None => MemberView {
                user: UserView::from(&event.user),
                guild_id: event.guild_id,
                nick: event.nick,
            },
        };

        let discord = SerenityDiscordService::from(&ctx);
        self.data.logs.nickname_updated(&discord, &before, &after).await;
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!("Cache ready! The bot is in {guild_count} guild(s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::discord::MockDiscordService;
    use crate::membership::MockMembershipApi;
    use crate::moderation::testing::recording_discord;
    use std::sync::Arc;

    fn handler() -> Handler {
        let api = Arc::new(MockMembershipApi::new());
        Handler::new(Data::with_membership_api(Config::test(), api))
    }

    fn guild_message(id: u64, author: UserView) -> MessageView {
        MessageView {
            id: MessageId::new(id),
            channel_id: ChannelId::new(20),
            guild_id: Some(GuildId::new(1)),
            author,
            content: "some text".to_string(),
            link: String::new(),
        }
    }

    #[tokio::test]
    async fn test_deleted_bot_message_is_not_logged() {
        let handler = handler();
        let mut bot = UserView::test_user(3, "helper");
        bot.bot = true;
        handler.remember_message(guild_message(500, bot));

        let mut discord = MockDiscordService::new();
        discord.expect_resolve_channel().never();
        discord.expect_send_record().never();

        assert!(
            !handler
                .log_deleted(&discord, ChannelId::new(20), MessageId::new(500))
                .await
        );
        assert!(handler.data.recent_messages.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_member_message_shows_content() {
        let handler = handler();
        handler.remember_message(guild_message(501, UserView::test_user(42, "ada")));
        let (discord, sent) = recording_discord();

        assert!(
            handler
                .log_deleted(&discord, ChannelId::new(20), MessageId::new(501))
                .await
        );
        let sent = sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.field_value("Content"), Some("```some text```"));
    }

    #[tokio::test]
    async fn test_deleted_unseen_message_is_logged_as_uncached() {
        let handler = handler();
        let (discord, sent) = recording_discord();

        assert!(
            handler
                .log_deleted(&discord, ChannelId::new(20), MessageId::new(502))
                .await
        );
        let sent = sent.lock().expect("lock");
        assert_eq!(
            sent[0].1.description.as_deref(),
            Some("The message in <#20> wasn't cached, and cannot be displayed.")
        );
    }

    #[test]
    fn test_handler_implements_event_handler() {
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }

    #[test]
    fn test_ready_record() {
        let bot = UserView::test_user(1, "osfbot");
        let record = ready_record(&bot, 0, 3);
        assert_eq!(record.title.as_deref(), Some("Bot ready!"));
        assert_eq!(
            record.description.as_deref(),
            Some("Connected as <@1> **(osfbot) (1)** on shard 0, serving 3 guild(s).")
        );
    }
}
