//! Moderation log: message deletes and edits, member joins, leaves and
//! nickname changes, posted to the log channel.

use poise::serenity_prelude::{ChannelId, MessageId};

use super::{LogChannel, MemberView, MessageView, UserView};
use crate::discord::DiscordService;
use crate::embed::{Colors, LogRecord, code_block, discord_timestamp};

pub struct ModerationLogs {
    log_channel: LogChannel,
}

impl ModerationLogs {
    #[must_use]
    pub fn new(log_channel_id: ChannelId) -> Self {
        Self {
            log_channel: LogChannel::new("log channel", log_channel_id),
        }
    }

    #[must_use]
    pub const fn channel(&self) -> &LogChannel {
        &self.log_channel
    }

    /// Log a deleted message. `cached` is `None` when we never saw it.
    pub async fn message_deleted(
        &self,
        discord: &dyn DiscordService,
        channel_id: ChannelId,
        message_id: MessageId,
        cached: Option<&MessageView>,
    ) -> bool {
        match deleted_record(channel_id, message_id, cached) {
            Some(record) => self.log_channel.post(discord, record).await,
            None => false,
        }
    }

    pub async fn message_edited(
        &self,
        discord: &dyn DiscordService,
        before: &MessageView,
        after: &MessageView,
    ) -> bool {
        match edited_record(before, after) {
            Some(record) => self.log_channel.post(discord, record).await,
            None => false,
        }
    }

    pub async fn member_joined(&self, discord: &dyn DiscordService, user: &UserView) -> bool {
        let record = membership_record(user, format!("Member Joined ({})", user.id), Colors::GREEN);
        self.log_channel.post(discord, record).await
    }

    pub async fn member_left(&self, discord: &dyn DiscordService, user: &UserView) -> bool {
        let record = membership_record(user, format!("Member Left ({})", user.id), Colors::RED);
        self.log_channel.post(discord, record).await
    }

    pub async fn nickname_updated(
        &self,
        discord: &dyn DiscordService,
        before: &MemberView,
        after: &MemberView,
    ) -> bool {
        match nickname_record(before, after) {
            Some(record) => self.log_channel.post(discord, record).await,
            None => false,
        }
    }
}

fn deleted_record(
    channel_id: ChannelId,
    message_id: MessageId,
    cached: Option<&MessageView>,
) -> Option<LogRecord> {
    let title = format!("Message Deleted ({message_id})");

    let Some(message) = cached else {
        return Some(LogRecord::new(Colors::RED).title(title).description(format!(
            "The message in <#{channel_id}> wasn't cached, and cannot be displayed."
        )));
    };
    if message.author.bot {
        return None;
    }

    Some(
        LogRecord::new(Colors::RED)
            .title(title)
            .thumbnail(&message.author.avatar_url)
            .field("Author", message.author.describe(), false)
            .field(
                "Channel",
                format!("<#{0}> **({0})**", message.channel_id),
                false,
            )
            .field("Content", code_block(&message.content), false),
    )
}

fn edited_record(before: &MessageView, after: &MessageView) -> Option<LogRecord> {
    if after.author.bot || before.content == after.content {
        return None;
    }

    Some(
        LogRecord::new(Colors::YELLOW)
            .title(format!("Message Edited ({})", after.id))
            .thumbnail(&after.author.avatar_url)
            .field("Author", after.author.describe(), false)
            .field("Before", code_block(&before.content), false)
            .field("After", code_block(&after.content), false)
            .link("Jump to message", &after.link),
    )
}

fn membership_record(user: &UserView, title: String, color: u32) -> LogRecord {
    LogRecord::new(color)
        .title(title)
        .thumbnail(&user.avatar_url)
        .field("Name", &user.tag, true)
        .field("Profile", user.mention(), true)
        .field("Account Created", discord_timestamp(user.created_at), true)
}

fn nickname_record(before: &MemberView, after: &MemberView) -> Option<LogRecord> {
    if before.nick == after.nick {
        return None;
    }

    let show = |nick: &Option<String>| nick.clone().unwrap_or_else(|| "None".to_string());
    Some(
        LogRecord::new(Colors::BLUE)
            .title(format!("Nickname Updated ({})", after.user.id))
            .thumbnail(&after.user.avatar_url)
            .field("Profile", after.user.mention(), true)
            .field("Before", show(&before.nick), true)
            .field("After", show(&after.nick), true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{CONTENT_LIMIT, FIELD_VALUE_LIMIT};
    use crate::moderation::testing::{member, recording_discord};
    use poise::serenity_prelude::GuildId;

    fn message(content: &str) -> MessageView {
        MessageView {
            id: MessageId::new(500),
            channel_id: ChannelId::new(20),
            guild_id: Some(GuildId::new(1)),
            author: UserView::test_user(42, "ada"),
            content: content.to_string(),
            link: "https://discord.com/channels/1/20/500".to_string(),
        }
    }

    #[test]
    fn test_deleted_cached_message() {
        let record = deleted_record(ChannelId::new(20), MessageId::new(500), Some(&message("hi")))
            .expect("record");
        assert_eq!(record.title.as_deref(), Some("Message Deleted (500)"));
        assert_eq!(record.color, Colors::RED);
        assert_eq!(record.field_value("Author"), Some("<@42> **(ada) (42)**"));
        assert_eq!(record.field_value("Channel"), Some("<#20> **(20)**"));
        assert_eq!(record.field_value("Content"), Some("```hi```"));
    }

    #[test]
    fn test_deleted_uncached_message() {
        let record = deleted_record(ChannelId::new(20), MessageId::new(500), None).expect("record");
        assert!(record.fields.is_empty());
        assert_eq!(
            record.description.as_deref(),
            Some("The message in <#20> wasn't cached, and cannot be displayed.")
        );
    }

    #[test]
    fn test_deleted_bot_message_is_skipped() {
        let mut cached = message("beep");
        cached.author.bot = true;
        assert!(deleted_record(ChannelId::new(20), MessageId::new(500), Some(&cached)).is_none());
    }

    #[test]
    fn test_unchanged_edit_is_skipped() {
        assert!(edited_record(&message("same"), &message("same")).is_none());
    }

    #[test]
    fn test_edit_record_fields() {
        let record = edited_record(&message("before"), &message("after")).expect("record");
        assert_eq!(record.title.as_deref(), Some("Message Edited (500)"));
        assert_eq!(record.color, Colors::YELLOW);
        assert_eq!(record.field_value("Before"), Some("```before```"));
        assert_eq!(record.field_value("After"), Some("```after```"));
        let link = record.link.expect("jump link");
        assert_eq!(link.label, "Jump to message");
        assert_eq!(link.url, "https://discord.com/channels/1/20/500");
    }

    #[test]
    fn test_edit_of_long_message_is_truncated() {
        let long = "z".repeat(CONTENT_LIMIT * 2);
        let record = edited_record(&message("short"), &message(&long)).expect("record");
        let after = record.field_value("After").expect("after field");
        assert!(after.chars().count() <= FIELD_VALUE_LIMIT);
        assert!(after.ends_with("...```"));
    }

    #[test]
    fn test_member_join_and_leave_records() {
        let user = UserView::test_user(42, "ada");
        let joined = membership_record(&user, "Member Joined (42)".into(), Colors::GREEN);
        assert_eq!(joined.field_value("Name"), Some("ada"));
        assert_eq!(joined.field_value("Profile"), Some("<@42>"));
        assert_eq!(
            joined.field_value("Account Created"),
            Some("<t:1600000000:f> (<t:1600000000:R>)")
        );
        assert!(joined.fields.iter().all(|f| f.inline));
    }

    #[test]
    fn test_nickname_records() {
        let before = member(42, 1);
        let mut after = member(42, 1);
        assert!(nickname_record(&before, &after).is_none());

        after.nick = Some("Ada L.".to_string());
        let record = nickname_record(&before, &after).expect("record");
        assert_eq!(record.color, Colors::BLUE);
        assert_eq!(record.field_value("Before"), Some("None"));
        assert_eq!(record.field_value("After"), Some("Ada L."));
    }

    #[tokio::test]
    async fn test_edits_post_only_when_content_changes() {
        let (discord, sent) = recording_discord();
        let logs = ModerationLogs::new(ChannelId::new(99));

        assert!(!logs.message_edited(&discord, &message("a"), &message("a")).await);
        assert!(logs.message_edited(&discord, &message("a"), &message("b")).await);

        let sent = sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChannelId::new(99));
    }

    #[tokio::test]
    async fn test_member_left_posts_to_log_channel() {
        let (discord, sent) = recording_discord();
        let logs = ModerationLogs::new(ChannelId::new(99));

        assert!(logs.member_left(&discord, &UserView::test_user(7, "bob")).await);
        let sent = sent.lock().expect("lock");
        assert_eq!(sent[0].1.title.as_deref(), Some("Member Left (7)"));
        assert_eq!(sent[0].1.color, Colors::RED);
    }
}
