//! Moderation adapters: logs, DM relay and membership validation
//!
//! Events are converted into the small view types below at the handler
//! boundary, so the adapters never touch serenity models directly.

pub mod logs;
pub mod messages;
pub mod validate;

use poise::serenity_prelude as serenity;
use serenity::{ChannelId, GuildId, Member, Message, MessageId, User, UserId};
use tracing::{debug, error};

use crate::data::Resolved;
use crate::discord::DiscordService;
use crate::embed::LogRecord;

/// The parts of a user the log records display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    /// `name#discriminator`, or just the name for migrated accounts
    pub tag: String,
    pub avatar_url: String,
    pub bot: bool,
    /// Account creation time as a unix timestamp
    pub created_at: i64,
}

impl UserView {
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// `{mention} **({name}) ({id})**`
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} **({}) ({})**", self.mention(), self.name, self.id)
    }

    #[cfg(test)]
    pub fn test_user(id: u64, name: &str) -> Self {
        Self {
            id: UserId::new(id),
            name: name.to_string(),
            tag: name.to_string(),
            avatar_url: format!("https://cdn.discordapp.com/embed/avatars/{}.png", id % 5),
            bot: false,
            created_at: 1_600_000_000,
        }
    }
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            tag: user.tag(),
            avatar_url: user.face(),
            bot: user.bot,
            created_at: user.id.created_at().unix_timestamp(),
        }
    }
}

/// A message as it looked when we saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub author: UserView,
    pub content: String,
    pub link: String,
}

impl MessageView {
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            channel_id: message.channel_id,
            guild_id: message.guild_id,
            author: UserView::from(&message.author),
            content: message.content.clone(),
            link: message.link(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberView {
    pub user: UserView,
    pub guild_id: GuildId,
    pub nick: Option<String>,
}

impl From<&Member> for MemberView {
    fn from(member: &Member) -> Self {
        Self {
            user: UserView::from(&member.user),
            guild_id: member.guild_id,
            nick: member.nick.clone(),
        }
    }
}

/// A configured log channel, resolved once and then reused
#[derive(Debug)]
pub struct LogChannel {
    id: ChannelId,
    handle: Resolved<ChannelId>,
}

impl LogChannel {
    #[must_use]
    pub fn new(label: &'static str, id: ChannelId) -> Self {
        Self {
            id,
            handle: Resolved::new(label),
        }
    }

    /// Resolve the channel if that has not happened yet
    pub async fn resolve(&self, discord: &dyn DiscordService) -> Option<ChannelId> {
        self.handle
            .get_or_resolve(|| discord.resolve_channel(self.id))
            .await
            .copied()
    }

    /// Post a record, skipping quietly if the channel never resolved
    ///
    /// Returns whether the record was delivered.
    pub async fn post(&self, discord: &dyn DiscordService, record: LogRecord) -> bool {
        let Some(channel_id) = self.resolve(discord).await else {
            debug!(channel_id = %self.id, "Log channel unavailable, dropping record");
            return false;
        };

        match discord.send_record(channel_id, record).await {
            Ok(()) => true,
            Err(err) => {
                error!(channel_id = %channel_id, error = %err, "Failed to post log record");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the adapter tests

    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::discord::MockDiscordService;

    /// A mock that resolves every channel and records what gets posted
    pub fn recording_discord() -> (MockDiscordService, Arc<Mutex<Vec<(ChannelId, LogRecord)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut discord = MockDiscordService::new();
        discord
            .expect_resolve_channel()
            .times(0..=1)
            .returning(Ok);
        let sink = Arc::clone(&sent);
        discord.expect_send_record().returning(move |channel, record| {
            sink.lock().expect("lock").push((channel, record));
            Ok(())
        });
        (discord, sent)
    }

    pub fn member(id: u64, guild: u64) -> MemberView {
        MemberView {
            user: UserView::test_user(id, &format!("user{id}")),
            guild_id: GuildId::new(guild),
            nick: None,
        }
    }
}
