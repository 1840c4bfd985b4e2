//! Outbound Discord calls used by the adapters
//!
//! Adapters only ever talk to Discord through `DiscordService`, which keeps
//! them testable against a mock. `SerenityDiscordService` is the production
//! implementation over serenity's REST client.

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::builder::CreateMessage;
use serenity::{ChannelId, GuildId, Http, RoleId, UserId};
use tracing::debug;

use crate::embed::LogRecord;
use crate::error::{BotError, BotResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscordService: Send + Sync {
    /// Confirm that a channel exists and is reachable
    async fn resolve_channel(&self, channel_id: ChannelId) -> BotResult<ChannelId>;

    /// Confirm that a role exists in the given guild
    async fn resolve_role(&self, guild_id: GuildId, role_id: RoleId) -> BotResult<RoleId>;

    /// Post a display record to a channel
    async fn send_record(&self, channel_id: ChannelId, record: LogRecord) -> BotResult<()>;

    /// Send a plain direct message to a user
    async fn send_direct_message(&self, user_id: UserId, content: String) -> BotResult<()>;

    /// Give a member a role
    async fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> BotResult<()>;
}

/// `DiscordService` backed by serenity's HTTP client
#[derive(Clone)]
pub struct SerenityDiscordService {
    http: Arc<Http>,
}

impl SerenityDiscordService {
    #[must_use]
    pub const fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl From<&serenity::Context> for SerenityDiscordService {
    fn from(ctx: &serenity::Context) -> Self {
        Self::new(Arc::clone(&ctx.http))
    }
}

#[async_trait]
impl DiscordService for SerenityDiscordService {
    async fn resolve_channel(&self, channel_id: ChannelId) -> BotResult<ChannelId> {
        let channel = self.http.get_channel(channel_id).await?;
        debug!("Resolved channel {channel_id}");
        Ok(channel.id())
    }

    async fn resolve_role(&self, guild_id: GuildId, role_id: RoleId) -> BotResult<RoleId> {
        let roles = self.http.get_guild_roles(guild_id).await?;
        roles
            .iter()
            .find(|role| role.id == role_id)
            .map(|role| role.id)
            .ok_or(BotError::Unresolved {
                kind: "role",
                id: role_id.get(),
            })
    }

    async fn send_record(&self, channel_id: ChannelId, record: LogRecord) -> BotResult<()> {
        channel_id
            .send_message(self.http.as_ref(), record.to_message())
            .await?;
        Ok(())
    }

    async fn send_direct_message(&self, user_id: UserId, content: String) -> BotResult<()> {
        let channel = user_id.create_dm_channel(self.http.as_ref()).await?;
        channel
            .send_message(self.http.as_ref(), CreateMessage::new().content(content))
            .await?;
        Ok(())
    }

    async fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> BotResult<()> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some("Validated OSF member"))
            .await?;
        Ok(())
    }
}
