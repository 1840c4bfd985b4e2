use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter},
    future::Future,
    sync::{Arc, Mutex},
};

use dashmap::DashMap;
use derive_more::Deref;
use poise::serenity_prelude as serenity;
use serenity::MessageId;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::Config;
use crate::discord::DiscordService;
use crate::error::BotResult;
use crate::membership::{MembershipApi, OsfDatabaseClient};
use crate::moderation::{
    LogChannel, MessageView, logs::ModerationLogs, messages::DirectMessages,
    validate::Validation,
};
use crate::utils::cooldown::UsageLimit;
use crate::utils::stats::{PING_USES, PING_WINDOW};

/// Number of guild messages remembered for delete logs
pub const RECENT_MESSAGE_CAPACITY: usize = 1000;

/// A channel or role handle resolved at most once per process
///
/// Concurrent first callers wait on the same resolution. A failed resolution
/// is logged once and remembered as `None`.
pub struct Resolved<T> {
    label: &'static str,
    cell: OnceCell<Option<T>>,
}

impl<T> Resolved<T> {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            cell: OnceCell::new(),
        }
    }

    /// Return the cached handle, resolving it first if nobody has yet
    pub async fn get_or_resolve<F, Fut>(&self, resolve: F) -> Option<&T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BotResult<T>>,
    {
        self.cell
            .get_or_init(|| async move {
                match resolve().await {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        error!(handle = self.label, error = %err, "Failed to resolve handle");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// The handle, if resolution already happened and succeeded
    #[cfg(test)]
    pub fn get(&self) -> Option<&T> {
        self.cell.get().and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T: Debug> Debug for Resolved<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("label", &self.label)
            .field("value", &self.cell.get())
            .finish()
    }
}

/// Bounded cache of recently seen guild messages
///
/// Serenity drops a message from its own cache before the delete event
/// reaches us, so the delete log reads the content from here.
pub struct RecentMessages {
    capacity: usize,
    messages: DashMap<MessageId, MessageView>,
    order: Mutex<VecDeque<MessageId>>,
}

impl RecentMessages {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: DashMap::new(),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Remember a message, evicting the oldest once full
    pub fn insert(&self, message: MessageView) {
        let id = message.id;
        if self.messages.insert(id, message).is_some() {
            return;
        }

        let evicted = {
            let mut order = self
                .order
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            order.push_back(id);
            if order.len() > self.capacity {
                order.pop_front()
            } else {
                None
            }
        };
        if let Some(oldest) = evicted {
            self.messages.remove(&oldest);
        }
    }

    /// Update the content of a remembered message after an edit
    pub fn update_content(&self, id: MessageId, content: &str) {
        if let Some(mut entry) = self.messages.get_mut(&id) {
            entry.content = content.to_string();
        }
    }

    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<MessageView> {
        self.messages.get(&id).map(|entry| entry.value().clone())
    }

    /// Forget a message and hand it back, used when it is deleted
    pub fn take(&self, id: MessageId) -> Option<MessageView> {
        self.messages.remove(&id).map(|(_, message)| message)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Centralized data structure for the bot
#[derive(Clone, Deref)]
pub struct Data(pub Arc<DataInner>);

impl Debug for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .field("dev_log", &self.dev_log)
            .field("recent_messages", &self.recent_messages.len())
            .finish_non_exhaustive()
    }
}

impl Data {
    /// Build the shared state, talking to the membership API over HTTP
    #[must_use]
    pub fn new(config: Config) -> Self {
        let api = Arc::new(OsfDatabaseClient::new(config.validation_base_url.clone()));
        Self::with_membership_api(config, api)
    }

    /// Build the shared state around any membership API implementation
    #[must_use]
    pub fn with_membership_api(config: Config, api: Arc<dyn MembershipApi>) -> Self {
        Self(Arc::new(DataInner::new(config, api)))
    }

    /// Resolve every configured log channel up front
    ///
    /// Unresolvable channels are logged here, and the adapters that post to
    /// them skip their sends for the rest of the process.
    pub async fn prime(&self, discord: &dyn DiscordService) {
        tokio::join!(
            self.dev_log.resolve(discord),
            self.logs.channel().resolve(discord),
            self.messages.channel().resolve(discord),
            self.validation.channel().resolve(discord),
        );
        info!("Log channels resolved");
    }
}

/// Main centralized data structure for the bot
pub struct DataInner {
    pub config: Config,
    /// Operations channel for startup notices
    pub dev_log: LogChannel,
    pub logs: ModerationLogs,
    pub messages: DirectMessages,
    pub validation: Validation,
    pub recent_messages: RecentMessages,
    pub ping_limit: UsageLimit,
}

impl DataInner {
    #[must_use]
    pub fn new(config: Config, api: Arc<dyn MembershipApi>) -> Self {
        let channels = config.channels;
        let roles = config.roles;
        Self {
            dev_log: LogChannel::new("dev log channel", channels.dev_log),
            logs: ModerationLogs::new(channels.log),
            messages: DirectMessages::new(channels.dm_log),
            validation: Validation::new(channels.log, roles.osf_member, api),
            recent_messages: RecentMessages::new(RECENT_MESSAGE_CAPACITY),
            ping_limit: UsageLimit::new(PING_USES, PING_WINDOW),
            config,
        }
    }
}

/// Tests for the data module
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::moderation::UserView;
    use super::serenity::{ChannelId, UserId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(id: u64) -> MessageView {
        MessageView {
            id: MessageId::new(id),
            channel_id: ChannelId::new(10),
            guild_id: None,
            author: UserView::test_user(5, "someone"),
            content: format!("message {id}"),
            link: String::new(),
        }
    }

    #[tokio::test]
    async fn test_resolved_runs_once_under_concurrency() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let handle: Resolved<u64> = Resolved::new("test");
        let resolve = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(7)
        };

        let (a, b, c, d) = tokio::join!(
            handle.get_or_resolve(resolve),
            handle.get_or_resolve(resolve),
            handle.get_or_resolve(resolve),
            handle.get_or_resolve(resolve),
        );

        assert_eq!([a, b, c, d], [Some(&7); 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.get(), Some(&7));
    }

    #[tokio::test]
    async fn test_failed_resolution_is_remembered() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let handle: Resolved<u64> = Resolved::new("test");
        let resolve = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(BotError::Unresolved { kind: "channel", id: 1 })
        };

        assert!(handle.get_or_resolve(resolve).await.is_none());
        assert!(handle.get_or_resolve(resolve).await.is_none());
        assert!(handle.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recent_messages_evicts_oldest() {
        let cache = RecentMessages::new(2);
        cache.insert(message(1));
        cache.insert(message(2));
        cache.insert(message(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(MessageId::new(1)).is_none());
        assert!(cache.get(MessageId::new(3)).is_some());
    }

    #[test]
    fn test_recent_messages_update_and_take() {
        let cache = RecentMessages::new(10);
        cache.insert(message(1));
        cache.update_content(MessageId::new(1), "edited");

        let taken = cache.take(MessageId::new(1)).expect("cached");
        assert_eq!(taken.content, "edited");
        assert!(cache.is_empty());
        assert_eq!(taken.author.id, UserId::new(5));
    }
}
