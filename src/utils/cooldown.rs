//! Per-user rate limit allowing a burst of uses within a window

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use poise::serenity_prelude::UserId;
use tokio::time::Instant;

pub struct UsageLimit {
    uses: usize,
    per: Duration,
    hits: DashMap<UserId, VecDeque<Instant>>,
}

impl UsageLimit {
    #[must_use]
    pub fn new(uses: usize, per: Duration) -> Self {
        Self {
            uses,
            per,
            hits: DashMap::new(),
        }
    }

    /// Record a use by `user`
    ///
    /// # Errors
    ///
    /// Returns the time left until the user may try again when they have used
    /// up their allowance for the current window.
    pub fn try_use(&self, user: UserId) -> Result<(), Duration> {
        let now = Instant::now();
        let mut hits = self.hits.entry(user).or_default();
        while hits
            .front()
            .is_some_and(|first| now.duration_since(*first) >= self.per)
        {
            hits.pop_front();
        }

        if hits.len() >= self.uses {
            let waited = hits
                .front()
                .map_or(Duration::ZERO, |first| now.duration_since(*first));
            return Err(self.per.saturating_sub(waited));
        }
        hits.push_back(now);
        Ok(())
    }
}
