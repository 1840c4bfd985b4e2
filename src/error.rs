//! Error types shared by the adapters
//!
//! Command handlers still return the boxed framework `Error`; these variants
//! exist so adapters can tell a permission failure apart from anything else.

use ::serenity::http::HttpError;
use poise::serenity_prelude as serenity;
use thiserror::Error;

/// Errors that can occur while talking to Discord or the membership API
#[derive(Debug, Error)]
pub enum BotError {
    /// Discord API error
    #[error("Discord API error: {0}")]
    Discord(Box<serenity::Error>),

    /// Discord answered with 403
    #[error("Missing permissions: {0}")]
    Forbidden(String),

    /// A configured channel or role does not exist or is not reachable
    #[error("Failed to get {kind} with ID ({id})")]
    Unresolved { kind: &'static str, id: u64 },

    /// Transport or decoding failure against the membership API
    #[error("Membership API request failed: {0}")]
    Membership(#[from] reqwest::Error),
}

impl From<serenity::Error> for BotError {
    fn from(error: serenity::Error) -> Self {
        if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &error {
            if response.status_code.as_u16() == 403 {
                return Self::Forbidden(response.error.message.clone());
            }
        }
        Self::Discord(Box::new(error))
    }
}

impl BotError {
    /// Whether the platform refused the call for lack of permissions
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// Result type for adapter operations
pub type BotResult<T> = Result<T, BotError>;
