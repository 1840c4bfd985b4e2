//! Utility commands that are not tied to moderation

pub mod cooldown;
pub mod stats;
