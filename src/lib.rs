pub mod commands;
pub mod config;
pub mod data;
pub mod discord;
pub mod embed;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod membership;
pub mod moderation;
pub mod utils;

pub const BOT_NAME: &str = "osfbot";
pub const COMMAND_TARGET: &str = "osfbot::command";
pub const ERROR_TARGET: &str = "osfbot::error";
pub const EVENT_TARGET: &str = "osfbot::handlers";
pub const CONSOLE_TARGET: &str = "osfbot";

pub use config::Config;
pub use data::{Data, DataInner};
pub use error::BotError;
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
