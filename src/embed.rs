//! Display records posted to the log channels
//!
//! A `LogRecord` is built per event, rendered into a serenity embed, and
//! dropped once the send returns. Keeping it separate from `CreateEmbed`
//! lets the adapters be checked without a gateway connection.

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter,
    CreateMessage,
};

/// Content longer than this is cut and suffixed with an ellipsis
pub const CONTENT_LIMIT: usize = 1000;
/// Discord's hard limit for an embed field value
pub const FIELD_VALUE_LIMIT: usize = 1024;
pub const ELLIPSIS: &str = "...";

/// Embed colour palette
pub struct Colors;

impl Colors {
    pub const GREEN: u32 = 0x2ECC71;
    pub const RED: u32 = 0xE74C3C;
    pub const YELLOW: u32 = 0xF1C40F;
    pub const BLUE: u32 = 0x3498DB;
    pub const ORANGE: u32 = 0xE67E22;
    pub const CLIENT_DARK: u32 = 0x2F3136;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Text with an optional icon, used for the author line and the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedLine {
    pub text: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Vec<EmbedField>,
    pub thumbnail: Option<String>,
    pub author: Option<EmbedLine>,
    pub footer: Option<EmbedLine>,
    pub link: Option<LinkButton>,
}

impl LogRecord {
    /// Start a record with the given colour, stamped with the current time
    #[must_use]
    pub fn new(color: u32) -> Self {
        Self {
            title: None,
            description: None,
            color,
            timestamp: Some(Utc::now()),
            fields: Vec::new(),
            thumbnail: None,
            author: None,
            footer: None,
            link: None,
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    #[must_use]
    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    #[must_use]
    pub fn author(mut self, text: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(EmbedLine {
            text: text.into(),
            icon_url,
        });
        self
    }

    #[must_use]
    pub fn footer(mut self, text: impl Into<String>, icon_url: Option<String>) -> Self {
        self.footer = Some(EmbedLine {
            text: text.into(),
            icon_url,
        });
        self
    }

    #[must_use]
    pub fn link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.link = Some(LinkButton {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    #[must_use]
    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }

    /// Look up a field value by name
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// Render into a serenity embed
    #[must_use]
    pub fn to_embed(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new().colour(self.color);

        if let Some(title) = &self.title {
            embed = embed.title(title);
        }
        if let Some(description) = &self.description {
            embed = embed.description(description);
        }
        if let Some(timestamp) = self.timestamp {
            embed = embed.timestamp(serenity::Timestamp::from(timestamp));
        }
        if let Some(url) = &self.thumbnail {
            embed = embed.thumbnail(url);
        }
        if let Some(author) = &self.author {
            let mut line = CreateEmbedAuthor::new(&author.text);
            if let Some(icon) = &author.icon_url {
                line = line.icon_url(icon);
            }
            embed = embed.author(line);
        }
        if let Some(footer) = &self.footer {
            let mut line = CreateEmbedFooter::new(&footer.text);
            if let Some(icon) = &footer.icon_url {
                line = line.icon_url(icon);
            }
            embed = embed.footer(line);
        }

        embed.fields(
            self.fields
                .iter()
                .map(|field| (field.name.clone(), field.value.clone(), field.inline)),
        )
    }

    /// Render into a channel message, including the link button if any
    #[must_use]
    pub fn to_message(&self) -> CreateMessage {
        let message = CreateMessage::new().embed(self.to_embed());
        match &self.link {
            Some(link) => message.components(vec![CreateActionRow::Buttons(vec![
                CreateButton::new_link(&link.url).label(&link.label),
            ])]),
            None => message,
        }
    }
}

/// Cut content to `CONTENT_LIMIT` characters, appending an ellipsis when cut
#[must_use]
pub fn truncate_content(content: &str) -> String {
    match content.char_indices().nth(CONTENT_LIMIT) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &content[..cut]),
        None => content.to_string(),
    }
}

/// Truncated content wrapped in a code block, ready to be a field value
#[must_use]
pub fn code_block(content: &str) -> String {
    if content.is_empty() {
        return "<empty>".to_string();
    }
    format!("```{}```", truncate_content(content))
}

/// Discord timestamp markup, absolute and relative
#[must_use]
pub fn discord_timestamp(unix: i64) -> String {
    format!("<t:{unix}:f> (<t:{unix}:R>)")
}
