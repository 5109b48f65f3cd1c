//! Subset of the Discord REST v10 objects used by the bot.

use serde::{Deserialize, Serialize};

use crate::error::DiscordError;

/// Body of a create or edit message request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Button>,
}

impl ActionRow {
    pub fn new(components: Vec<Button>) -> Self {
        Self {
            kind: 1,
            components,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    pub style: u8,
    pub label: String,
    pub custom_id: String,
}

impl Button {
    pub const PRIMARY: u8 = 1;

    pub fn primary(label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style: Self::PRIMARY,
            label: label.into(),
            custom_id: custom_id.into(),
        }
    }
}

/// Binds the `files[id]` multipart part to a filename.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentRef {
    pub id: usize,
    pub filename: String,
}

/// A file sent along with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn attachment_url(&self) -> String {
        format!("attachment://{}", self.filename)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

impl Channel {
    /// Categories, directories, forums and media channels have no message
    /// stream of their own.
    pub fn is_messageable(&self) -> bool {
        !matches!(self.kind, 4 | 14 | 15 | 16)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    pub fn role_ids(&self) -> Vec<u64> {
        self.roles.iter().filter_map(|id| id.parse().ok()).collect()
    }
}

pub fn parse_snowflake(id: &str) -> Result<u64, DiscordError> {
    id.parse()
        .map_err(|_| DiscordError::InvalidId(id.to_string()))
}
