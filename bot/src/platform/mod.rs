//! The remote chat platform as seen by the bot.
//!
//! Everything that touches a live guild goes through [`GuildApi`], so the
//! backup and maintenance code never depends on a concrete client.

pub mod discord;
pub mod memory;
pub mod permissions;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use permissions::{PermissionOverwrite, Permissions};

/// Platform channel type, carried as its integer wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Announcement,
    Stage,
    Forum,
    Other(u8),
}

impl ChannelKind {
    /// Text and voice channels are the ones maintenance mode hides.
    pub fn is_text_or_voice(self) -> bool {
        matches!(self, Self::Text | Self::Voice)
    }
}

impl ChannelKind {
    /// Channel types whose names the platform rewrites on creation.
    pub fn has_normalized_name(self) -> bool {
        matches!(self, Self::Text | Self::Announcement | Self::Forum)
    }
}

/// The form the platform stores text-channel names in: lowercase, with runs
/// of whitespace turned into single hyphens.
pub fn normalize_channel_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

impl From<u8> for ChannelKind {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Text,
            2 => Self::Voice,
            4 => Self::Category,
            5 => Self::Announcement,
            13 => Self::Stage,
            15 => Self::Forum,
            other => Self::Other(other),
        }
    }
}

impl From<ChannelKind> for u8 {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Text => 0,
            ChannelKind::Voice => 2,
            ChannelKind::Category => 4,
            ChannelKind::Announcement => 5,
            ChannelKind::Stage => 13,
            ChannelKind::Forum => 15,
            ChannelKind::Other(code) => code,
        }
    }
}

/// A role as currently present in a guild.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRole {
    pub id: String,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub permissions: Permissions,
    pub mentionable: bool,
}

/// A channel as currently present in a guild.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveChannel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<String>,
    pub position: i32,
    pub topic: Option<String>,
    pub nsfw: bool,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
    pub rate_limit_per_user: u32,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// Current state of a guild, fetched from the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveGuild {
    pub id: String,
    pub name: String,
    /// The implicit role every member has. Shares the guild's id.
    pub default_role_id: String,
    pub roles: Vec<LiveRole>,
    pub channels: Vec<LiveChannel>,
    pub afk_channel_id: Option<String>,
    /// Seconds of inactivity before a member is moved to the AFK channel.
    pub afk_timeout: u32,
    pub verification_level: u8,
    pub explicit_content_filter: u8,
    pub default_message_notifications: u8,
}

impl LiveGuild {
    pub fn channel(&self, channel_id: &str) -> Option<&LiveChannel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    pub fn channel_named(&self, name: &str) -> Option<&LiveChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Roles other than the default role.
    pub fn custom_roles(&self) -> impl Iterator<Item = &LiveRole> {
        self.roles.iter().filter(|r| r.id != self.default_role_id)
    }
}

/// Attributes for a role to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRole {
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub permissions: Permissions,
    pub mentionable: bool,
}

/// Attributes for a channel to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChannel {
    pub name: String,
    pub kind: ChannelKind,
    pub topic: Option<String>,
    pub nsfw: bool,
    pub rate_limit_per_user: u32,
    pub overwrites: Vec<PermissionOverwrite>,
}

impl NewChannel {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Text,
            topic: None,
            nsfw: false,
            rate_limit_per_user: 0,
            overwrites: Vec::new(),
        }
    }
}

/// Administrative operations the bot needs from the platform.
///
/// Calls are awaited one at a time by every caller in this crate; the
/// implementation is free to enforce its own rate limits.
#[async_trait]
pub trait GuildApi: Send + Sync {
    async fn fetch_guild(&self, guild_id: &str) -> Result<LiveGuild, ApiError>;

    async fn create_role(&self, guild_id: &str, role: &NewRole) -> Result<LiveRole, ApiError>;

    async fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<(), ApiError>;

    async fn create_channel(
        &self,
        guild_id: &str,
        channel: &NewChannel,
    ) -> Result<LiveChannel, ApiError>;

    async fn delete_channel(&self, channel_id: &str) -> Result<(), ApiError>;

    /// Replace the overwrite for `overwrite.target_id` on a channel.
    async fn edit_overwrite(
        &self,
        channel_id: &str,
        overwrite: &PermissionOverwrite,
    ) -> Result<(), ApiError>;

    async fn set_afk_timeout(&self, guild_id: &str, seconds: u32) -> Result<(), ApiError>;

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind_codes() {
        for code in [0u8, 2, 4, 5, 13, 15, 99] {
            assert_eq!(u8::from(ChannelKind::from(code)), code);
        }
        assert_eq!(ChannelKind::from(99), ChannelKind::Other(99));
    }

    #[test]
    fn test_channel_kind_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&ChannelKind::Voice).unwrap(), "2");
        let kind: ChannelKind = serde_json::from_str("4").unwrap();
        assert_eq!(kind, ChannelKind::Category);
    }

    #[test]
    fn test_normalize_channel_name() {
        assert_eq!(normalize_channel_name("Maintenance  Room"), "maintenance-room");
        assert_eq!(normalize_channel_name(" Off Topic "), "off-topic");
        assert_eq!(normalize_channel_name("🔧-maintenance"), "🔧-maintenance");
    }

    #[test]
    fn test_only_text_and_voice_are_hideable() {
        assert!(ChannelKind::Text.is_text_or_voice());
        assert!(ChannelKind::Voice.is_text_or_voice());
        assert!(!ChannelKind::Category.is_text_or_voice());
        assert!(!ChannelKind::Forum.is_text_or_voice());
    }
}
