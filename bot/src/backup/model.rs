//! Snapshot document persisted by the backup store.

use serde::{Deserialize, Serialize};

use crate::platform::ChannelKind;
use crate::platform::permissions::Permissions;

/// One guild backup. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Store-assigned identifier; also the file stem.
    pub id: String,
    /// Source guild, kept for reference only.
    pub guild_id: String,
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub roles: Vec<RoleRecord>,
    pub channels: Vec<ChannelRecord>,
    pub settings: SettingsRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub permissions: Permissions,
    pub mentionable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub parent_name: Option<String>,
    pub position: i32,
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
    #[serde(default)]
    pub rate_limit_per_user: u32,
}

/// Guild-level settings. Only `afk_timeout` is replayed on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub afk_channel_name: Option<String>,
    pub afk_timeout: u32,
    pub verification_level: u8,
    pub explicit_content_filter: u8,
    pub default_message_notifications: u8,
}

impl Snapshot {
    /// Short human-readable summary used in listings.
    pub fn summary(&self) -> String {
        format!(
            "{} ({} roles, {} channels)",
            self.name,
            self.roles.len(),
            self.channels.len()
        )
    }
}
