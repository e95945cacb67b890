use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::debug;
use uuid::Uuid;

use super::permissions::{PermissionOverwrite, Permissions, default_role_channel_permissions};
use super::{
    ChannelKind, GuildApi, LiveChannel, LiveGuild, LiveRole, NewChannel, NewRole,
    normalize_channel_name,
};
use crate::error::ApiError;

/// Base permissions handed to the default role of a freshly seeded guild.
pub const DEFAULT_EVERYONE: Permissions = Permissions::VIEW_CHANNEL
    .union(Permissions::SEND_MESSAGES)
    .union(Permissions::EMBED_LINKS)
    .union(Permissions::ATTACH_FILES)
    .union(Permissions::ADD_REACTIONS)
    .union(Permissions::READ_MESSAGE_HISTORY)
    .union(Permissions::CREATE_INSTANT_INVITE)
    .union(Permissions::CONNECT)
    .union(Permissions::SPEAK);

/// A mutation observed by [`MemoryPlatform`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateRole { guild_id: String, name: String },
    DeleteRole { guild_id: String, role_id: String },
    CreateChannel { guild_id: String, name: String },
    DeleteChannel { channel_id: String },
    EditOverwrite { channel_id: String, target_id: String },
    SetAfkTimeout { guild_id: String, seconds: u32 },
    SendMessage { channel_id: String, content: String },
}

/// In-process stand-in for the remote platform. Holds whole guilds in memory,
/// journals every mutation attempt, and can be told to fail specific items.
pub struct MemoryPlatform {
    /// All guilds, keyed by guild ID.
    guilds: DashMap<String, LiveGuild>,
    /// Index: channel_id -> guild_id for channel-scoped calls.
    channel_guild_index: DashMap<String, String>,
    /// Messages posted per channel ID.
    messages: DashMap<String, Vec<String>>,
    journal: Mutex<Vec<ApiCall>>,
    failing_roles: DashSet<String>,
    failing_channels: DashSet<String>,
    failing_overwrites: DashSet<String>,
    failing_settings: AtomicBool,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            guilds: DashMap::new(),
            channel_guild_index: DashMap::new(),
            messages: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            failing_roles: DashSet::new(),
            failing_channels: DashSet::new(),
            failing_overwrites: DashSet::new(),
            failing_settings: AtomicBool::new(false),
        }
    }

    /// A guild with only its default role and no channels.
    pub fn empty_guild(id: &str, name: &str) -> LiveGuild {
        LiveGuild {
            id: id.to_string(),
            name: name.to_string(),
            default_role_id: id.to_string(),
            roles: vec![LiveRole {
                id: id.to_string(),
                name: "@everyone".into(),
                color: 0,
                hoist: false,
                permissions: DEFAULT_EVERYONE,
                mentionable: false,
            }],
            channels: Vec::new(),
            afk_channel_id: None,
            afk_timeout: 300,
            verification_level: 0,
            explicit_content_filter: 0,
            default_message_notifications: 0,
        }
    }

    /// Seed a guild, replacing any guild with the same ID.
    pub fn insert_guild(&self, guild: LiveGuild) {
        for ch in &guild.channels {
            self.channel_guild_index
                .insert(ch.id.clone(), guild.id.clone());
        }
        self.guilds.insert(guild.id.clone(), guild);
    }

    /// Add a bare channel to a seeded guild and return its ID.
    pub fn add_channel(&self, guild_id: &str, name: &str, kind: ChannelKind) -> Option<String> {
        let mut guild = self.guilds.get_mut(guild_id)?;
        let id = Uuid::new_v4().to_string();
        let position = guild.channels.len() as i32;
        guild.channels.push(LiveChannel {
            id: id.clone(),
            name: name.to_string(),
            kind,
            parent_id: None,
            position,
            topic: None,
            nsfw: false,
            bitrate: None,
            user_limit: None,
            rate_limit_per_user: 0,
            overwrites: Vec::new(),
        });
        drop(guild);
        self.channel_guild_index
            .insert(id.clone(), guild_id.to_string());
        Some(id)
    }

    pub fn guild(&self, guild_id: &str) -> Option<LiveGuild> {
        self.guilds.get(guild_id).map(|g| g.clone())
    }

    /// Make every create call for a role with this name fail.
    pub fn fail_role(&self, name: &str) {
        self.failing_roles.insert(name.to_string());
    }

    /// Make every create call for a channel with this name fail.
    pub fn fail_channel(&self, name: &str) {
        self.failing_channels.insert(name.to_string());
    }

    /// Make overwrite edits on this channel ID fail.
    pub fn fail_overwrite(&self, channel_id: &str) {
        self.failing_overwrites.insert(channel_id.to_string());
    }

    pub fn fail_settings(&self) {
        self.failing_settings.store(true, Ordering::SeqCst);
    }

    /// Every mutation attempted so far, including rejected ones.
    pub fn journal(&self) -> Vec<ApiCall> {
        self.journal
            .lock()
            .map(|j| j.clone())
            .unwrap_or_default()
    }

    pub fn messages_in(&self, channel_id: &str) -> Vec<String> {
        self.messages
            .get(channel_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Whether the default role can currently see a channel.
    pub fn visible_to_everyone(&self, channel_id: &str) -> Option<bool> {
        let guild_id = self.channel_guild_index.get(channel_id)?.clone();
        let guild = self.guilds.get(&guild_id)?;
        let base = guild
            .roles
            .iter()
            .find(|r| r.id == guild.default_role_id)
            .map(|r| r.permissions)
            .unwrap_or_else(Permissions::empty);
        let channel = guild.channel(channel_id)?;
        let perms =
            default_role_channel_permissions(base, &channel.overwrites, &guild.default_role_id);
        Some(perms.contains(Permissions::VIEW_CHANNEL))
    }

    fn record(&self, call: ApiCall) {
        debug!(?call, "memory platform call");
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(call);
        }
    }

    fn guild_of(&self, channel_id: &str) -> Result<String, ApiError> {
        self.channel_guild_index
            .get(channel_id)
            .map(|g| g.clone())
            .ok_or_else(|| ApiError::not_found("channel", channel_id))
    }
}

#[async_trait]
impl GuildApi for MemoryPlatform {
    async fn fetch_guild(&self, guild_id: &str) -> Result<LiveGuild, ApiError> {
        self.guild(guild_id)
            .ok_or_else(|| ApiError::not_found("guild", guild_id))
    }

    async fn create_role(&self, guild_id: &str, role: &NewRole) -> Result<LiveRole, ApiError> {
        self.record(ApiCall::CreateRole {
            guild_id: guild_id.to_string(),
            name: role.name.clone(),
        });
        if self.failing_roles.contains(&role.name) {
            return Err(ApiError::Rejected(format!("cannot create role {}", role.name)));
        }

        let mut guild = self
            .guilds
            .get_mut(guild_id)
            .ok_or_else(|| ApiError::not_found("guild", guild_id))?;
        let created = LiveRole {
            id: Uuid::new_v4().to_string(),
            name: role.name.clone(),
            color: role.color,
            hoist: role.hoist,
            permissions: role.permissions,
            mentionable: role.mentionable,
        };
        guild.roles.push(created.clone());
        Ok(created)
    }

    async fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::DeleteRole {
            guild_id: guild_id.to_string(),
            role_id: role_id.to_string(),
        });
        let mut guild = self
            .guilds
            .get_mut(guild_id)
            .ok_or_else(|| ApiError::not_found("guild", guild_id))?;
        if guild.default_role_id == role_id {
            return Err(ApiError::Rejected("the default role cannot be deleted".into()));
        }
        let before = guild.roles.len();
        guild.roles.retain(|r| r.id != role_id);
        if guild.roles.len() == before {
            return Err(ApiError::not_found("role", role_id));
        }
        Ok(())
    }

    async fn create_channel(
        &self,
        guild_id: &str,
        channel: &NewChannel,
    ) -> Result<LiveChannel, ApiError> {
        self.record(ApiCall::CreateChannel {
            guild_id: guild_id.to_string(),
            name: channel.name.clone(),
        });
        if self.failing_channels.contains(&channel.name) {
            return Err(ApiError::Rejected(format!(
                "cannot create channel {}",
                channel.name
            )));
        }

        let mut guild = self
            .guilds
            .get_mut(guild_id)
            .ok_or_else(|| ApiError::not_found("guild", guild_id))?;
        let created = LiveChannel {
            id: Uuid::new_v4().to_string(),
            name: if channel.kind.has_normalized_name() {
                normalize_channel_name(&channel.name)
            } else {
                channel.name.clone()
            },
            kind: channel.kind,
            parent_id: None,
            position: guild.channels.len() as i32,
            topic: channel.topic.clone(),
            nsfw: channel.nsfw,
            bitrate: None,
            user_limit: None,
            rate_limit_per_user: channel.rate_limit_per_user,
            overwrites: channel.overwrites.clone(),
        };
        guild.channels.push(created.clone());
        drop(guild);

        self.channel_guild_index
            .insert(created.id.clone(), guild_id.to_string());
        Ok(created)
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::DeleteChannel {
            channel_id: channel_id.to_string(),
        });
        let guild_id = self.guild_of(channel_id)?;
        self.channel_guild_index.remove(channel_id);
        self.messages.remove(channel_id);

        if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
            guild.channels.retain(|c| c.id != channel_id);
            if guild.afk_channel_id.as_deref() == Some(channel_id) {
                guild.afk_channel_id = None;
            }
        }
        Ok(())
    }

    async fn edit_overwrite(
        &self,
        channel_id: &str,
        overwrite: &PermissionOverwrite,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::EditOverwrite {
            channel_id: channel_id.to_string(),
            target_id: overwrite.target_id.clone(),
        });
        if self.failing_overwrites.contains(channel_id) {
            return Err(ApiError::Rejected(format!(
                "cannot edit overwrites on {channel_id}"
            )));
        }

        let guild_id = self.guild_of(channel_id)?;
        let mut guild = self
            .guilds
            .get_mut(&guild_id)
            .ok_or_else(|| ApiError::not_found("guild", guild_id.clone()))?;
        let channel = guild
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| ApiError::not_found("channel", channel_id))?;
        channel.overwrites.retain(|ov| {
            !(ov.target_id == overwrite.target_id && ov.target_type == overwrite.target_type)
        });
        channel.overwrites.push(overwrite.clone());
        Ok(())
    }

    async fn set_afk_timeout(&self, guild_id: &str, seconds: u32) -> Result<(), ApiError> {
        self.record(ApiCall::SetAfkTimeout {
            guild_id: guild_id.to_string(),
            seconds,
        });
        if self.failing_settings.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected("cannot update guild settings".into()));
        }
        let mut guild = self
            .guilds
            .get_mut(guild_id)
            .ok_or_else(|| ApiError::not_found("guild", guild_id))?;
        guild.afk_timeout = seconds;
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), ApiError> {
        self.record(ApiCall::SendMessage {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        });
        self.guild_of(channel_id)?;
        self.messages
            .entry(channel_id.to_string())
            .or_default()
            .push(content.to_string());
        Ok(())
    }
}
