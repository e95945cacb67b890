use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::permissions::{OverwriteTarget, PermissionOverwrite, Permissions};
use super::{ChannelKind, GuildApi, LiveChannel, LiveGuild, LiveRole, NewChannel, NewRole};
use crate::error::ApiError;

/// Default REST endpoint of the platform.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GuildPayload {
    id: String,
    name: String,
    afk_channel_id: Option<String>,
    afk_timeout: u32,
    verification_level: u8,
    default_message_notifications: u8,
    explicit_content_filter: u8,
    roles: Vec<RolePayload>,
}

#[derive(Deserialize)]
struct RolePayload {
    id: String,
    name: String,
    color: u32,
    hoist: bool,
    /// Bitfield as a decimal string.
    permissions: String,
    mentionable: bool,
}

#[derive(Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    name: Option<String>,
    parent_id: Option<String>,
    #[serde(default)]
    position: i32,
    topic: Option<String>,
    #[serde(default)]
    nsfw: bool,
    bitrate: Option<u32>,
    user_limit: Option<u32>,
    #[serde(default)]
    rate_limit_per_user: u32,
    #[serde(default)]
    permission_overwrites: Vec<OverwritePayload>,
}

#[derive(Serialize, Deserialize)]
struct OverwritePayload {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

fn parse_bits(raw: &str) -> Result<Permissions, ApiError> {
    raw.parse::<u64>()
        .map(Permissions::from_bits_retain)
        .map_err(|_| ApiError::Decode(format!("invalid permission bitfield {raw:?}")))
}

impl TryFrom<RolePayload> for LiveRole {
    type Error = ApiError;

    fn try_from(p: RolePayload) -> Result<Self, ApiError> {
        Ok(LiveRole {
            permissions: parse_bits(&p.permissions)?,
            id: p.id,
            name: p.name,
            color: p.color,
            hoist: p.hoist,
            mentionable: p.mentionable,
        })
    }
}

impl TryFrom<OverwritePayload> for PermissionOverwrite {
    type Error = ApiError;

    fn try_from(p: OverwritePayload) -> Result<Self, ApiError> {
        Ok(PermissionOverwrite {
            allow: parse_bits(&p.allow)?,
            deny: parse_bits(&p.deny)?,
            target_id: p.id,
            target_type: OverwriteTarget::from_code(p.kind),
        })
    }
}

impl From<&PermissionOverwrite> for OverwritePayload {
    fn from(ov: &PermissionOverwrite) -> Self {
        OverwritePayload {
            id: ov.target_id.clone(),
            kind: ov.target_type.code(),
            allow: ov.allow.bits().to_string(),
            deny: ov.deny.bits().to_string(),
        }
    }
}

impl TryFrom<ChannelPayload> for LiveChannel {
    type Error = ApiError;

    fn try_from(p: ChannelPayload) -> Result<Self, ApiError> {
        let overwrites = p
            .permission_overwrites
            .into_iter()
            .map(PermissionOverwrite::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LiveChannel {
            id: p.id,
            name: p.name.unwrap_or_default(),
            kind: ChannelKind::from(p.kind),
            parent_id: p.parent_id,
            position: p.position,
            topic: p.topic,
            nsfw: p.nsfw,
            bitrate: p.bitrate,
            user_limit: p.user_limit,
            rate_limit_per_user: p.rate_limit_per_user,
            overwrites,
        })
    }
}

// ── Client ──────────────────────────────────────────────────────────────────

/// REST adapter for the platform's administrative API.
///
/// Every call is a single request; failures are returned as-is and never retried.
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Send a request and hand back the raw response after checking its status.
    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "platform request rejected");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.send(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GuildApi for DiscordClient {
    async fn fetch_guild(&self, guild_id: &str) -> Result<LiveGuild, ApiError> {
        let guild: GuildPayload = self
            .send_json(self.request(Method::GET, &format!("/guilds/{guild_id}")))
            .await?;
        let channels: Vec<ChannelPayload> = self
            .send_json(self.request(Method::GET, &format!("/guilds/{guild_id}/channels")))
            .await?;
        debug!(%guild_id, channels = channels.len(), roles = guild.roles.len(), "fetched guild");

        Ok(LiveGuild {
            default_role_id: guild.id.clone(),
            roles: guild
                .roles
                .into_iter()
                .map(LiveRole::try_from)
                .collect::<Result<_, _>>()?,
            channels: channels
                .into_iter()
                .map(LiveChannel::try_from)
                .collect::<Result<_, _>>()?,
            id: guild.id,
            name: guild.name,
            afk_channel_id: guild.afk_channel_id,
            afk_timeout: guild.afk_timeout,
            verification_level: guild.verification_level,
            explicit_content_filter: guild.explicit_content_filter,
            default_message_notifications: guild.default_message_notifications,
        })
    }

    async fn create_role(&self, guild_id: &str, role: &NewRole) -> Result<LiveRole, ApiError> {
        let body = json!({
            "name": role.name,
            "color": role.color,
            "hoist": role.hoist,
            "permissions": role.permissions.bits().to_string(),
            "mentionable": role.mentionable,
        });
        let payload: RolePayload = self
            .send_json(
                self.request(Method::POST, &format!("/guilds/{guild_id}/roles"))
                    .json(&body),
            )
            .await?;
        LiveRole::try_from(payload)
    }

    async fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("/guilds/{guild_id}/roles/{role_id}")))
            .await?;
        Ok(())
    }

    async fn create_channel(
        &self,
        guild_id: &str,
        channel: &NewChannel,
    ) -> Result<LiveChannel, ApiError> {
        let overwrites: Vec<OverwritePayload> =
            channel.overwrites.iter().map(OverwritePayload::from).collect();
        let body = json!({
            "name": channel.name,
            "type": u8::from(channel.kind),
            "topic": channel.topic,
            "nsfw": channel.nsfw,
            "rate_limit_per_user": channel.rate_limit_per_user,
            "permission_overwrites": overwrites,
        });
        let payload: ChannelPayload = self
            .send_json(
                self.request(Method::POST, &format!("/guilds/{guild_id}/channels"))
                    .json(&body),
            )
            .await?;
        LiveChannel::try_from(payload)
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("/channels/{channel_id}")))
            .await?;
        Ok(())
    }

    async fn edit_overwrite(
        &self,
        channel_id: &str,
        overwrite: &PermissionOverwrite,
    ) -> Result<(), ApiError> {
        let payload = OverwritePayload::from(overwrite);
        let body = json!({
            "type": payload.kind,
            "allow": payload.allow,
            "deny": payload.deny,
        });
        self.send(
            self.request(
                Method::PUT,
                &format!("/channels/{channel_id}/permissions/{}", payload.id),
            )
            .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn set_afk_timeout(&self, guild_id: &str, seconds: u32) -> Result<(), ApiError> {
        self.send(
            self.request(Method::PATCH, &format!("/guilds/{guild_id}"))
                .json(&json!({ "afk_timeout": seconds })),
        )
        .await?;
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), ApiError> {
        self.send(
            self.request(Method::POST, &format!("/channels/{channel_id}/messages"))
                .json(&json!({ "content": content })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_payload_decodes_overwrites() {
        let raw = r#"{
            "id": "c1",
            "type": 2,
            "name": "Lounge",
            "parent_id": "cat1",
            "position": 3,
            "bitrate": 64000,
            "user_limit": 10,
            "permission_overwrites": [
                {"id": "g1", "type": 0, "allow": "0", "deny": "1024"}
            ]
        }"#;
        let payload: ChannelPayload = serde_json::from_str(raw).unwrap();
        let channel = LiveChannel::try_from(payload).unwrap();
        assert_eq!(channel.kind, ChannelKind::Voice);
        assert_eq!(channel.bitrate, Some(64000));
        assert_eq!(channel.rate_limit_per_user, 0);
        assert_eq!(channel.overwrites[0].deny, Permissions::VIEW_CHANNEL);
        assert!(!channel.nsfw);
    }

    #[test]
    fn test_role_payload_rejects_bad_bitfield() {
        let payload = RolePayload {
            id: "r1".into(),
            name: "Mods".into(),
            color: 0,
            hoist: false,
            permissions: "lots".into(),
            mentionable: false,
        };
        assert!(matches!(LiveRole::try_from(payload), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_overwrite_payload_encodes_strings() {
        let ov = PermissionOverwrite {
            target_id: "g1".into(),
            target_type: OverwriteTarget::Role,
            allow: Permissions::VIEW_CHANNEL,
            deny: Permissions::SEND_MESSAGES,
        };
        let payload = OverwritePayload::from(&ov);
        assert_eq!(payload.allow, "1024");
        assert_eq!(payload.deny, "2048");
        assert_eq!(payload.kind, 0);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DiscordClient::new("token", "https://example.test/api/");
        assert_eq!(client.base_url, "https://example.test/api");
    }
}
