use chrono::Utc;

use super::model::{ChannelRecord, RoleRecord, SettingsRecord, Snapshot};
use crate::platform::LiveGuild;

/// Capture a guild's roles, channels and settings as an unsaved snapshot.
///
/// The returned snapshot has an empty `id`; the store assigns one on create.
pub fn build_snapshot(guild: &LiveGuild) -> Snapshot {
    let channel_name = |id: &str| guild.channel(id).map(|c| c.name.clone());

    let roles = guild
        .custom_roles()
        .map(|r| RoleRecord {
            name: r.name.clone(),
            color: r.color,
            hoist: r.hoist,
            permissions: r.permissions,
            mentionable: r.mentionable,
        })
        .collect();

    let channels = guild
        .channels
        .iter()
        .map(|c| ChannelRecord {
            name: c.name.clone(),
            kind: c.kind,
            parent_name: c.parent_id.as_deref().and_then(channel_name),
            position: c.position,
            topic: c.topic.clone().filter(|t| !t.is_empty()),
            nsfw: c.nsfw,
            bitrate: c.bitrate.filter(|b| *b > 0),
            user_limit: c.user_limit.filter(|l| *l > 0),
            rate_limit_per_user: c.rate_limit_per_user,
        })
        .collect();

    Snapshot {
        id: String::new(),
        guild_id: guild.id.clone(),
        name: guild.name.clone(),
        created_at: Utc::now().timestamp_millis(),
        roles,
        channels,
        settings: SettingsRecord {
            afk_channel_name: guild.afk_channel_id.as_deref().and_then(channel_name),
            afk_timeout: guild.afk_timeout,
            verification_level: guild.verification_level,
            explicit_content_filter: guild.explicit_content_filter,
            default_message_notifications: guild.default_message_notifications,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryPlatform;
    use crate::platform::permissions::Permissions;
    use crate::platform::{ChannelKind, LiveChannel, LiveRole};

    fn channel(id: &str, name: &str, kind: ChannelKind, position: i32) -> LiveChannel {
        LiveChannel {
            id: id.into(),
            name: name.into(),
            kind,
            parent_id: None,
            position,
            topic: None,
            nsfw: false,
            bitrate: None,
            user_limit: None,
            rate_limit_per_user: 0,
            overwrites: Vec::new(),
        }
    }

    #[test]
    fn test_default_role_is_excluded() {
        let mut guild = MemoryPlatform::empty_guild("g1", "Guild");
        guild.roles.push(LiveRole {
            id: "r1".into(),
            name: "A".into(),
            color: 1,
            hoist: false,
            permissions: Permissions::empty(),
            mentionable: true,
        });

        let snapshot = build_snapshot(&guild);
        assert_eq!(snapshot.roles.len(), 1);
        assert_eq!(snapshot.roles[0].name, "A");
        assert!(snapshot.id.is_empty());
        assert_eq!(snapshot.guild_id, "g1");
    }

    #[test]
    fn test_parent_and_afk_resolve_to_names() {
        let mut guild = MemoryPlatform::empty_guild("g1", "Guild");
        let category = channel("cat", "Voice Rooms", ChannelKind::Category, 0);
        let mut afk = channel("afk", "AFK", ChannelKind::Voice, 1);
        afk.parent_id = Some("cat".into());
        afk.bitrate = Some(64000);
        guild.channels = vec![category, afk];
        guild.afk_channel_id = Some("afk".into());
        guild.afk_timeout = 900;

        let snapshot = build_snapshot(&guild);
        assert_eq!(snapshot.channels[0].parent_name, None);
        assert_eq!(snapshot.channels[1].parent_name.as_deref(), Some("Voice Rooms"));
        assert_eq!(snapshot.channels[1].bitrate, Some(64000));
        assert_eq!(snapshot.settings.afk_channel_name.as_deref(), Some("AFK"));
        assert_eq!(snapshot.settings.afk_timeout, 900);
    }

    #[test]
    fn test_missing_optional_fields_become_null() {
        let mut guild = MemoryPlatform::empty_guild("g1", "Guild");
        let mut text = channel("t1", "general", ChannelKind::Text, 0);
        text.topic = Some(String::new());
        text.parent_id = Some("deleted-category".into());
        text.user_limit = Some(0);
        guild.channels = vec![text];

        let snapshot = build_snapshot(&guild);
        let record = &snapshot.channels[0];
        assert_eq!(record.topic, None);
        assert_eq!(record.parent_name, None);
        assert_eq!(record.user_limit, None);
        assert_eq!(snapshot.settings.afk_channel_name, None);
    }

    #[test]
    fn test_channel_order_is_preserved() {
        let mut guild = MemoryPlatform::empty_guild("g1", "Guild");
        guild.channels = vec![
            channel("a", "third", ChannelKind::Text, 3),
            channel("b", "first", ChannelKind::Text, 1),
        ];
        let snapshot = build_snapshot(&guild);
        let names: Vec<&str> = snapshot.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["third", "first"]);
    }
}
