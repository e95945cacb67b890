use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::outcome::ItemOutcome;
use crate::platform::permissions::{PermissionOverwrite, Permissions, view_overwrite};
use crate::platform::{GuildApi, NewChannel, normalize_channel_name};

/// Name of the channel left visible while a guild is in maintenance.
pub const DEFAULT_CHANNEL_NAME: &str = "🔧-maintenance";

/// Message posted when the maintenance channel is created.
pub const DEFAULT_ANNOUNCEMENT: &str =
    "🚧 The server is currently under **maintenance**. Please wait!";

/// Per-guild maintenance bookkeeping. Lives only as long as the process.
#[derive(Debug, Default)]
struct GuildMaintenance {
    enabled: bool,
    /// Channels this service hid, so exactly these get revealed again.
    hidden_channels: Vec<String>,
}

/// What an enable or disable call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleReport {
    /// One entry per channel whose visibility was changed.
    pub channels: Vec<ItemOutcome>,
    /// Creation (enable) or deletion (disable) of the maintenance channel, if attempted.
    pub maintenance_channel: Option<ItemOutcome>,
    /// Posting the announcement into a freshly created maintenance channel.
    pub announcement: Option<ItemOutcome>,
}

impl ToggleReport {
    /// Whether the maintenance channel was actually created or deleted.
    pub fn maintenance_channel_changed(&self) -> bool {
        self.maintenance_channel
            .as_ref()
            .is_some_and(ItemOutcome::succeeded)
    }
}

/// Hides a guild's channels from the default role and brings them back.
///
/// Each guild has its own async mutex, so toggles for one guild run one at a
/// time while different guilds proceed independently.
pub struct MaintenanceService {
    channel_name: String,
    announcement: String,
    guilds: DashMap<String, Arc<Mutex<GuildMaintenance>>>,
}

impl Default for MaintenanceService {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_NAME, DEFAULT_ANNOUNCEMENT)
    }
}

impl MaintenanceService {
    /// `channel_name` is normalized so it matches the name the platform stores.
    pub fn new(channel_name: impl AsRef<str>, announcement: impl Into<String>) -> Self {
        Self {
            channel_name: normalize_channel_name(channel_name.as_ref()),
            announcement: announcement.into(),
            guilds: DashMap::new(),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    fn slot(&self, guild_id: &str) -> Arc<Mutex<GuildMaintenance>> {
        self.guilds
            .entry(guild_id.to_string())
            .or_default()
            .clone()
    }

    /// Hide every text and voice channel from the default role and make sure
    /// the maintenance channel exists.
    ///
    /// Enabling an already-enabled guild rebuilds the hidden list from the
    /// channels currently present. Failing to create the maintenance channel
    /// or to post the announcement is recorded in the report, not returned.
    pub async fn enable(
        &self,
        api: &dyn GuildApi,
        guild_id: &str,
    ) -> Result<ToggleReport, ApiError> {
        let slot = self.slot(guild_id);
        let mut state = slot.lock().await;

        let guild = api.fetch_guild(guild_id).await?;
        if state.enabled {
            warn!(%guild_id, previous = state.hidden_channels.len(), "maintenance already enabled, replacing hidden channel list");
        }
        info!(%guild_id, "enabling maintenance");
        state.enabled = true;
        state.hidden_channels.clear();

        let mut report = ToggleReport::default();
        for channel in guild
            .channels
            .iter()
            .filter(|c| c.kind.is_text_or_voice() && c.name != self.channel_name)
        {
            state.hidden_channels.push(channel.id.clone());
            let overwrite = view_overwrite(&channel.overwrites, &guild.default_role_id, false);
            let result = api.edit_overwrite(&channel.id, &overwrite).await;
            if let Err(e) = &result {
                warn!(%guild_id, channel = %channel.name, error = %e, "failed to hide channel");
            }
            report
                .channels
                .push(ItemOutcome::from_result(&channel.name, &result));
        }

        if guild.channel_named(&self.channel_name).is_none() {
            let mut new_channel = NewChannel::text(&self.channel_name);
            new_channel.overwrites = vec![
                PermissionOverwrite::empty_for_role(&guild.default_role_id)
                    .edited(Permissions::VIEW_CHANNEL, true),
            ];
            let created = api.create_channel(guild_id, &new_channel).await;
            report.maintenance_channel = Some(ItemOutcome::from_result(&self.channel_name, &created));
            match created {
                Ok(channel) => {
                    debug!(%guild_id, channel_id = %channel.id, "created maintenance channel");
                    let sent = api.send_message(&channel.id, &self.announcement).await;
                    if let Err(e) = &sent {
                        warn!(%guild_id, error = %e, "failed to post maintenance announcement");
                    }
                    report.announcement = Some(ItemOutcome::from_result("announcement", &sent));
                }
                Err(e) => warn!(%guild_id, error = %e, "failed to create maintenance channel"),
            }
        }

        Ok(report)
    }

    /// Reveal the channels hidden by [`enable`](Self::enable), remove the
    /// maintenance channel and forget the guild's state.
    ///
    /// Hidden channels deleted in the meantime are skipped.
    pub async fn disable(
        &self,
        api: &dyn GuildApi,
        guild_id: &str,
    ) -> Result<ToggleReport, ApiError> {
        let slot = self.slot(guild_id);
        let mut state = slot.lock().await;

        let guild = api.fetch_guild(guild_id).await?;
        info!(%guild_id, "disabling maintenance");
        state.enabled = false;
        let hidden = std::mem::take(&mut state.hidden_channels);

        let mut report = ToggleReport::default();
        for channel_id in &hidden {
            let Some(channel) = guild.channel(channel_id) else {
                debug!(%guild_id, %channel_id, "hidden channel no longer exists");
                continue;
            };
            let overwrite = view_overwrite(&channel.overwrites, &guild.default_role_id, true);
            let result = api.edit_overwrite(&channel.id, &overwrite).await;
            if let Err(e) = &result {
                warn!(%guild_id, channel = %channel.name, error = %e, "failed to reveal channel");
            }
            report
                .channels
                .push(ItemOutcome::from_result(&channel.name, &result));
        }

        if let Some(channel) = guild.channel_named(&self.channel_name) {
            let result = api.delete_channel(&channel.id).await;
            if let Err(e) = &result {
                warn!(%guild_id, error = %e, "failed to delete maintenance channel");
            }
            report.maintenance_channel = Some(ItemOutcome::from_result(&channel.name, &result));
        }

        Ok(report)
    }

    /// Whether the guild is in maintenance. Unknown guilds are not.
    pub async fn status(&self, guild_id: &str) -> bool {
        let Some(slot) = self.guilds.get(guild_id).map(|s| s.clone()) else {
            return false;
        };
        let state = slot.lock().await;
        state.enabled
    }

    /// IDs of the channels currently recorded as hidden for a guild.
    pub async fn hidden_channels(&self, guild_id: &str) -> Vec<String> {
        let Some(slot) = self.guilds.get(guild_id).map(|s| s.clone()) else {
            return Vec::new();
        };
        let state = slot.lock().await;
        state.hidden_channels.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::platform::memory::{ApiCall, MemoryPlatform};
    use crate::platform::{ChannelKind, LiveChannel, LiveGuild, LiveRole, NewRole};

    struct Fixture {
        platform: MemoryPlatform,
        a: String,
        b: String,
        category: String,
    }

    fn fixture() -> Fixture {
        let platform = MemoryPlatform::new();
        platform.insert_guild(MemoryPlatform::empty_guild("g1", "Guild"));
        let a = platform.add_channel("g1", "general", ChannelKind::Text).unwrap();
        let b = platform.add_channel("g1", "Lounge", ChannelKind::Voice).unwrap();
        let category = platform.add_channel("g1", "Info", ChannelKind::Category).unwrap();
        Fixture {
            platform,
            a,
            b,
            category,
        }
    }

    #[tokio::test]
    async fn test_enable_then_disable_is_symmetric() {
        let f = fixture();
        let service = MaintenanceService::default();
        assert!(!service.status("g1").await);

        let report = service.enable(&f.platform, "g1").await.unwrap();
        assert!(report.maintenance_channel_changed());
        assert!(service.status("g1").await);
        assert_eq!(service.hidden_channels("g1").await, vec![f.a.clone(), f.b.clone()]);
        assert_eq!(f.platform.visible_to_everyone(&f.a), Some(false));
        assert_eq!(f.platform.visible_to_everyone(&f.b), Some(false));
        assert_eq!(f.platform.visible_to_everyone(&f.category), Some(true));

        let guild = f.platform.guild("g1").unwrap();
        let maint = guild.channel_named(DEFAULT_CHANNEL_NAME).unwrap();
        assert_eq!(f.platform.visible_to_everyone(&maint.id), Some(true));
        assert_eq!(f.platform.messages_in(&maint.id), vec![DEFAULT_ANNOUNCEMENT.to_string()]);

        let report = service.disable(&f.platform, "g1").await.unwrap();
        assert!(report.maintenance_channel_changed());
        assert_eq!(report.channels.len(), 2);
        assert!(!service.status("g1").await);
        assert!(service.hidden_channels("g1").await.is_empty());
        assert_eq!(f.platform.visible_to_everyone(&f.a), Some(true));
        assert_eq!(f.platform.visible_to_everyone(&f.b), Some(true));
        assert!(
            f.platform
                .guild("g1")
                .unwrap()
                .channel_named(DEFAULT_CHANNEL_NAME)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_existing_maintenance_channel_is_reused() {
        let f = fixture();
        let existing = f
            .platform
            .add_channel("g1", DEFAULT_CHANNEL_NAME, ChannelKind::Text)
            .unwrap();
        let service = MaintenanceService::default();

        let report = service.enable(&f.platform, "g1").await.unwrap();

        assert!(!report.maintenance_channel_changed());
        assert!(!service.hidden_channels("g1").await.contains(&existing));
        assert!(f.platform.messages_in(&existing).is_empty());
        assert_eq!(f.platform.guild("g1").unwrap().channels.len(), 4);
    }

    #[tokio::test]
    async fn test_hide_failure_is_reported_not_raised() {
        let f = fixture();
        f.platform.fail_overwrite(&f.a);
        let service = MaintenanceService::default();

        let report = service.enable(&f.platform, "g1").await.unwrap();

        assert!(!report.channels[0].succeeded());
        assert!(report.channels[1].succeeded());
        // Still recorded so disable tries to reveal it.
        assert!(service.hidden_channels("g1").await.contains(&f.a));
    }

    #[tokio::test]
    async fn test_disable_skips_deleted_channels() {
        let f = fixture();
        let service = MaintenanceService::default();
        service.enable(&f.platform, "g1").await.unwrap();
        f.platform.delete_channel(&f.a).await.unwrap();

        let report = service.disable(&f.platform, "g1").await.unwrap();

        assert_eq!(report.channels.len(), 1);
        assert_eq!(report.channels[0].name, "Lounge");
    }

    #[tokio::test]
    async fn test_disable_when_never_enabled_is_noop() {
        let f = fixture();
        let service = MaintenanceService::default();

        let report = service.disable(&f.platform, "g1").await.unwrap();

        assert!(report.channels.is_empty());
        assert!(!report.maintenance_channel_changed());
        assert!(!service.status("g1").await);
        assert!(f.platform.journal().is_empty());
    }

    #[tokio::test]
    async fn test_enable_twice_replaces_hidden_list() {
        let f = fixture();
        let service = MaintenanceService::default();
        service.enable(&f.platform, "g1").await.unwrap();
        let c = f.platform.add_channel("g1", "late", ChannelKind::Text).unwrap();

        let report = service.enable(&f.platform, "g1").await.unwrap();

        assert!(!report.maintenance_channel_changed());
        assert_eq!(service.hidden_channels("g1").await, vec![f.a, f.b, c]);
    }

    /// Yields to the scheduler before every call so concurrent toggles
    /// interleave at each await point.
    struct YieldingApi<'a>(&'a MemoryPlatform);

    #[async_trait]
    impl GuildApi for YieldingApi<'_> {
        async fn fetch_guild(&self, guild_id: &str) -> Result<LiveGuild, ApiError> {
            tokio::task::yield_now().await;
            self.0.fetch_guild(guild_id).await
        }

        async fn create_role(&self, guild_id: &str, role: &NewRole) -> Result<LiveRole, ApiError> {
            tokio::task::yield_now().await;
            self.0.create_role(guild_id, role).await
        }

        async fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<(), ApiError> {
            tokio::task::yield_now().await;
            self.0.delete_role(guild_id, role_id).await
        }

        async fn create_channel(
            &self,
            guild_id: &str,
            channel: &NewChannel,
        ) -> Result<LiveChannel, ApiError> {
            tokio::task::yield_now().await;
            self.0.create_channel(guild_id, channel).await
        }

        async fn delete_channel(&self, channel_id: &str) -> Result<(), ApiError> {
            tokio::task::yield_now().await;
            self.0.delete_channel(channel_id).await
        }

        async fn edit_overwrite(
            &self,
            channel_id: &str,
            overwrite: &PermissionOverwrite,
        ) -> Result<(), ApiError> {
            tokio::task::yield_now().await;
            self.0.edit_overwrite(channel_id, overwrite).await
        }

        async fn set_afk_timeout(&self, guild_id: &str, seconds: u32) -> Result<(), ApiError> {
            tokio::task::yield_now().await;
            self.0.set_afk_timeout(guild_id, seconds).await
        }

        async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), ApiError> {
            tokio::task::yield_now().await;
            self.0.send_message(channel_id, content).await
        }
    }

    fn created_channel_count(platform: &MemoryPlatform) -> usize {
        platform
            .journal()
            .into_iter()
            .filter(|c| matches!(c, ApiCall::CreateChannel { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_concurrent_toggles_on_one_guild_are_serialized() {
        let f = fixture();
        let api = YieldingApi(&f.platform);
        let service = MaintenanceService::default();

        let (first, second) = tokio::join!(service.enable(&api, "g1"), service.enable(&api, "g1"));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(created_channel_count(&f.platform), 1);
        assert!(first.maintenance_channel_changed() ^ second.maintenance_channel_changed());
        assert_eq!(service.hidden_channels("g1").await, vec![f.a, f.b]);
    }

    #[tokio::test]
    async fn test_different_guilds_toggle_independently() {
        let f = fixture();
        f.platform.insert_guild(MemoryPlatform::empty_guild("g2", "Other"));
        f.platform.add_channel("g2", "general", ChannelKind::Text).unwrap();
        let api = YieldingApi(&f.platform);
        let service = MaintenanceService::default();

        let (first, second) = tokio::join!(service.enable(&api, "g1"), service.enable(&api, "g2"));
        assert!(first.unwrap().maintenance_channel_changed());
        assert!(second.unwrap().maintenance_channel_changed());

        assert_eq!(created_channel_count(&f.platform), 2);
        assert_eq!(service.hidden_channels("g1").await.len(), 2);
        assert_eq!(service.hidden_channels("g2").await.len(), 1);
    }

    #[tokio::test]
    async fn test_channel_creation_failure_is_reported() {
        let f = fixture();
        f.platform.fail_channel(DEFAULT_CHANNEL_NAME);
        let service = MaintenanceService::default();

        let report = service.enable(&f.platform, "g1").await.unwrap();

        assert!(!report.maintenance_channel_changed());
        assert!(!report.maintenance_channel.as_ref().unwrap().succeeded());
        assert_eq!(report.announcement, None);
        assert!(report.channels.iter().all(ItemOutcome::succeeded));
        assert!(service.status("g1").await);
        assert_eq!(f.platform.visible_to_everyone(&f.a), Some(false));
    }

    #[test]
    fn test_configured_channel_name_is_normalized() {
        assert_eq!(MaintenanceService::default().channel_name(), DEFAULT_CHANNEL_NAME);
        let service = MaintenanceService::new("Server Closed", "brb");
        assert_eq!(service.channel_name(), "server-closed");
    }

    #[tokio::test]
    async fn test_custom_name_is_found_on_second_enable() {
        let f = fixture();
        let service = MaintenanceService::new("Maintenance Room", "brb");
        service.enable(&f.platform, "g1").await.unwrap();

        let report = service.enable(&f.platform, "g1").await.unwrap();

        assert!(report.maintenance_channel.is_none());
        assert_eq!(created_channel_count(&f.platform), 1);
        assert_eq!(report.channels.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_guild_leaves_state_untouched() {
        let service = MaintenanceService::default();
        let platform = MemoryPlatform::new();

        assert!(service.enable(&platform, "missing").await.is_err());
        assert!(!service.status("missing").await);
    }
}
