use tracing::{info, warn};

use super::model::Snapshot;
use super::store::BackupStore;
use crate::error::BackupError;
use crate::outcome::{ItemOutcome, failed_names};
use crate::platform::{GuildApi, NewChannel, NewRole};

/// Which categories of a snapshot get replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOptions {
    pub roles: bool,
    pub channels: bool,
    pub settings: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl RestoreOptions {
    pub const fn all() -> Self {
        Self {
            roles: true,
            channels: true,
            settings: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            roles: false,
            channels: false,
            settings: false,
        }
    }
}

/// Per-item record of a restore. Categories that were not selected stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub roles: Vec<ItemOutcome>,
    pub channels: Vec<ItemOutcome>,
    pub settings: Option<ItemOutcome>,
}

impl RestoreReport {
    /// A restore that got this far counts as a success, whatever failed per item.
    pub fn success(&self) -> bool {
        true
    }

    pub fn failure_count(&self) -> usize {
        failed_names(&self.roles).len()
            + failed_names(&self.channels).len()
            + self.settings.iter().filter(|s| !s.succeeded()).count()
    }
}

/// Load `backup_id` from the store and replay it into `guild_id`.
pub async fn restore(
    api: &dyn GuildApi,
    store: &BackupStore,
    guild_id: &str,
    backup_id: &str,
    options: RestoreOptions,
) -> Result<RestoreReport, BackupError> {
    let snapshot = store.load(backup_id)?;
    Ok(replay_snapshot(api, guild_id, &snapshot, options).await)
}

/// Recreate a snapshot's roles, channels and settings in a guild.
///
/// Each remote call is awaited before the next; individual failures are
/// logged and recorded, never propagated. Channels are created in ascending
/// `position`. Parent linkage, bitrate, user limit and exact position are
/// not reapplied, and of the settings only the AFK timeout is.
pub async fn replay_snapshot(
    api: &dyn GuildApi,
    guild_id: &str,
    snapshot: &Snapshot,
    options: RestoreOptions,
) -> RestoreReport {
    let mut report = RestoreReport::default();

    if options.roles {
        for role in &snapshot.roles {
            let new_role = NewRole {
                name: role.name.clone(),
                color: role.color,
                hoist: role.hoist,
                permissions: role.permissions,
                mentionable: role.mentionable,
            };
            let result = api.create_role(guild_id, &new_role).await;
            if let Err(e) = &result {
                warn!(%guild_id, role = %role.name, error = %e, "failed to restore role");
            }
            report.roles.push(ItemOutcome::from_result(&role.name, &result));
        }
    }

    if options.channels {
        let mut channels: Vec<_> = snapshot.channels.iter().collect();
        channels.sort_by_key(|c| c.position);

        for channel in channels {
            let new_channel = NewChannel {
                name: channel.name.clone(),
                kind: channel.kind,
                topic: channel.topic.clone(),
                nsfw: channel.nsfw,
                rate_limit_per_user: channel.rate_limit_per_user,
                overwrites: Vec::new(),
            };
            let result = api.create_channel(guild_id, &new_channel).await;
            if let Err(e) = &result {
                warn!(%guild_id, channel = %channel.name, error = %e, "failed to restore channel");
            }
            report
                .channels
                .push(ItemOutcome::from_result(&channel.name, &result));
        }
    }

    if options.settings {
        let result = api
            .set_afk_timeout(guild_id, snapshot.settings.afk_timeout)
            .await;
        if let Err(e) = &result {
            warn!(%guild_id, error = %e, "failed to restore afk timeout");
        }
        report.settings = Some(ItemOutcome::from_result("afkTimeout", &result));
    }

    info!(
        %guild_id,
        backup_id = %snapshot.id,
        roles = report.roles.len(),
        channels = report.channels.len(),
        failures = report.failure_count(),
        "backup replayed"
    );
    report
}
