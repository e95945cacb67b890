//! Turns front-end events (prefix commands, button clicks, menu selections)
//! into calls on the backup and maintenance services, and renders the
//! human-readable replies.

pub mod command;
pub mod component;
pub mod selection;

use std::sync::Arc;

use chrono::DateTime;
use tracing::{error, info, warn};

use crate::backup::purge::{purge_channels, purge_roles};
use crate::backup::{BackupStore, Snapshot, create_backup, replay_snapshot};
use crate::error::{InteractionError, StoreError};
use crate::maintenance::MaintenanceService;
use crate::outcome::failed_names;
use crate::platform::GuildApi;

pub use command::{Command, PrefixMessage};
pub use component::ComponentAction;
pub use selection::{PendingSelections, RestoreSelection};

/// Text sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Only visible to the user who triggered it.
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

const HELP_TEXT: &str = "**Backup**\n\
`!backup create` - snapshot this server\n\
`!backup list` - list stored backups\n\
`!backup info <id>` - show a backup\n\
`!backup delete <id>` - delete a backup\n\
`!backup select <id> <options>` - pick roles, channels, settings, delete_roles, delete_channels\n\
`!backup load <id>` - restore with the selected options\n\
`!backup cancel <id>` - abandon a restore\n\
**Maintenance**\n\
`!maintenance on|off|status`";

fn format_created_at(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown date".to_string())
}

fn describe(snapshot: &Snapshot) -> String {
    format!(
        "**Backup `{}`**\nServer: {} ({})\nCreated: {}\nRoles: {}\nChannels: {}\nAFK timeout: {}s",
        snapshot.id,
        snapshot.name,
        snapshot.guild_id,
        format_created_at(snapshot.created_at),
        snapshot.roles.len(),
        snapshot.channels.len(),
        snapshot.settings.afk_timeout,
    )
}

/// Routes commands to the services. One per process, shared by every guild.
pub struct Dispatcher {
    api: Arc<dyn GuildApi>,
    store: BackupStore,
    maintenance: MaintenanceService,
    selections: PendingSelections,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn GuildApi>, store: BackupStore, maintenance: MaintenanceService) -> Self {
        Self {
            api,
            store,
            maintenance,
            selections: PendingSelections::new(),
        }
    }

    pub fn maintenance(&self) -> &MaintenanceService {
        &self.maintenance
    }

    pub fn selections(&self) -> &PendingSelections {
        &self.selections
    }

    /// Handle a chat line. Lines without a command prefix are ignored.
    pub async fn handle_line(&self, guild_id: &str, line: &str) -> Option<Reply> {
        let msg = PrefixMessage::parse(line)?;
        match Command::from_message(&msg) {
            Ok(command) => Some(self.handle(guild_id, command).await),
            Err(InteractionError::UnknownCommand(name)) if name == msg.name => None,
            Err(e) => Some(Reply::ephemeral(format!("❌ {e}"))),
        }
    }

    /// Handle a button click or menu selection on a restore prompt.
    pub async fn handle_component(&self, guild_id: &str, custom_id: &str, values: &[String]) -> Reply {
        let action = match ComponentAction::parse(custom_id) {
            Ok(action) => action,
            Err(e) => return Reply::ephemeral(format!("❌ {e}")),
        };

        let command = match action {
            ComponentAction::SelectOptions(backup_id) => {
                match RestoreSelection::from_values(values.iter().map(String::as_str)) {
                    Ok(selection) => Command::BackupSelect {
                        backup_id,
                        selection,
                    },
                    Err(e) => return Reply::ephemeral(format!("❌ {e}")),
                }
            }
            ComponentAction::Confirm(backup_id) => Command::BackupLoad(backup_id),
            ComponentAction::Cancel(backup_id) => Command::BackupCancel(backup_id),
        };
        self.handle(guild_id, command).await
    }

    pub async fn handle(&self, guild_id: &str, command: Command) -> Reply {
        match command {
            Command::Help => Reply::ephemeral(HELP_TEXT),
            Command::BackupCreate => self.create(guild_id).await,
            Command::BackupList => self.list(),
            Command::BackupInfo(id) => match self.store.load(&id) {
                Ok(snapshot) => Reply::public(describe(&snapshot)),
                Err(StoreError::NotFound(_)) => Reply::public("❌ Backup not found."),
                Err(e) => {
                    error!(backup_id = %id, error = %e, "failed to read backup");
                    Reply::public("❌ Failed to read backup.")
                }
            },
            Command::BackupDelete(id) => match self.store.delete(&id) {
                Ok(true) => {
                    self.selections.forget(&id);
                    Reply::public(format!("🗑️ Backup `{id}` deleted."))
                }
                Ok(false) => Reply::public("❌ Backup not found."),
                Err(e) => {
                    error!(backup_id = %id, error = %e, "failed to delete backup");
                    Reply::public("❌ Failed to delete backup.")
                }
            },
            Command::BackupSelect {
                backup_id,
                selection,
            } => {
                if !self.store.exists(&backup_id) {
                    return Reply::ephemeral("❌ Backup not found.");
                }
                let values = selection.values().join(", ");
                self.selections.select(&backup_id, selection);
                Reply::ephemeral(format!("✅ Options selected: {values}"))
            }
            Command::BackupLoad(id) => self.confirm_restore(guild_id, &id).await,
            Command::BackupCancel(_) => Reply::public("❌ Backup load cancelled."),
            Command::MaintenanceOn => self.enable_maintenance(guild_id).await,
            Command::MaintenanceOff => self.disable_maintenance(guild_id).await,
            Command::MaintenanceStatus => {
                let state = if self.maintenance.status(guild_id).await {
                    "ON"
                } else {
                    "OFF"
                };
                Reply::public(format!("🔧 Maintenance mode is currently **{state}**."))
            }
        }
    }

    async fn create(&self, guild_id: &str) -> Reply {
        match create_backup(self.api.as_ref(), &self.store, guild_id).await {
            Ok(id) => {
                info!(%guild_id, backup_id = %id, "backup created");
                Reply::public(format!(
                    "✅ Backup created! ID: `{id}`\nUse `!backup select {id} <options>` then `!backup load {id}` to restore it."
                ))
            }
            Err(e) => {
                error!(%guild_id, error = %e, "failed to create backup");
                Reply::public("❌ Failed to create backup.")
            }
        }
    }

    fn list(&self) -> Reply {
        match self.store.list() {
            Ok(snapshots) if snapshots.is_empty() => Reply::public("No backups found."),
            Ok(snapshots) => {
                let lines: Vec<String> = snapshots
                    .iter()
                    .map(|s| {
                        format!(
                            "`{}` - {} - {}",
                            s.id,
                            s.summary(),
                            format_created_at(s.created_at)
                        )
                    })
                    .collect();
                Reply::public(format!("📦 **Backups**\n{}", lines.join("\n")))
            }
            Err(e) => {
                error!(error = %e, "failed to list backups");
                Reply::public("❌ Failed to list backups.")
            }
        }
    }

    /// Purge (if selected) and replay a backup using the stored selection.
    ///
    /// The backup is resolved before anything is deleted, so an unknown ID
    /// leaves the guild untouched.
    async fn confirm_restore(&self, guild_id: &str, backup_id: &str) -> Reply {
        let selection = self.selections.get(backup_id);
        let snapshot = match self.store.load(backup_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%guild_id, %backup_id, error = %e, "restore aborted");
                return Reply::public(format!("❌ Failed to load backup: {e}"));
            }
        };

        if selection.purge_roles || selection.purge_channels {
            match self.api.fetch_guild(guild_id).await {
                Ok(guild) => {
                    if selection.purge_roles {
                        purge_roles(self.api.as_ref(), &guild).await;
                    }
                    if selection.purge_channels {
                        purge_channels(self.api.as_ref(), &guild).await;
                    }
                }
                Err(e) => {
                    error!(%guild_id, error = %e, "failed to fetch guild for purge");
                    return Reply::public(format!("❌ Failed to load backup: {e}"));
                }
            }
        }

        let report =
            replay_snapshot(self.api.as_ref(), guild_id, &snapshot, selection.options).await;
        let failures = report.failure_count();
        if failures == 0 {
            Reply::public(format!("✅ Backup `{backup_id}` successfully loaded!"))
        } else {
            Reply::public(format!(
                "✅ Backup `{backup_id}` successfully loaded! ({failures} item(s) could not be restored)"
            ))
        }
    }

    async fn enable_maintenance(&self, guild_id: &str) -> Reply {
        match self.maintenance.enable(self.api.as_ref(), guild_id).await {
            Ok(report) => {
                let failed = failed_names(&report.channels);
                let mut content = format!(
                    "🔧 Maintenance mode enabled. {} channel(s) hidden.",
                    report.channels.len() - failed.len()
                );
                if !failed.is_empty() {
                    content.push_str(&format!("\n⚠️ Could not hide: {}", failed.join(", ")));
                }
                if report.maintenance_channel.as_ref().is_some_and(|o| !o.succeeded()) {
                    content.push_str(&format!(
                        "\n⚠️ Could not create the `{}` channel.",
                        self.maintenance.channel_name()
                    ));
                }
                if report.announcement.as_ref().is_some_and(|o| !o.succeeded()) {
                    content.push_str("\n⚠️ Could not post the maintenance announcement.");
                }
                Reply::public(content)
            }
            Err(e) => {
                error!(%guild_id, error = %e, "failed to enable maintenance");
                Reply::public("❌ Failed to enable maintenance mode.")
            }
        }
    }

    async fn disable_maintenance(&self, guild_id: &str) -> Reply {
        match self.maintenance.disable(self.api.as_ref(), guild_id).await {
            Ok(report) => {
                let failed = failed_names(&report.channels);
                let mut content = format!(
                    "✅ Maintenance mode disabled. {} channel(s) restored.",
                    report.channels.len() - failed.len()
                );
                if !failed.is_empty() {
                    content.push_str(&format!("\n⚠️ Could not restore: {}", failed.join(", ")));
                }
                if report.maintenance_channel.as_ref().is_some_and(|o| !o.succeeded()) {
                    content.push_str(&format!(
                        "\n⚠️ Could not delete the `{}` channel.",
                        self.maintenance.channel_name()
                    ));
                }
                Reply::public(content)
            }
            Err(e) => {
                error!(%guild_id, error = %e, "failed to disable maintenance");
                Reply::public("❌ Failed to disable maintenance mode.")
            }
        }
    }
}
