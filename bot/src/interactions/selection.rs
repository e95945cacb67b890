use dashmap::DashMap;
use tracing::debug;

use crate::backup::RestoreOptions;
use crate::error::InteractionError;

/// Menu values a user can pick before confirming a restore.
pub const OPTION_VALUES: [&str; 5] = [
    "roles",
    "channels",
    "settings",
    "delete_roles",
    "delete_channels",
];

/// Options picked for a pending restore: what to replay and what to wipe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSelection {
    pub options: RestoreOptions,
    pub purge_roles: bool,
    pub purge_channels: bool,
}

impl Default for RestoreSelection {
    /// Nothing selected: confirming restores nothing.
    fn default() -> Self {
        Self {
            options: RestoreOptions::none(),
            purge_roles: false,
            purge_channels: false,
        }
    }
}

impl RestoreSelection {
    /// Parse raw menu values. Unknown values are rejected.
    pub fn from_values<'a, I>(values: I) -> Result<Self, InteractionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut selection = Self::default();
        for value in values {
            match value.trim() {
                "roles" => selection.options.roles = true,
                "channels" => selection.options.channels = true,
                "settings" => selection.options.settings = true,
                "delete_roles" => selection.purge_roles = true,
                "delete_channels" => selection.purge_channels = true,
                "" => {}
                other => return Err(InteractionError::UnknownOption(other.to_string())),
            }
        }
        Ok(selection)
    }

    /// The selected values, in menu order.
    pub fn values(&self) -> Vec<&'static str> {
        let flags = [
            self.options.roles,
            self.options.channels,
            self.options.settings,
            self.purge_roles,
            self.purge_channels,
        ];
        OPTION_VALUES
            .iter()
            .zip(flags)
            .filter(|(_, on)| *on)
            .map(|(v, _)| *v)
            .collect()
    }
}

/// Selections waiting for confirmation, keyed by backup ID.
///
/// Last write wins: two users picking options for the same backup overwrite
/// each other. Confirming reads the entry without clearing it.
#[derive(Default)]
pub struct PendingSelections {
    by_backup: DashMap<String, RestoreSelection>,
}

impl PendingSelections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, backup_id: &str, selection: RestoreSelection) {
        debug!(%backup_id, values = ?selection.values(), "restore options selected");
        self.by_backup.insert(backup_id.to_string(), selection);
    }

    /// The stored selection, or an empty one if none was made.
    pub fn get(&self, backup_id: &str) -> RestoreSelection {
        self.by_backup
            .get(backup_id)
            .map(|s| *s)
            .unwrap_or_default()
    }

    pub fn forget(&self, backup_id: &str) {
        self.by_backup.remove(backup_id);
    }
}
