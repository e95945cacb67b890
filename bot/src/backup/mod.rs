//! Guild snapshots: capture, persist, replay.

pub mod builder;
pub mod model;
pub mod purge;
pub mod restorer;
pub mod store;

pub use builder::build_snapshot;
pub use model::{ChannelRecord, RoleRecord, SettingsRecord, Snapshot};
pub use restorer::{RestoreOptions, RestoreReport, replay_snapshot, restore};
pub use store::BackupStore;

use crate::error::BackupError;
use crate::platform::GuildApi;

/// Snapshot a live guild and write it to the store. Returns the new backup ID.
pub async fn create_backup(
    api: &dyn GuildApi,
    store: &BackupStore,
    guild_id: &str,
) -> Result<String, BackupError> {
    let guild = api.fetch_guild(guild_id).await?;
    let snapshot = build_snapshot(&guild);
    Ok(store.create(snapshot)?)
}
